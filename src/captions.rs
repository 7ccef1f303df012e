use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::model::CaptionRecord;

/// Figure captions keyed by figure id.
#[derive(Debug, Default)]
pub struct CaptionStore {
    captions: HashMap<String, String>,
}

impl CaptionStore {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open caption corpus: {}", path.display()))?;
        let store = Self::from_reader(BufReader::new(file))
            .with_context(|| format!("failed to load caption corpus: {}", path.display()))?;

        info!(path = %path.display(), captions = store.len(), "loaded caption corpus");
        Ok(store)
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut store = Self::default();

        for (index, line) in reader.lines().enumerate() {
            let line_number = index + 1;
            let line = line.with_context(|| format!("failed to read line {line_number}"))?;
            if line.trim().is_empty() {
                continue;
            }

            let record: CaptionRecord = serde_json::from_str(&line)
                .with_context(|| format!("invalid caption record on line {line_number}"))?;
            store.insert(record);
        }

        Ok(store)
    }

    /// First record for a figure wins; later duplicates are ignored.
    pub fn insert(&mut self, record: CaptionRecord) {
        if self.captions.contains_key(&record.figure_id) {
            debug!(figure_id = %record.figure_id, "ignoring duplicate caption record");
            return;
        }
        self.captions.insert(record.figure_id, record.figure_caption);
    }

    /// Empty captions are reported as absent.
    pub fn get(&self, figure_id: &str) -> Option<&str> {
        self.captions
            .get(figure_id)
            .map(String::as_str)
            .filter(|caption| !caption.trim().is_empty())
    }

    pub fn len(&self) -> usize {
        self.captions.len()
    }
}
