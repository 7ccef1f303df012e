use serde::{Deserialize, Serialize};

use crate::scoring::EvaluationCounters;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionRecord {
    pub figure_id: String,
    pub figure_caption: String,
}

/// Terminal artifact of a scoring pass. Once on disk it is authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub accuracy: f64,
    pub false_positives: u64,
    pub false_negatives: u64,
}

/// Panels that never reached the scorer, by reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SkipCounters {
    pub outside_split: u64,
    pub malformed_filename: u64,
    pub missing_caption: u64,
    pub unreadable_panel: u64,
    pub provider_error: u64,
    pub parse_error: u64,
}

impl SkipCounters {
    pub fn total(&self) -> u64 {
        self.outside_split
            + self.malformed_filename
            + self.missing_caption
            + self.unreadable_panel
            + self.provider_error
            + self.parse_error
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheActivity {
    pub hits: u64,
    pub misses: u64,
    pub invalidated: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArchiveActivity {
    pub archived_panels: u64,
    pub write_failures: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationPaths {
    pub panel_dir: String,
    pub captions_path: String,
    pub test_figures_dir: String,
    pub failure_dir: String,
    pub cache_path: String,
    pub report_path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub started_at: String,
    pub finished_at: String,
    pub model: String,
    pub cache_backend: String,
    pub captions_sha256: String,
    pub paths: EvaluationPaths,
    pub report: EvaluationReport,
    pub counters: EvaluationCounters,
    pub skips: SkipCounters,
    pub cache: CacheActivity,
    pub archive: ArchiveActivity,
}
