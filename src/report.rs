//! Persisted summary of a finished scoring pass.
//!
//! A report on disk short-circuits every later evaluation against the same
//! path. Rerunning after a scoring change means deleting the report first.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::model::EvaluationReport;
use crate::util::write_json_pretty;

pub fn load(path: &Path) -> Result<Option<EvaluationReport>> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let report = serde_json::from_slice(&raw)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(Some(report))
}

pub fn save(path: &Path, report: &EvaluationReport) -> Result<()> {
    write_json_pretty(path, report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_returns_none_when_absent() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert_eq!(load(&dir.path().join("results.json")).expect("load"), None);
    }

    #[test]
    fn save_writes_the_three_documented_fields() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("results.json");
        let report = EvaluationReport {
            accuracy: 0.5,
            false_positives: 3,
            false_negatives: 4,
        };

        save(&path, &report).expect("save");

        let value: serde_json::Value =
            serde_json::from_slice(&fs::read(&path).expect("read")).expect("json");
        assert_eq!(
            value,
            serde_json::json!({"accuracy": 0.5, "false_positives": 3, "false_negatives": 4})
        );
        assert_eq!(load(&path).expect("load"), Some(report));
    }
}
