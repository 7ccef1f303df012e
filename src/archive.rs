use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::warn;

use crate::model::ArchiveActivity;
use crate::panel::PanelFile;
use crate::util::ensure_directory;

pub const MISSING_LABEL_PLACEHOLDER: &str = "None";

/// Copies mismatched panels, their caption and prediction, and the source
/// figure into one run's failure directory for manual review.
#[derive(Debug)]
pub struct FailureArchiver {
    run_dir: PathBuf,
    activity: ArchiveActivity,
}

impl FailureArchiver {
    pub fn new(run_dir: PathBuf) -> Self {
        Self {
            run_dir,
            activity: ArchiveActivity::default(),
        }
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn activity(&self) -> &ArchiveActivity {
        &self.activity
    }

    /// Write failures are logged and counted. Each artifact is attempted
    /// regardless of the others.
    pub fn archive(
        &mut self,
        panel: &PanelFile,
        panel_path: &Path,
        figure_path: &Path,
        caption: &str,
        predicted_label: Option<&str>,
    ) {
        if let Err(err) = ensure_directory(&self.run_dir) {
            warn!(panel = %panel.filename, error = %err, "failed to create failure directory");
            self.activity.write_failures += 1;
            return;
        }

        let steps = [
            self.copy_into_run_dir(panel_path),
            self.write_caption_note(panel, caption, predicted_label),
            self.copy_into_run_dir(figure_path),
        ];

        for result in steps {
            if let Err(err) = result {
                warn!(panel = %panel.filename, error = %format!("{err:#}"), "failed to archive artifact");
                self.activity.write_failures += 1;
            }
        }
        self.activity.archived_panels += 1;
    }

    fn copy_into_run_dir(&self, source: &Path) -> Result<()> {
        let filename = source
            .file_name()
            .with_context(|| format!("path has no file name: {}", source.display()))?;
        let target = self.run_dir.join(filename);
        fs::copy(source, &target).with_context(|| {
            format!("failed to copy {} to {}", source.display(), target.display())
        })?;
        Ok(())
    }

    fn write_caption_note(
        &self,
        panel: &PanelFile,
        caption: &str,
        predicted_label: Option<&str>,
    ) -> Result<()> {
        let target = self.run_dir.join(format!("{}.txt", panel.stem()));
        let note = format!(
            "Caption: {caption}\nPredicted Label: {}",
            predicted_label.unwrap_or(MISSING_LABEL_PLACEHOLDER)
        );
        fs::write(&target, note)
            .with_context(|| format!("failed to write {}", target.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_writes_all_three_artifacts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let panel_path = dir.path().join("fig1_A.png");
        let figure_path = dir.path().join("fig1.jpg");
        fs::write(&panel_path, b"\x89PNG panel bytes").expect("panel");
        fs::write(&figure_path, b"figure bytes").expect("figure");

        let run_dir = dir.path().join("failures").join("run-1");
        let mut archiver = FailureArchiver::new(run_dir.clone());
        let panel = PanelFile::parse("fig1_A.png").expect("panel");
        archiver.archive(&panel, &panel_path, &figure_path, "A: cells.", Some("C"));

        assert_eq!(
            fs::read(run_dir.join("fig1_A.png")).expect("panel copy"),
            b"\x89PNG panel bytes"
        );
        assert_eq!(
            fs::read_to_string(run_dir.join("fig1_A.txt")).expect("note"),
            "Caption: A: cells.\nPredicted Label: C"
        );
        assert!(run_dir.join("fig1.jpg").exists());
        assert_eq!(archiver.activity().archived_panels, 1);
        assert_eq!(archiver.activity().write_failures, 0);
    }

    #[test]
    fn missing_figure_is_counted_but_other_artifacts_land() {
        let dir = tempfile::tempdir().expect("tempdir");
        let panel_path = dir.path().join("fig2_B.png");
        fs::write(&panel_path, b"panel").expect("panel");

        let run_dir = dir.path().join("run");
        let mut archiver = FailureArchiver::new(run_dir.clone());
        let panel = PanelFile::parse("fig2_B.png").expect("panel");
        archiver.archive(&panel, &panel_path, &dir.path().join("fig2.jpg"), "cap", None);

        assert!(run_dir.join("fig2_B.png").exists());
        assert_eq!(
            fs::read_to_string(run_dir.join("fig2_B.txt")).expect("note"),
            "Caption: cap\nPredicted Label: None"
        );
        assert_eq!(archiver.activity().write_failures, 1);
    }
}
