use std::path::Path;

use thiserror::Error;

/// A cropped panel named `<figure_id>_<label>.<ext>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelFile {
    pub filename: String,
    pub figure_id: String,
    pub label: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilenameError {
    #[error("panel filename has no extension: {0}")]
    MissingExtension(String),
    #[error("panel filename has no '_' separating figure id and label: {0}")]
    MissingSeparator(String),
    #[error("panel filename has an empty figure id: {0}")]
    EmptyFigureId(String),
    #[error("panel filename has an empty or multi-token label: {0}")]
    InvalidLabel(String),
}

impl PanelFile {
    pub fn parse(filename: &str) -> Result<Self, FilenameError> {
        let stem = Path::new(filename)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .filter(|stem| *stem != filename)
            .ok_or_else(|| FilenameError::MissingExtension(filename.to_string()))?;

        let (figure_id, label) = stem
            .rsplit_once('_')
            .ok_or_else(|| FilenameError::MissingSeparator(filename.to_string()))?;
        // `fig1_A.crop.png` carries label `A`.
        let label = label.split('.').next().unwrap_or(label);

        if figure_id.is_empty() {
            return Err(FilenameError::EmptyFigureId(filename.to_string()));
        }
        if label.is_empty() || label.chars().any(char::is_whitespace) {
            return Err(FilenameError::InvalidLabel(filename.to_string()));
        }

        Ok(Self {
            filename: filename.to_string(),
            figure_id: figure_id.to_string(),
            label: label.to_string(),
        })
    }

    pub fn stem(&self) -> &str {
        Path::new(&self.filename)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(&self.filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_splits_on_last_underscore() {
        let panel = PanelFile::parse("PMC123_fig_2_B.png").expect("valid filename");
        assert_eq!(panel.figure_id, "PMC123_fig_2");
        assert_eq!(panel.label, "B");
        assert_eq!(panel.stem(), "PMC123_fig_2_B");
    }

    #[test]
    fn parse_accepts_short_tags() {
        let panel = PanelFile::parse("fig9_iv.png").expect("valid filename");
        assert_eq!(panel.label, "iv");
    }

    #[test]
    fn parse_keeps_label_before_first_dot() {
        let panel = PanelFile::parse("fig1_A.b.png").expect("valid filename");
        assert_eq!(panel.figure_id, "fig1");
        assert_eq!(panel.label, "A");
        assert_eq!(panel.stem(), "fig1_A.b");
    }

    #[test]
    fn parse_rejects_nonconforming_names() {
        assert_eq!(
            PanelFile::parse("noseparator.png"),
            Err(FilenameError::MissingSeparator("noseparator.png".to_string()))
        );
        assert_eq!(
            PanelFile::parse("fig1_A"),
            Err(FilenameError::MissingExtension("fig1_A".to_string()))
        );
        assert_eq!(
            PanelFile::parse("_A.png"),
            Err(FilenameError::EmptyFigureId("_A.png".to_string()))
        );
        assert_eq!(
            PanelFile::parse("fig1_.png"),
            Err(FilenameError::InvalidLabel("fig1_.png".to_string()))
        );
        assert_eq!(
            PanelFile::parse("fig1_.crop.png"),
            Err(FilenameError::InvalidLabel("fig1_.crop.png".to_string()))
        );
        assert_eq!(
            PanelFile::parse("fig1_A B.png"),
            Err(FilenameError::InvalidLabel("fig1_A B.png".to_string()))
        );
    }
}
