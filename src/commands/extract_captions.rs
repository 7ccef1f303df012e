use std::fs::{self, File};
use std::io::{BufWriter, Write};

use anyhow::{Context, Result};
use scraper::Html;
use serde::Deserialize;
use tracing::info;

use crate::cli::ExtractCaptionsArgs;
use crate::model::CaptionRecord;
use crate::util::ensure_directory;

#[derive(Debug, Deserialize)]
struct AnnotationTask {
    data: AnnotationData,
}

#[derive(Debug, Deserialize)]
struct AnnotationData {
    figure_id: String,
    caption: String,
}

pub fn run(args: ExtractCaptionsArgs) -> Result<()> {
    let raw = fs::read(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let tasks: Vec<serde_json::Value> = serde_json::from_slice(&raw)
        .with_context(|| format!("failed to parse {}", args.input.display()))?;

    let records = tasks
        .into_iter()
        .enumerate()
        .map(|(index, task)| {
            let task: AnnotationTask = serde_json::from_value(task)
                .with_context(|| format!("annotation item {index} is missing figure data"))?;
            Ok(CaptionRecord {
                figure_id: task.data.figure_id,
                figure_caption: plain_text(&task.data.caption),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    if let Some(parent) = args.output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        ensure_directory(parent)?;
    }
    let file = File::create(&args.output)
        .with_context(|| format!("failed to create {}", args.output.display()))?;
    let mut output = BufWriter::new(file);
    for record in &records {
        serde_json::to_writer(&mut output, record)
            .with_context(|| format!("failed to serialize caption for {}", record.figure_id))?;
        writeln!(output)?;
    }
    output
        .flush()
        .with_context(|| format!("failed to write {}", args.output.display()))?;

    info!(
        path = %args.output.display(),
        captions = records.len(),
        "wrote caption corpus"
    );

    Ok(())
}

/// Reduces HTML caption markup to its text content with entities decoded
/// and whitespace runs collapsed to single spaces.
fn plain_text(markup: &str) -> String {
    let fragment = Html::parse_fragment(markup);
    let text = fragment.root_element().text().collect::<String>();
    text.split_whitespace().collect::<Vec<&str>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_strips_tags_and_decodes_entities() {
        assert_eq!(
            plain_text("<p><b>(A)</b> Cells &amp; tissue,\n <i>n</i>&nbsp;=&#160;3 &lt;5&gt;</p>"),
            "(A) Cells & tissue, n = 3 <5>"
        );
        assert_eq!(plain_text("&#x3B1;-actin"), "α-actin");
    }

    #[test]
    fn plain_text_decodes_named_entities_and_keeps_bare_comparisons() {
        assert_eq!(
            plain_text("Scale bar, 10 &mu;m; 37 &deg;C &plusmn; 2"),
            "Scale bar, 10 μm; 37 °C ± 2"
        );
        assert_eq!(
            plain_text("(A) p < 0.05 and n > 3 cells"),
            "(A) p < 0.05 and n > 3 cells"
        );
    }

    #[test]
    fn run_writes_one_record_per_annotation() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("annotated_data.json");
        let output = dir.path().join("out").join("figure_captions.jsonl");
        fs::write(
            &input,
            r#"[
                {"data": {"figure_id": "fig1", "caption": "<p>A: cells.</p>"}},
                {"data": {"figure_id": "fig2", "caption": "B: mice."}}
            ]"#,
        )
        .expect("input");

        run(ExtractCaptionsArgs {
            input,
            output: output.clone(),
        })
        .expect("extract");

        let written = fs::read_to_string(&output).expect("output");
        let records: Vec<CaptionRecord> = written
            .lines()
            .map(|line| serde_json::from_str(line).expect("record"))
            .collect();
        assert_eq!(
            records,
            vec![
                CaptionRecord {
                    figure_id: "fig1".to_string(),
                    figure_caption: "A: cells.".to_string(),
                },
                CaptionRecord {
                    figure_id: "fig2".to_string(),
                    figure_caption: "B: mice.".to_string(),
                },
            ]
        );
    }

    #[test]
    fn run_names_the_broken_item() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("annotated_data.json");
        fs::write(&input, r#"[{"data": {"figure_id": "fig1"}}]"#).expect("input");

        let err = run(ExtractCaptionsArgs {
            input,
            output: dir.path().join("out.jsonl"),
        })
        .expect_err("missing caption should fail");
        assert!(format!("{err:#}").contains("annotation item 0"));
    }
}
