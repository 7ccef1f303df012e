use std::io::{self, Write};
use std::time::Duration;

use anyhow::Result;
use tracing::info;

use super::pipeline::{EvaluationOutcome, execute};
use crate::cli::EvaluateArgs;
use crate::model::EvaluationReport;
use crate::provider::{OpenAiConfig, OpenAiProvider};

pub fn run(args: EvaluateArgs) -> Result<()> {
    let provider_config = OpenAiConfig {
        api_base: args.api_base.clone(),
        model: args.model.clone(),
        temperature: args.temperature,
        request_timeout: Duration::from_secs(args.request_timeout_secs),
    };

    let outcome = execute(&args, || {
        OpenAiProvider::from_env(&args.api_key_env, provider_config)
    })?;

    match &outcome {
        EvaluationOutcome::Reused(_) => info!(
            path = %args.report_path.display(),
            "reported stored results; delete the report file to rerun scoring"
        ),
        EvaluationOutcome::Computed(run) => info!(
            run_id = %run.run_id,
            failures_dir = %run.run_dir.display(),
            archived = run.archive.archived_panels,
            "scoring pass finished"
        ),
    }

    write_summary(&outcome.report())
}

fn write_summary(report: &EvaluationReport) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    writeln!(output, "Accuracy: {:.2}%", report.accuracy * 100.0)?;
    writeln!(output, "False Positives: {}", report.false_positives)?;
    writeln!(output, "False Negatives: {}", report.false_negatives)?;
    output.flush()?;
    Ok(())
}
