use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "panelmatch",
    version,
    about = "Panel-to-caption matching and accuracy evaluation for multi-panel figures"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Score provider-predicted panel labels against filename ground truth.
    ///
    /// An existing report at --report-path is returned as-is; delete it to
    /// force a new scoring pass.
    Evaluate(EvaluateArgs),
    /// Convert an annotation export into the JSONL caption corpus.
    ExtractCaptions(ExtractCaptionsArgs),
    /// Report which evaluation artifacts exist and how large they are.
    Status(StatusArgs),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CacheBackend {
    Json,
    Sqlite,
}

impl CacheBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Sqlite => "sqlite",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct EvaluateArgs {
    #[arg(long, default_value = "data/segmented_images")]
    pub panel_dir: PathBuf,

    #[arg(long, default_value = "data/figure_captions.jsonl")]
    pub captions_path: PathBuf,

    #[arg(long, default_value = "data/soda_panelization_figures/test/images")]
    pub test_figures_dir: PathBuf,

    #[arg(long, default_value = "data/failures")]
    pub failure_dir: PathBuf,

    #[arg(long, default_value = "data/panel_description_cache.json")]
    pub cache_path: PathBuf,

    #[arg(long, value_enum, default_value_t = CacheBackend::Json)]
    pub cache_backend: CacheBackend,

    #[arg(long, default_value = "data/results.json")]
    pub report_path: PathBuf,

    #[arg(long, default_value = "png")]
    pub panel_ext: String,

    #[arg(long, default_value = "jpg")]
    pub figure_ext: String,

    #[arg(long, default_value = "gpt-4o")]
    pub model: String,

    #[arg(long, default_value_t = 0.5)]
    pub temperature: f32,

    #[arg(long, default_value = "https://api.openai.com/v1")]
    pub api_base: String,

    #[arg(long, default_value = "OPENAI_API_KEY")]
    pub api_key_env: String,

    #[arg(long, default_value_t = 120)]
    pub request_timeout_secs: u64,

    /// Drop a cached response so the panel is described again.
    #[arg(long = "invalidate-panel")]
    pub invalidate_panels: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ExtractCaptionsArgs {
    #[arg(long)]
    pub input: PathBuf,

    #[arg(long)]
    pub output: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = "data/figure_captions.jsonl")]
    pub captions_path: PathBuf,

    #[arg(long, default_value = "data/panel_description_cache.json")]
    pub cache_path: PathBuf,

    #[arg(long, value_enum, default_value_t = CacheBackend::Json)]
    pub cache_backend: CacheBackend,

    #[arg(long, default_value = "data/results.json")]
    pub report_path: PathBuf,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn every_subcommand_has_help_text() {
        let cli = Cli::command();
        for subcommand in cli.get_subcommands() {
            assert!(
                subcommand.get_about().is_some(),
                "{} has no help text",
                subcommand.get_name()
            );
        }
    }
}
