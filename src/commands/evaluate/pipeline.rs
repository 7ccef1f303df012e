use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, info, warn};

use super::provider_handle::LazyProvider;
use crate::archive::FailureArchiver;
use crate::cache::{DescriptionCache, open_cache};
use crate::captions::CaptionStore;
use crate::cli::EvaluateArgs;
use crate::model::{
    ArchiveActivity, CacheActivity, EvaluationPaths, EvaluationReport, EvaluationRunManifest,
    SkipCounters,
};
use crate::panel::PanelFile;
use crate::provider::{DescriptionProvider, ProviderError};
use crate::report;
use crate::response::parse_raw_response;
use crate::scoring::{EvaluationCounters, classify};
use crate::util::{now_utc_string, sha256_file, utc_compact_string, write_json_pretty};

const PROGRESS_LOG_INTERVAL: usize = 25;
const RUN_MANIFEST_FILENAME: &str = "run_manifest.json";

#[derive(Debug)]
pub(crate) enum EvaluationOutcome {
    /// A report already existed; nothing was scored, cached or archived.
    Reused(EvaluationReport),
    Computed(Box<EvaluationRun>),
}

impl EvaluationOutcome {
    pub(crate) fn report(&self) -> EvaluationReport {
        match self {
            Self::Reused(report) => *report,
            Self::Computed(run) => run.report,
        }
    }
}

#[derive(Debug)]
pub(crate) struct EvaluationRun {
    pub(crate) run_id: String,
    pub(crate) run_dir: PathBuf,
    pub(crate) report: EvaluationReport,
    pub(crate) counters: EvaluationCounters,
    pub(crate) skips: SkipCounters,
    pub(crate) cache: CacheActivity,
    pub(crate) archive: ArchiveActivity,
}

#[derive(Debug, Default)]
struct PassTally {
    counters: EvaluationCounters,
    skips: SkipCounters,
    cache: CacheActivity,
}

pub(crate) enum DescriptionLookup {
    Cached(String),
    Described(String),
    ProviderFailed(ProviderError),
    UnreadablePanel(std::io::Error),
}

/// Scores every panel in `args.panel_dir` unless a report already exists at
/// `args.report_path`, in which case that report is returned untouched.
pub(crate) fn execute<P, F>(args: &EvaluateArgs, make_provider: F) -> Result<EvaluationOutcome>
where
    P: DescriptionProvider,
    F: FnOnce() -> Result<P>,
{
    if let Some(existing) = report::load(&args.report_path)? {
        info!(
            path = %args.report_path.display(),
            "evaluation report already present; skipping scoring pass"
        );
        return Ok(EvaluationOutcome::Reused(existing));
    }

    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    info!(run_id = %run_id, panel_dir = %args.panel_dir.display(), "starting evaluation");

    let captions = CaptionStore::load(&args.captions_path)?;
    let split = load_evaluation_split(&args.test_figures_dir, &args.figure_ext)?;
    let panels = list_panel_files(&args.panel_dir, &args.panel_ext)?;
    info!(
        panels = panels.len(),
        split_figures = split.len(),
        "collected evaluation inputs"
    );

    let mut cache = open_cache(args.cache_backend, &args.cache_path)?;
    let mut tally = PassTally::default();
    for key in &args.invalidate_panels {
        if cache.remove(key)? {
            info!(panel = %key, "invalidated cached description");
            tally.cache.invalidated += 1;
        } else {
            warn!(panel = %key, "no cached description to invalidate");
        }
    }

    let mut provider = LazyProvider::new(make_provider);
    let mut archiver = FailureArchiver::new(args.failure_dir.join(&run_id));

    for (index, filename) in panels.iter().enumerate() {
        process_panel(
            args,
            &captions,
            &split,
            filename,
            &mut *cache,
            &mut provider,
            &mut archiver,
            &mut tally,
        )?;

        if (index + 1) % PROGRESS_LOG_INTERVAL == 0 {
            info!(
                processed = index + 1,
                total = panels.len(),
                scored = tally.counters.total_images,
                "evaluation progress"
            );
        }
    }

    let report = tally.counters.report();
    report::save(&args.report_path, &report)?;
    info!(path = %args.report_path.display(), "wrote evaluation report");

    let run = EvaluationRun {
        run_id,
        run_dir: archiver.run_dir().to_path_buf(),
        report,
        counters: tally.counters,
        skips: tally.skips,
        cache: tally.cache,
        archive: archiver.activity().clone(),
    };
    write_run_manifest(args, &run, started_at)?;

    info!(
        scored = run.counters.total_images,
        correct = run.counters.correct_matches,
        skipped = run.skips.total(),
        provider_errors = run.skips.provider_error,
        parse_errors = run.skips.parse_error,
        cache_hits = run.cache.hits,
        cache_misses = run.cache.misses,
        provider_used = provider.is_constructed(),
        "evaluation completed"
    );

    Ok(EvaluationOutcome::Computed(Box::new(run)))
}

#[allow(clippy::too_many_arguments)]
fn process_panel<P, F>(
    args: &EvaluateArgs,
    captions: &CaptionStore,
    split: &HashMap<String, String>,
    filename: &str,
    cache: &mut dyn DescriptionCache,
    provider: &mut LazyProvider<P, F>,
    archiver: &mut FailureArchiver,
    tally: &mut PassTally,
) -> Result<()>
where
    P: DescriptionProvider,
    F: FnOnce() -> Result<P>,
{
    let panel = match PanelFile::parse(filename) {
        Ok(panel) => panel,
        Err(err) => {
            warn!(panel = %filename, error = %err, "malformed panel filename; skipping");
            tally.skips.malformed_filename += 1;
            return Ok(());
        }
    };

    let Some(figure_filename) = split.get(&panel.figure_id) else {
        debug!(panel = %filename, figure_id = %panel.figure_id, "figure outside evaluation split");
        tally.skips.outside_split += 1;
        return Ok(());
    };

    let Some(caption) = captions.get(&panel.figure_id) else {
        warn!(panel = %filename, figure_id = %panel.figure_id, "caption not found; skipping");
        tally.skips.missing_caption += 1;
        return Ok(());
    };

    let panel_path = args.panel_dir.join(filename);
    let raw = match lookup_description(cache, provider, &panel, &panel_path, caption)? {
        DescriptionLookup::Cached(raw) => {
            tally.cache.hits += 1;
            raw
        }
        DescriptionLookup::Described(raw) => {
            tally.cache.misses += 1;
            raw
        }
        DescriptionLookup::ProviderFailed(err) => {
            warn!(panel = %filename, error = %err, "description provider failed; skipping");
            tally.cache.misses += 1;
            tally.skips.provider_error += 1;
            return Ok(());
        }
        DescriptionLookup::UnreadablePanel(err) => {
            warn!(panel = %panel_path.display(), error = %err, "failed to read panel image; skipping");
            tally.skips.unreadable_panel += 1;
            return Ok(());
        }
    };

    let parsed = match parse_raw_response(&raw) {
        Ok(parsed) => parsed,
        Err(err) => {
            warn!(panel = %filename, error = %err, "failed to parse cached description; skipping");
            tally.skips.parse_error += 1;
            return Ok(());
        }
    };

    let outcome = classify(&panel.label, parsed.panel_label.as_deref());
    tally.counters.record(&outcome);
    debug!(
        panel = %filename,
        expected = %panel.label,
        predicted = %parsed.panel_label.as_deref().unwrap_or_default(),
        panel_caption = %parsed.panel_caption.as_deref().unwrap_or_default(),
        outcome = outcome.as_str(),
        "scored panel"
    );

    if !outcome.is_correct() {
        let figure_path = args.test_figures_dir.join(figure_filename);
        archiver.archive(
            &panel,
            &panel_path,
            &figure_path,
            caption,
            outcome.predicted_label(&panel.label).as_deref(),
        );
    }

    Ok(())
}

/// Returns the cached raw response for the panel, or asks the provider and
/// persists its answer before returning it. Provider failures are never
/// cached.
pub(crate) fn lookup_description<P, F>(
    cache: &mut dyn DescriptionCache,
    provider: &mut LazyProvider<P, F>,
    panel: &PanelFile,
    panel_path: &Path,
    caption: &str,
) -> Result<DescriptionLookup>
where
    P: DescriptionProvider,
    F: FnOnce() -> Result<P>,
{
    if let Some(raw) = cache.get(&panel.filename)? {
        return Ok(DescriptionLookup::Cached(raw));
    }

    let image = match fs::read(panel_path) {
        Ok(image) => image,
        Err(err) => return Ok(DescriptionLookup::UnreadablePanel(err)),
    };

    match provider.get()?.describe(&image, caption) {
        Ok(raw) => {
            cache.put(&panel.filename, &raw)?;
            Ok(DescriptionLookup::Described(raw))
        }
        Err(err) => Ok(DescriptionLookup::ProviderFailed(err)),
    }
}

/// Maps each figure id in the evaluation split to the filename actually on
/// disk, so archiving copies the figure under its listed extension casing.
pub(crate) fn load_evaluation_split(
    dir: &Path,
    figure_ext: &str,
) -> Result<HashMap<String, String>> {
    let mut filenames = list_files_with_extension(dir, figure_ext)?;
    filenames.sort();

    let mut split = HashMap::new();
    for filename in filenames {
        let Some(figure_id) = Path::new(&filename)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .map(ToOwned::to_owned)
        else {
            continue;
        };
        split.entry(figure_id).or_insert(filename);
    }

    Ok(split)
}

pub(crate) fn list_panel_files(dir: &Path, panel_ext: &str) -> Result<Vec<String>> {
    let mut panels = list_files_with_extension(dir, panel_ext)?;
    panels.sort();
    Ok(panels)
}

fn list_files_with_extension(dir: &Path, extension: &str) -> Result<Vec<String>> {
    let entries = fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;
    let mut filenames = Vec::new();

    for entry in entries {
        let entry = entry.with_context(|| format!("failed to read entry in {}", dir.display()))?;
        let path = entry.path();

        // Symlinks are listed unresolved; a broken one surfaces as an unreadable panel.
        if entry
            .file_type()
            .with_context(|| format!("failed to inspect file type: {}", path.display()))?
            .is_dir()
        {
            continue;
        }

        let matches_extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case(extension))
            .unwrap_or(false);
        if !matches_extension {
            continue;
        }

        match path.file_name().and_then(|name| name.to_str()) {
            Some(name) => filenames.push(name.to_string()),
            None => warn!(path = %path.display(), "skipping non UTF-8 filename"),
        }
    }

    Ok(filenames)
}

fn write_run_manifest(args: &EvaluateArgs, run: &EvaluationRun, started_at: String) -> Result<()> {
    let manifest = EvaluationRunManifest {
        manifest_version: 1,
        run_id: run.run_id.clone(),
        started_at,
        finished_at: now_utc_string(),
        model: args.model.clone(),
        cache_backend: args.cache_backend.as_str().to_string(),
        captions_sha256: sha256_file(&args.captions_path)?,
        paths: EvaluationPaths {
            panel_dir: args.panel_dir.display().to_string(),
            captions_path: args.captions_path.display().to_string(),
            test_figures_dir: args.test_figures_dir.display().to_string(),
            failure_dir: args.failure_dir.display().to_string(),
            cache_path: args.cache_path.display().to_string(),
            report_path: args.report_path.display().to_string(),
        },
        report: run.report,
        counters: run.counters,
        skips: run.skips,
        cache: run.cache.clone(),
        archive: run.archive.clone(),
    };

    let manifest_path = run.run_dir.join(RUN_MANIFEST_FILENAME);
    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote evaluation run manifest");

    Ok(())
}
