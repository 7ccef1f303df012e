use std::path::Path;

use anyhow::Result;
use tracing::{info, warn};

use crate::cache::open_cache;
use crate::captions::CaptionStore;
use crate::cli::{CacheBackend, StatusArgs};
use crate::report;

pub fn run(args: StatusArgs) -> Result<()> {
    info!(report_path = %args.report_path.display(), "status requested");

    match report::load(&args.report_path)? {
        Some(report) => info!(
            path = %args.report_path.display(),
            accuracy = report.accuracy,
            false_positives = report.false_positives,
            false_negatives = report.false_negatives,
            "evaluation report present; evaluate will reuse it until the file is deleted"
        ),
        None => warn!(path = %args.report_path.display(), "evaluation report missing"),
    }

    if args.cache_path.exists() {
        let entries = count_cache_entries(args.cache_backend, &args.cache_path)?;
        info!(
            path = %args.cache_path.display(),
            backend = args.cache_backend.as_str(),
            entries,
            "description cache status"
        );
    } else {
        warn!(path = %args.cache_path.display(), "description cache missing");
    }

    if args.captions_path.exists() {
        let captions = CaptionStore::load(&args.captions_path)?;
        info!(
            path = %args.captions_path.display(),
            captions = captions.len(),
            "caption corpus status"
        );
    } else {
        warn!(path = %args.captions_path.display(), "caption corpus missing");
    }

    Ok(())
}

fn count_cache_entries(backend: CacheBackend, path: &Path) -> Result<usize> {
    open_cache(backend, path)?.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{DescriptionCache, JsonFileCache};

    #[test]
    fn run_tolerates_missing_artifacts() {
        let dir = tempfile::tempdir().expect("tempdir");
        run(StatusArgs {
            captions_path: dir.path().join("captions.jsonl"),
            cache_path: dir.path().join("cache.json"),
            cache_backend: CacheBackend::Json,
            report_path: dir.path().join("results.json"),
        })
        .expect("status with nothing on disk");
    }

    #[test]
    fn count_cache_entries_reads_existing_cache() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cache.json");
        let mut cache = JsonFileCache::open(&path).expect("open");
        cache.put("fig1_A.png", "raw").expect("put");

        assert_eq!(count_cache_entries(CacheBackend::Json, &path).expect("count"), 1);
    }
}
