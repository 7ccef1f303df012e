//! Durable panel-filename → raw provider response storage.
//!
//! Whether a key is present decides if the provider gets called for a panel.
//! The parsed content of the entry plays no part in that decision. Every write
//! is persisted before returning.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::info;

use crate::cli::CacheBackend;
use crate::util::{ensure_directory, now_utc_string, write_json_pretty};

pub trait DescriptionCache {
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `raw` under `key` and flushes it to disk before returning.
    fn put(&mut self, key: &str, raw: &str) -> Result<()>;

    /// Returns whether an entry was removed.
    fn remove(&mut self, key: &str) -> Result<bool>;

    fn len(&self) -> Result<usize>;
}

pub fn open_cache(backend: CacheBackend, path: &Path) -> Result<Box<dyn DescriptionCache>> {
    let cache: Box<dyn DescriptionCache> = match backend {
        CacheBackend::Json => Box::new(JsonFileCache::open(path)?),
        CacheBackend::Sqlite => Box::new(SqliteCache::open(path)?),
    };

    info!(
        path = %path.display(),
        backend = backend.as_str(),
        entries = cache.len()?,
        "opened description cache"
    );

    Ok(cache)
}

/// A single JSON object rewritten wholesale on every change.
#[derive(Debug)]
pub struct JsonFileCache {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl JsonFileCache {
    pub fn open(path: &Path) -> Result<Self> {
        let entries = if path.exists() {
            let raw = fs::read(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_slice::<BTreeMap<String, String>>(&raw)
                .with_context(|| format!("failed to parse {}", path.display()))?
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    fn flush(&self) -> Result<()> {
        write_json_pretty(&self.path, &self.entries)
            .with_context(|| format!("failed to persist description cache: {}", self.path.display()))
    }
}

impl DescriptionCache for JsonFileCache {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn put(&mut self, key: &str, raw: &str) -> Result<()> {
        self.entries.insert(key.to_string(), raw.to_string());
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<bool> {
        if self.entries.remove(key).is_none() {
            return Ok(false);
        }
        self.flush()?;
        Ok(true)
    }

    fn len(&self) -> Result<usize> {
        Ok(self.entries.len())
    }
}

/// One row per panel, for corpora where whole-file rewrites get expensive.
#[derive(Debug)]
pub struct SqliteCache {
    connection: Connection,
}

impl SqliteCache {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            ensure_directory(parent)?;
        }

        let connection = Connection::open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;

        connection
            .pragma_update(None, "journal_mode", "WAL")
            .context("failed to set journal_mode=WAL for description cache")?;
        connection
            .pragma_update(None, "synchronous", "FULL")
            .context("failed to set synchronous=FULL for description cache")?;

        connection
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS panel_descriptions (
                  panel_filename TEXT PRIMARY KEY,
                  raw_response TEXT NOT NULL,
                  cached_at TEXT NOT NULL
                );
                ",
            )
            .context("failed to create panel_descriptions table")?;

        Ok(Self { connection })
    }
}

impl DescriptionCache for SqliteCache {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let raw = self
            .connection
            .query_row(
                "SELECT raw_response FROM panel_descriptions WHERE panel_filename = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("failed to look up cached description for {key}"))?;

        Ok(raw)
    }

    fn put(&mut self, key: &str, raw: &str) -> Result<()> {
        self.connection
            .execute(
                "
                INSERT INTO panel_descriptions(panel_filename, raw_response, cached_at)
                VALUES(?1, ?2, ?3)
                ON CONFLICT(panel_filename) DO UPDATE SET
                  raw_response=excluded.raw_response,
                  cached_at=excluded.cached_at
                ",
                params![key, raw, now_utc_string()],
            )
            .with_context(|| format!("failed to cache description for {key}"))?;

        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<bool> {
        let removed = self
            .connection
            .execute(
                "DELETE FROM panel_descriptions WHERE panel_filename = ?1",
                params![key],
            )
            .with_context(|| format!("failed to invalidate cached description for {key}"))?;

        Ok(removed > 0)
    }

    fn len(&self) -> Result<usize> {
        let count: i64 = self
            .connection
            .query_row("SELECT COUNT(*) FROM panel_descriptions", [], |row| row.get(0))
            .context("failed to count cached descriptions")?;

        Ok(count as usize)
    }
}
