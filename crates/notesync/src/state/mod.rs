//! Sync state: which pages were published and the hash of what was written.
//!
//! The sync engine compares freshly generated pages against this record to
//! decide what to rewrite, to spot renamed notes, and to find stale output.

pub mod json;
pub mod schema;
pub mod sqlite;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::{Config, StateBackend};
use crate::error::Result;

pub use json::JsonStore;
pub use sqlite::SqliteStore;

/// Published pages keyed by source path relative to the notes root
/// (`/`-separated), valued by content hash.
pub type PageHashes = BTreeMap<String, String>;

/// Persistent record of the last sync.
pub trait StateStore: std::fmt::Debug {
    /// Which backend this is.
    fn backend(&self) -> StateBackend;

    /// Location of the backing file.
    fn path(&self) -> &Path;

    /// Load the hashes recorded by the last sync.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn load(&self) -> Result<PageHashes>;

    /// Replace all recorded hashes with `pages`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn replace(&mut self, pages: &PageHashes, synced_at: DateTime<Utc>) -> Result<()>;

    /// Forget everything, forcing the next sync to rewrite every page.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn clear(&mut self) -> Result<()>;

    /// Summary of the recorded state.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn stats(&self) -> Result<StateStats>;
}

/// Statistics about the recorded state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateStats {
    /// Backend in use.
    pub backend: StateBackend,
    /// Backing file.
    pub path: PathBuf,
    /// Number of published pages recorded.
    pub tracked_pages: usize,
    /// When the last sync finished.
    pub last_sync: Option<DateTime<Utc>>,
    /// Size of the backing file in bytes.
    pub size_bytes: u64,
}

/// Whether opening a store may create its backing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Create the store if missing.
    Create,
    /// Never create anything on disk; a missing store reads as empty.
    ReadOnly,
}

/// Open the store configured in `config`.
///
/// # Errors
///
/// Returns an error if the backing file exists but cannot be opened.
pub fn open_store(config: &Config, mode: OpenMode) -> Result<Box<dyn StateStore>> {
    let path = config.state_path();
    Ok(match config.state.backend {
        StateBackend::Sqlite => match mode {
            OpenMode::Create => Box::new(SqliteStore::open(&path)?),
            OpenMode::ReadOnly => Box::new(SqliteStore::open_existing(&path)?),
        },
        StateBackend::Json => Box::new(JsonStore::new(path)),
    })
}

fn file_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}
