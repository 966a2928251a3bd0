//! JSON-file sync state, readable by older tooling.
//!
//! The file is a flat object mapping source paths to hashes, pretty-printed
//! with two-space indentation. The time of the last sync is the file's
//! modification time.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::{file_size, PageHashes, StateStats, StateStore};
use crate::config::StateBackend;
use crate::error::{Error, Result};

/// Sync state stored as a JSON object.
#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    /// Create a store backed by `path`. Nothing is read or written yet.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl StateStore for JsonStore {
    fn backend(&self) -> StateBackend {
        StateBackend::Json
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<PageHashes> {
        if !self.path.exists() {
            debug!("No state file at {}, using empty state", self.path.display());
            return Ok(PageHashes::new());
        }
        let text = std::fs::read_to_string(&self.path).map_err(|e| Error::read(&self.path, e))?;
        if text.trim().is_empty() {
            return Ok(PageHashes::new());
        }
        Ok(serde_json::from_str(&text)?)
    }

    fn replace(&mut self, pages: &PageHashes, _synced_at: DateTime<Utc>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }
        let text = serde_json::to_string_pretty(pages)?;
        std::fs::write(&self.path, text).map_err(|e| Error::write(&self.path, e))?;
        debug!("Recorded {} pages in {}", pages.len(), self.path.display());
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path).map_err(|e| Error::write(&self.path, e))?;
            info!("Removed {}", self.path.display());
        }
        Ok(())
    }

    fn stats(&self) -> Result<StateStats> {
        let last_sync = std::fs::metadata(&self.path)
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from);

        Ok(StateStats {
            backend: StateBackend::Json,
            path: self.path.clone(),
            tracked_pages: self.load()?.len(),
            last_sync,
            size_bytes: file_size(&self.path),
        })
    }
}
