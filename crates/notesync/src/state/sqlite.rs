//! `SQLite`-backed sync state.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use super::{file_size, schema, PageHashes, StateStats, StateStore};
use crate::config::StateBackend;
use crate::error::{Error, Result};

const MEMORY_PATH: &str = ":memory:";

/// Metadata key holding the RFC 3339 time of the last sync.
const LAST_SYNC_KEY: &str = "last_sync";

/// Sync state stored in a `SQLite` database.
#[derive(Debug)]
pub struct SqliteStore {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl SqliteStore {
    /// Open or create a state database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening state database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::StateOpen {
            path: path.clone(),
            source,
        })?;

        schema::initialize_schema(&conn)?;

        info!("State database opened at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Open the database at `path` if it exists, otherwise an empty in-memory one.
    ///
    /// Used for dry runs and status queries, which must not create files.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing database cannot be opened.
    pub fn open_existing(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::open(path)
        } else {
            debug!("No state database at {}, using empty state", path.display());
            let mut store = Self::open_in_memory()?;
            store.path = path.to_path_buf();
            Ok(store)
        }
    }

    /// Create an in-memory state database.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::StateOpen {
            path: PathBuf::from(MEMORY_PATH),
            source,
        })?;

        schema::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(MEMORY_PATH),
            conn,
        })
    }

    fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM synced_pages", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn last_sync(&self) -> Result<Option<DateTime<Utc>>> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM metadata WHERE key = ?1",
                [LAST_SYNC_KEY],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc)))
    }
}

impl StateStore for SqliteStore {
    fn backend(&self) -> StateBackend {
        StateBackend::Sqlite
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<PageHashes> {
        let mut stmt = self
            .conn
            .prepare("SELECT source_key, content_hash FROM synced_pages ORDER BY source_key")?;
        let pages = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<PageHashes, _>>()?;
        debug!("Loaded {} recorded pages", pages.len());
        Ok(pages)
    }

    fn replace(&mut self, pages: &PageHashes, synced_at: DateTime<Utc>) -> Result<()> {
        let synced_at = synced_at.to_rfc3339();
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM synced_pages", [])?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO synced_pages (source_key, content_hash, synced_at) VALUES (?1, ?2, ?3)",
            )?;
            for (key, hash) in pages {
                insert.execute(params![key, hash, synced_at])?;
            }
        }
        tx.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            params![LAST_SYNC_KEY, synced_at],
        )?;
        tx.commit()?;

        debug!("Recorded {} pages", pages.len());
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        let removed = self.conn.execute("DELETE FROM synced_pages", [])?;
        self.conn
            .execute("DELETE FROM metadata WHERE key = ?1", [LAST_SYNC_KEY])?;
        info!("Cleared {} recorded pages", removed);
        Ok(())
    }

    fn stats(&self) -> Result<StateStats> {
        let size_bytes = if self.path.as_os_str() == MEMORY_PATH {
            0
        } else {
            file_size(&self.path)
        };

        Ok(StateStats {
            backend: StateBackend::Sqlite,
            path: self.path.clone(),
            tracked_pages: self.count()?,
            last_sync: self.last_sync()?,
            size_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_store() -> SqliteStore {
        SqliteStore::open_in_memory().expect("failed to create test store")
    }

    fn pages(entries: &[(&str, &str)]) -> PageHashes {
        entries
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_open_in_memory() {
        let store = create_test_store();
        assert_eq!(store.path(), Path::new(":memory:"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_replace_and_load() {
        let mut store = create_test_store();
        let recorded = pages(&[("aws/iam.md", "h1"), ("terraform/state.md", "h2")]);

        store.replace(&recorded, Utc::now()).unwrap();
        assert_eq!(store.load().unwrap(), recorded);
    }

    #[test]
    fn test_replace_drops_previous_entries() {
        let mut store = create_test_store();
        store
            .replace(&pages(&[("old.md", "h0"), ("keep.md", "h1")]), Utc::now())
            .unwrap();
        store.replace(&pages(&[("keep.md", "h2")]), Utc::now()).unwrap();

        assert_eq!(store.load().unwrap(), pages(&[("keep.md", "h2")]));
    }

    #[test]
    fn test_clear() {
        let mut store = create_test_store();
        store.replace(&pages(&[("a.md", "h")]), Utc::now()).unwrap();

        store.clear().unwrap();

        assert!(store.load().unwrap().is_empty());
        assert!(store.stats().unwrap().last_sync.is_none());
    }

    #[test]
    fn test_stats() {
        let mut store = create_test_store();
        let stats = store.stats().unwrap();
        assert_eq!(stats.tracked_pages, 0);
        assert!(stats.last_sync.is_none());
        assert_eq!(stats.size_bytes, 0);

        let now = Utc::now();
        store
            .replace(&pages(&[("a.md", "1"), ("b.md", "2")]), now)
            .unwrap();
        let stats = store.stats().unwrap();
        assert_eq!(stats.backend, StateBackend::Sqlite);
        assert_eq!(stats.tracked_pages, 2);
        assert_eq!(
            stats.last_sync.map(|t| t.timestamp()),
            Some(now.timestamp())
        );
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.db");

        let store = SqliteStore::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(store.path(), path);
    }

    #[test]
    fn test_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.db");

        {
            let mut store = SqliteStore::open(&path).unwrap();
            store.replace(&pages(&[("x.md", "h")]), Utc::now()).unwrap();
        }

        let store = SqliteStore::open_existing(&path).unwrap();
        assert_eq!(store.load().unwrap(), pages(&[("x.md", "h")]));
        assert!(store.stats().unwrap().size_bytes > 0);
    }

    #[test]
    fn test_open_existing_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.db");

        let store = SqliteStore::open_existing(&path).unwrap();
        assert!(store.load().unwrap().is_empty());
        assert_eq!(store.path(), path);
        assert!(!path.exists());
    }
}
