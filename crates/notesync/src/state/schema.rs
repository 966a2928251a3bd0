//! `SQLite` schema for the sync state database.
//!
//! The schema version lives in `PRAGMA user_version`. Each entry of
//! [`MIGRATIONS`] moves the database one version forward.

use rusqlite::Connection;

use crate::error::{Error, Result};

/// Ordered schema steps. Step `n` (0-based) upgrades version `n` to `n + 1`.
pub const MIGRATIONS: &[&str] = &[r"
CREATE TABLE IF NOT EXISTS synced_pages (
    source_key TEXT PRIMARY KEY,
    content_hash TEXT NOT NULL,
    synced_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"];

/// Schema version this build writes.
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub const CURRENT_VERSION: i64 = MIGRATIONS.len() as i64;

/// Bring `conn` up to [`CURRENT_VERSION`].
///
/// # Errors
///
/// Returns an error if the database was written by a newer build or a step fails.
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    let version = schema_version(conn)?;
    if version > CURRENT_VERSION {
        return Err(Error::StateMigration {
            message: format!(
                "state database is at version {version}, newer than supported version {CURRENT_VERSION}"
            ),
        });
    }

    for (step, sql) in MIGRATIONS.iter().enumerate().skip(usize::try_from(version).unwrap_or(0)) {
        conn.execute_batch(sql).map_err(|e| Error::StateMigration {
            message: format!("step {} failed: {e}", step + 1),
        })?;
        let version = i64::try_from(step + 1).map_err(|_| Error::StateMigration {
            message: format!("step {} is out of range", step + 1),
        })?;
        conn.pragma_update(None, "user_version", version)?;
    }
    Ok(())
}

fn schema_version(conn: &Connection) -> Result<i64> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_exists(conn: &Connection, name: &str) -> bool {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                [name],
                |row| row.get(0),
            )
            .unwrap();
        count == 1
    }

    #[test]
    fn test_initialize_creates_tables_and_version() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(schema_version(&conn).unwrap(), 0);

        initialize_schema(&conn).unwrap();

        assert!(table_exists(&conn, "synced_pages"));
        assert!(table_exists(&conn, "metadata"));
        assert_eq!(schema_version(&conn).unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO synced_pages VALUES ('aws/iam.md', 'abc', '2026-01-01T00:00:00Z')",
            [],
        )
        .unwrap();

        initialize_schema(&conn).unwrap();

        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM synced_pages", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn test_newer_version_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", CURRENT_VERSION + 1)
            .unwrap();

        let err = initialize_schema(&conn).unwrap_err();
        assert!(err.to_string().contains("newer than supported"));
    }
}
