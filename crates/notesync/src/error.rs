//! Error types for notesync.
//!
//! This module defines all error types used throughout the notesync crate,
//! providing path context for file system failures and user-friendly messages.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for notesync operations.
#[derive(Error, Debug)]
pub enum Error {
    // === State Errors ===
    /// Failed to open or create the state database.
    #[error("failed to open state database at {path}: {source}")]
    StateOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A state database query failed.
    #[error("state query failed: {0}")]
    StateQuery(#[from] rusqlite::Error),

    /// Failed to run state database migrations.
    #[error("state migration failed: {message}")]
    StateMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Content Errors ===
    /// A page's front matter could not be parsed.
    #[error("invalid front matter in {path}: {source}")]
    FrontMatter {
        /// The page containing the front matter.
        path: PathBuf,
        /// The underlying YAML error.
        #[source]
        source: serde_yaml::Error,
    },

    /// A page is not valid UTF-8 text.
    #[error("{path} is not valid UTF-8")]
    Encoding {
        /// The offending file.
        path: PathBuf,
    },

    /// A path fell outside the tree it was expected in.
    #[error("{path} is not inside {root}")]
    OutsideRoot {
        /// The offending path.
        path: PathBuf,
        /// The root it should have been under.
        root: PathBuf,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to read a file.
    #[error("failed to read {path}: {source}")]
    FileRead {
        /// Path that couldn't be read.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write or remove a file.
    #[error("failed to write {path}: {source}")]
    FileWrite {
        /// Path that couldn't be written.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for notesync operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a configuration validation error.
    #[must_use]
    pub fn config_validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    /// Wrap an I/O error raised while reading `path`.
    #[must_use]
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Wrap an I/O error raised while writing or removing `path`.
    #[must_use]
    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileWrite {
            path: path.into(),
            source,
        }
    }

    /// Check if this error came from a page's content rather than the environment.
    #[must_use]
    pub fn is_content_error(&self) -> bool {
        matches!(self, Self::FrontMatter { .. } | Self::Encoding { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Encoding {
            path: PathBuf::from("notes/aws/iam.md"),
        };
        assert_eq!(err.to_string(), "notes/aws/iam.md is not valid UTF-8");
    }

    #[test]
    fn test_config_validation_error_display() {
        let err = Error::config_validation("interval must be positive");
        assert_eq!(
            err.to_string(),
            "invalid configuration: interval must be positive"
        );
    }

    #[test]
    fn test_read_error_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err = Error::read("/notes/aws/iam.md", io_err);
        let msg = err.to_string();
        assert!(msg.contains("/notes/aws/iam.md"));
        assert!(msg.contains("missing"));
    }

    #[test]
    fn test_write_error_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = Error::write("/docs/aws/index.md", io_err);
        assert!(err.to_string().starts_with("failed to write /docs/aws/index.md"));
    }

    #[test]
    fn test_is_content_error() {
        let yaml_err = serde_yaml::from_str::<serde_yaml::Value>("a: [").unwrap_err();
        let err = Error::FrontMatter {
            path: PathBuf::from("page.md"),
            source: yaml_err,
        };
        assert!(err.is_content_error());
        assert!(Error::Encoding {
            path: PathBuf::from("page.md")
        }
        .is_content_error());
        assert!(!Error::config_validation("x").is_content_error());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_rusqlite_error() {
        let result = rusqlite::Connection::open_with_flags(
            "/nonexistent/path/state.db",
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        );
        if let Err(sqlite_err) = result {
            let err: Error = sqlite_err.into();
            assert!(matches!(err, Error::StateQuery(_)));
        }
    }

    #[test]
    fn test_from_json_error() {
        let json_result: std::result::Result<i32, serde_json::Error> =
            serde_json::from_str("not valid json");
        if let Err(json_err) = json_result {
            let err: Error = json_err.into();
            assert!(matches!(err, Error::Json(_)));
        }
    }

    #[test]
    fn test_state_migration_error_display() {
        let err = Error::StateMigration {
            message: "version mismatch".to_string(),
        };
        assert!(err.to_string().contains("version mismatch"));
    }

    #[test]
    fn test_outside_root_error_display() {
        let err = Error::OutsideRoot {
            path: PathBuf::from("/elsewhere/page.md"),
            root: PathBuf::from("/notes"),
        };
        assert_eq!(err.to_string(), "/elsewhere/page.md is not inside /notes");
    }

    #[test]
    fn test_directory_create_error_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = Error::DirectoryCreate {
            path: PathBuf::from("/root/forbidden"),
            source: io_err,
        };
        assert!(err.to_string().contains("/root/forbidden"));
    }
}
