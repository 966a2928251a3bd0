//! Configuration management for notesync.
//!
//! Configuration is loaded with figment from defaults, TOML files and
//! environment variables, then validated before use.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name in the user config directory.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Directory name under the user config directory.
const CONFIG_DIR_NAME: &str = "notesync";

/// Project-level configuration file, looked up in the working directory.
pub const PROJECT_CONFIG_FILE: &str = "notesync.toml";

/// Default `SQLite` state file name.
const SQLITE_STATE_FILE: &str = ".notesync.db";

/// Default JSON state file name (legacy layout).
const JSON_STATE_FILE: &str = ".sync_hashes.json";

/// Marker separating the author's index body from the generated TOC.
pub const DEFAULT_TOC_MARKER: &str = "<!-- TOC:DO-NOT-EDIT -->";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `NOTESYNC_`, `__` separates levels)
/// 2. The project file `notesync.toml` in the working directory, or the file
///    given with `--config`
/// 3. The user file at `~/.config/notesync/config.toml`
/// 4. Default values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where notes are read from and published to.
    pub paths: PathsConfig,
    /// Sync behaviour.
    pub sync: SyncConfig,
    /// Per-directory section titles and ordering, keyed by lowercase directory name.
    pub sections: BTreeMap<String, SectionConfig>,
    /// Sync state storage.
    pub state: StateConfig,
    /// Watch mode.
    pub watch: WatchConfig,
}

/// Path configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Root of the notes tree.
    pub source_dir: PathBuf,
    /// Output directory. Relative paths are resolved against `source_dir`.
    pub docs_dir: PathBuf,
    /// State file. Defaults to a backend-specific file in `source_dir`.
    pub state_path: Option<PathBuf>,
}

/// Sync behaviour configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Directory names never descended into.
    pub exclude_dirs: Vec<String>,
    /// Generate a manual TOC in section indexes.
    pub manual_toc: bool,
    /// Remove published pages whose source has disappeared.
    pub remove_stale: bool,
    /// Marker line separating index body from the generated TOC.
    pub toc_marker: String,
    /// `nav_order` for sections without an entry in `sections`.
    pub default_section_order: i64,
}

/// A configured section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionConfig {
    /// Display title.
    pub title: String,
    /// Position among top-level sections.
    pub nav_order: i64,
}

/// State storage configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// Which store records the hashes of published pages.
    pub backend: StateBackend,
}

/// Available state backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateBackend {
    /// `SQLite` database.
    #[default]
    Sqlite,
    /// Flat JSON object of path to hash.
    Json,
}

impl std::fmt::Display for StateBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite => write!(f, "sqlite"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Watch mode configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Seconds between source tree scans.
    pub interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            sync: SyncConfig::default(),
            sections: default_sections(),
            state: StateConfig::default(),
            watch: WatchConfig::default(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("."),
            docs_dir: PathBuf::from("docs"),
            state_path: None,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            exclude_dirs: vec![
                "docs".to_string(),
                ".git".to_string(),
                "__pycache__".to_string(),
            ],
            manual_toc: false,
            remove_stale: true,
            toc_marker: DEFAULT_TOC_MARKER.to_string(),
            default_section_order: 90,
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { interval_secs: 2 }
    }
}

/// Sections the notes tree ships with.
fn default_sections() -> BTreeMap<String, SectionConfig> {
    [
        ("aws", "AWS", 10),
        ("terraform", "Terraform", 20),
        ("meta", "Meta", 30),
        ("reading_notes", "Reading Notes", 40),
        ("docker", "Docker", 50),
        ("kubernetes", "Kubernetes", 60),
    ]
    .into_iter()
    .map(|(dir, title, nav_order)| {
        (
            dir.to_string(),
            SectionConfig {
                title: title.to_string(),
                nav_order,
            },
        )
    })
    .collect()
}

impl Config {
    /// Load configuration, using `config_path` in place of the project file.
    ///
    /// Missing files are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let project_file = config_path.unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE));

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(Self::default_config_path()))
            .merge(Toml::file(&project_file))
            .merge(Env::prefixed("NOTESYNC_").split("__"));

        let mut config: Config = figment.extract()?;
        config.fold_section_keys();
        config.validate()?;
        Ok(config)
    }

    /// Lowercase `sections` keys so lookups by directory name match.
    ///
    /// Defaults are lowercase, so a mixed-case key always comes from a user
    /// file and replaces the default it folds onto.
    fn fold_section_keys(&mut self) {
        let (mixed, lower): (Vec<_>, Vec<_>) = std::mem::take(&mut self.sections)
            .into_iter()
            .partition(|(key, _)| *key != key.to_lowercase());
        self.sections = lower
            .into_iter()
            .chain(mixed.into_iter().map(|(key, section)| (key.to_lowercase(), section)))
            .collect();
    }

    /// Get the user-level configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.watch.interval_secs == 0 {
            return Err(Error::config_validation(
                "watch.interval_secs must be greater than 0",
            ));
        }

        if self.sync.toc_marker.trim().is_empty() {
            return Err(Error::config_validation("sync.toc_marker must not be empty"));
        }

        if self.sync.toc_marker.contains('\n') {
            return Err(Error::config_validation(
                "sync.toc_marker must be a single line",
            ));
        }

        if self.paths.docs_dir.as_os_str().is_empty() || self.docs_dir() == self.source_dir() {
            return Err(Error::config_validation(
                "paths.docs_dir must be a directory distinct from paths.source_dir",
            ));
        }

        for (dir, section) in &self.sections {
            if section.title.trim().is_empty() {
                return Err(Error::config_validation(format!(
                    "section '{dir}' has an empty title"
                )));
            }
        }

        Ok(())
    }

    /// Root of the notes tree.
    #[must_use]
    pub fn source_dir(&self) -> &Path {
        &self.paths.source_dir
    }

    /// Output directory, resolved against the source directory.
    #[must_use]
    pub fn docs_dir(&self) -> PathBuf {
        if self.paths.docs_dir.is_absolute() {
            self.paths.docs_dir.clone()
        } else {
            self.paths.source_dir.join(&self.paths.docs_dir)
        }
    }

    /// State file path, resolving the backend default if not set.
    #[must_use]
    pub fn state_path(&self) -> PathBuf {
        self.paths.state_path.clone().unwrap_or_else(|| {
            let file = match self.state.backend {
                StateBackend::Sqlite => SQLITE_STATE_FILE,
                StateBackend::Json => JSON_STATE_FILE,
            };
            self.paths.source_dir.join(file)
        })
    }

    /// Directory names skipped while walking, including the docs directory itself.
    #[must_use]
    pub fn excluded_dirs(&self) -> Vec<String> {
        let mut names = self.sync.exclude_dirs.clone();
        if let Some(name) = self.paths.docs_dir.file_name().and_then(|n| n.to_str()) {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        names
    }

    /// Section configuration for a directory name, matched case-insensitively.
    #[must_use]
    pub fn section(&self, dir_name: &str) -> Option<&SectionConfig> {
        self.sections.get(&dir_name.to_lowercase())
    }

    /// Watch interval as a Duration.
    #[must_use]
    pub fn watch_interval(&self) -> Duration {
        Duration::from_secs(self.watch.interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.source_dir(), Path::new("."));
        assert_eq!(config.docs_dir(), PathBuf::from("./docs"));
        assert!(!config.sync.manual_toc);
        assert!(config.sync.remove_stale);
        assert_eq!(config.sync.toc_marker, DEFAULT_TOC_MARKER);
        assert_eq!(config.sync.default_section_order, 90);
        assert_eq!(config.state.backend, StateBackend::Sqlite);
    }

    #[test]
    fn test_default_sections() {
        let sections = default_sections();

        assert_eq!(sections.len(), 6);
        assert_eq!(sections["aws"].title, "AWS");
        assert_eq!(sections["aws"].nav_order, 10);
        assert_eq!(sections["reading_notes"].title, "Reading Notes");
        assert_eq!(sections["kubernetes"].nav_order, 60);
    }

    #[test]
    fn test_section_lookup_is_case_insensitive() {
        let config = Config::default();
        assert_eq!(config.section("AWS").map(|s| s.nav_order), Some(10));
        assert_eq!(config.section("Terraform").map(|s| s.nav_order), Some(20));
        assert!(config.section("rust").is_none());
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_zero_interval() {
        let mut config = Config::default();
        config.watch.interval_secs = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("interval_secs"));
    }

    #[test]
    fn test_validate_empty_marker() {
        let mut config = Config::default();
        config.sync.toc_marker = "  ".to_string();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("toc_marker"));
    }

    #[test]
    fn test_validate_multiline_marker() {
        let mut config = Config::default();
        config.sync.toc_marker = "<!--\n-->".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_docs_dir_equal_to_source() {
        let mut config = Config::default();
        config.paths.source_dir = PathBuf::from("/notes");
        config.paths.docs_dir = PathBuf::from("/notes");

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("docs_dir"));
    }

    #[test]
    fn test_validate_empty_section_title() {
        let mut config = Config::default();
        config.sections.insert(
            "rust".to_string(),
            SectionConfig {
                title: String::new(),
                nav_order: 70,
            },
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_docs_dir_absolute() {
        let mut config = Config::default();
        config.paths.docs_dir = PathBuf::from("/srv/site");
        assert_eq!(config.docs_dir(), PathBuf::from("/srv/site"));
    }

    #[test]
    fn test_state_path_defaults_per_backend() {
        let mut config = Config::default();
        config.paths.source_dir = PathBuf::from("/notes");
        assert_eq!(config.state_path(), PathBuf::from("/notes/.notesync.db"));

        config.state.backend = StateBackend::Json;
        assert_eq!(
            config.state_path(),
            PathBuf::from("/notes/.sync_hashes.json")
        );

        config.paths.state_path = Some(PathBuf::from("/var/state.db"));
        assert_eq!(config.state_path(), PathBuf::from("/var/state.db"));
    }

    #[test]
    fn test_excluded_dirs_include_docs_dir_name() {
        let mut config = Config::default();
        config.paths.docs_dir = PathBuf::from("site");

        let excluded = config.excluded_dirs();
        assert!(excluded.contains(&"site".to_string()));
        assert!(excluded.contains(&".git".to_string()));
    }

    #[test]
    fn test_excluded_dirs_no_duplicates() {
        let config = Config::default();
        let excluded = config.excluded_dirs();
        assert_eq!(excluded.iter().filter(|n| *n == "docs").count(), 1);
    }

    #[test]
    fn test_watch_interval() {
        let config = Config::default();
        assert_eq!(config.watch_interval(), Duration::from_secs(2));
    }

    #[test]
    fn test_state_backend_display() {
        assert_eq!(StateBackend::Sqlite.to_string(), "sqlite");
        assert_eq!(StateBackend::Json.to_string(), "json");
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("notesync"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        let config = Config::load_from(Some(PathBuf::from("/nonexistent/notesync.toml"))).unwrap();
        assert_eq!(config.sync.toc_marker, DEFAULT_TOC_MARKER);
        assert_eq!(config.sections.len(), default_sections().len());
    }

    #[test]
    fn test_load_project_file_merges_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notesync.toml");
        std::fs::write(
            &path,
            r#"
[sync]
manual_toc = true

[state]
backend = "json"

[sections.rust]
title = "Rust"
nav_order = 70
"#,
        )
        .unwrap();

        let config = Config::load_from(Some(path)).unwrap();
        assert!(config.sync.manual_toc);
        assert_eq!(config.state.backend, StateBackend::Json);
        assert_eq!(config.section("rust").unwrap().title, "Rust");
        assert_eq!(config.section("aws").unwrap().title, "AWS");
    }

    #[test]
    fn test_load_folds_mixed_case_section_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notesync.toml");
        std::fs::write(
            &path,
            r#"
[sections.Labs]
title = "Hands-on Labs"
nav_order = 5

[sections.AWS]
title = "Amazon Web Services"
nav_order = 10
"#,
        )
        .unwrap();

        let config = Config::load_from(Some(path)).unwrap();
        assert_eq!(config.section("labs").unwrap().title, "Hands-on Labs");
        assert_eq!(config.section("Labs").unwrap().nav_order, 5);
        assert_eq!(config.section("aws").unwrap().title, "Amazon Web Services");
        assert!(config.sections.keys().all(|k| *k == k.to_lowercase()));
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notesync.toml");
        std::fs::write(&path, "[watch]\ninterval_secs = 0\n").unwrap();

        let result = Config::load_from(Some(path));
        assert!(matches!(result, Err(Error::ConfigValidation { .. })));
    }

    #[test]
    fn test_config_serialize() {
        let json = serde_json::to_string(&Config::default()).unwrap();
        assert!(json.contains("toc_marker"));
        assert!(json.contains("\"backend\":\"sqlite\""));
    }
}
