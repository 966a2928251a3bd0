//! The publishing engine.
//!
//! A sync walks the notes tree, gives every page navigation front matter,
//! writes the pages whose generated text changed since the last run and
//! refreshes each section's `index.md`. Renamed notes and notes that
//! disappeared have their old output removed.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::naming::parse_chapter_title;
use crate::page::{FrontMatter, Page};
use crate::section::{write_index, IndexStatus, Section, SiblingOrders, TocEntry};
use crate::state::{open_store, OpenMode, PageHashes, StateStore};
use crate::tree::{rel_key, scan, SourceDir, INDEX_FILE};

/// Switches for a single sync run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Report what would change without touching the file system.
    pub dry_run: bool,
    /// Forget recorded hashes first so every page is rewritten.
    pub clean: bool,
    /// Generate a table of contents in section indexes.
    pub manual_toc: bool,
}

/// Something a sync did, or in a dry run would do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    /// Recorded state was discarded.
    StateCleared(PathBuf),
    /// A page was written.
    Synced(PathBuf),
    /// A page would be written.
    WouldSync(PathBuf),
    /// Output of a renamed note was removed.
    RenamedRemoved(PathBuf),
    /// Output of a deleted note was removed.
    StaleRemoved(PathBuf),
    /// A section index was (or would be) rewritten.
    IndexUpdated(PathBuf),
    /// A section index already matched.
    IndexUpToDate(PathBuf),
    /// A note could not be published.
    Skipped {
        /// The source note.
        path: PathBuf,
        /// Why it was left alone.
        reason: String,
    },
}

impl SyncAction {
    /// The file the action concerns.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::StateCleared(p)
            | Self::Synced(p)
            | Self::WouldSync(p)
            | Self::RenamedRemoved(p)
            | Self::StaleRemoved(p)
            | Self::IndexUpdated(p)
            | Self::IndexUpToDate(p) => p,
            Self::Skipped { path, .. } => path,
        }
    }

    /// Whether the action changes (or would change) anything on disk.
    #[must_use]
    pub fn is_change(&self) -> bool {
        !matches!(self, Self::IndexUpToDate(_) | Self::Skipped { .. })
    }

    /// One-line description for terminal output.
    #[must_use]
    pub fn describe(&self, dry_run: bool) -> String {
        let would = |done: &str, planned: &str| (if dry_run { planned } else { done }).to_string();
        let verb = match self {
            Self::StateCleared(_) => would("Removed sync state", "Would remove sync state"),
            Self::Synced(_) => "Synced".to_string(),
            Self::WouldSync(_) => "Would sync".to_string(),
            Self::RenamedRemoved(_) => {
                would("Renamed (deleted old)", "Renamed (would delete old)")
            }
            Self::StaleRemoved(_) => would("Removed stale", "Would remove stale"),
            Self::IndexUpdated(_) => would("Index updated", "Index would be updated"),
            Self::IndexUpToDate(_) => "Index is up to date".to_string(),
            Self::Skipped { reason, .. } => format!("Skipped ({reason})"),
        };
        format!("{verb}: {}", self.path().display())
    }
}

/// Overall result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Nothing was written.
    DryRun,
    /// At least one file changed.
    Synced,
    /// Everything already matched.
    UpToDate,
}

impl SyncOutcome {
    /// Closing line printed after a run.
    #[must_use]
    pub fn message(&self) -> &'static str {
        match self {
            Self::DryRun => "Dry run complete. No files were written.",
            Self::Synced => "Sync complete.",
            Self::UpToDate => "All up to date.",
        }
    }
}

/// Everything a run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Actions in the order they happened.
    pub actions: Vec<SyncAction>,
    /// How the run ended.
    pub outcome: SyncOutcome,
    /// Number of notes considered.
    pub pages_seen: usize,
}

impl SyncReport {
    /// Number of pages written (or that would be).
    #[must_use]
    pub fn synced_count(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| matches!(a, SyncAction::Synced(_) | SyncAction::WouldSync(_)))
            .count()
    }

    /// Number of notes skipped because of their content.
    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| matches!(a, SyncAction::Skipped { .. }))
            .count()
    }
}

/// BLAKE3 hex digest of a generated page.
#[must_use]
pub fn content_hash(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}

/// A page as it will be published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    /// Final title, used for the section's table of contents.
    pub title: String,
    /// Front matter followed by the note body.
    pub text: String,
}

/// Build the published form of a note.
///
/// `nav_order` is the order planned for the note among its siblings. Front
/// matter already present in the note supplies `title`, `nav_order`,
/// `nav_exclude` and any extra keys; the hierarchy always comes from
/// `section`.
#[must_use]
pub fn render_page(
    file_name: &str,
    nav_order: i64,
    section: Option<&Section>,
    source: &Page,
) -> RenderedPage {
    let (_, derived_title) = parse_chapter_title(file_name);

    let own = source.front_matter.clone().unwrap_or_default();
    let title = source
        .title()
        .map_or(derived_title, str::to_string);

    let front_matter = FrontMatter {
        title: Some(title.clone()),
        nav_order: Some(own.nav_order.unwrap_or(nav_order)),
        parent: section.map(|s| s.title.clone()),
        grand_parent: section.and_then(|s| s.parent.clone()),
        nav_exclude: own.nav_exclude,
        extra: own.extra,
        ..FrontMatter::default()
    };

    let mut text = front_matter.render();
    text.push('\n');
    text.push_str(&source.body);
    RenderedPage { title, text }
}

/// Runs syncs for one configuration.
#[derive(Debug)]
pub struct Syncer<'a> {
    config: &'a Config,
}

impl<'a> Syncer<'a> {
    /// Create a syncer for `config`.
    #[must_use]
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Run a sync against the configured state store.
    ///
    /// Dry runs open the store read-only so nothing is created on disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the state store cannot be opened, the source tree
    /// cannot be read, or output cannot be written.
    pub fn run(&self, options: SyncOptions) -> Result<SyncReport> {
        let mode = if options.dry_run {
            OpenMode::ReadOnly
        } else {
            OpenMode::Create
        };
        let mut store = open_store(self.config, mode)?;
        self.run_with_store(store.as_mut(), options)
    }

    /// Run a sync recording into `store`.
    ///
    /// # Errors
    ///
    /// Returns an error if the source tree cannot be read, output cannot be
    /// written, or the store fails.
    pub fn run_with_store(
        &self,
        store: &mut dyn StateStore,
        options: SyncOptions,
    ) -> Result<SyncReport> {
        let source_root = self.config.source_dir();
        let docs_root = self.config.docs_dir();
        let manual_toc = options.manual_toc || self.config.sync.manual_toc;
        let mut actions = Vec::new();

        info!(
            "Syncing {} -> {}{}",
            source_root.display(),
            docs_root.display(),
            if options.dry_run { " (dry run)" } else { "" }
        );

        let cache = if options.clean {
            if !options.dry_run {
                store.clear()?;
            }
            actions.push(SyncAction::StateCleared(store.path().to_path_buf()));
            PageHashes::new()
        } else {
            store.load()?
        };
        let by_hash: HashMap<&str, &str> = cache
            .iter()
            .map(|(key, hash)| (hash.as_str(), key.as_str()))
            .collect();

        let mut updated = PageHashes::new();
        let mut removed: BTreeSet<PathBuf> = BTreeSet::new();
        let mut pages_seen = 0;

        let dirs = scan(source_root, &self.config.excluded_dirs())?;
        let plans = plan_orders(self.config, &dirs);

        for dir in &dirs {
            let orders = plans.get(&dir.rel);
            let section = Section::for_dir(self.config, &dir.rel).map(|mut section| {
                let planned = dir
                    .rel
                    .parent()
                    .and_then(|parent| plans.get(parent))
                    .zip(dir.name())
                    .and_then(|(siblings, name)| siblings.section(name));
                if let Some(order) = planned {
                    section.nav_order = order;
                }
                section
            });
            let target_dir = docs_root.join(&dir.rel);
            let mut entries = Vec::new();

            for (idx, file_name) in dir.pages.iter().enumerate() {
                pages_seen += 1;
                let key = rel_key(&dir.rel.join(file_name));
                let src = dir.path.join(file_name);
                let dst = target_dir.join(file_name);

                let source = match Page::read(&src) {
                    Ok(page) => page,
                    Err(e) if e.is_content_error() => {
                        warn!("Skipping {}: {}", src.display(), e);
                        if let Some(previous) = cache.get(&key) {
                            updated.insert(key.clone(), previous.clone());
                        }
                        actions.push(SyncAction::Skipped {
                            path: src,
                            reason: e.to_string(),
                        });
                        continue;
                    }
                    Err(e) => return Err(e),
                };

                let nav_order = orders
                    .and_then(|o| o.page(file_name))
                    .unwrap_or_else(|| i64::try_from(idx + 1).unwrap_or(i64::MAX));
                let page = render_page(file_name, nav_order, section.as_ref(), &source);
                let hash = content_hash(&page.text);
                entries.push(TocEntry {
                    title: page.title.clone(),
                    file: file_name.clone(),
                });

                if cache.get(&key) == Some(&hash) && dst.exists() {
                    debug!("Unchanged: {}", key);
                } else {
                    if let Some(old_key) = by_hash.get(hash.as_str()).filter(|k| **k != key) {
                        if !source_root.join(old_key).exists() {
                            let old = docs_root.join(old_key);
                            if old.exists() && removed.insert(old.clone()) {
                                remove_output(&old, options.dry_run)?;
                                actions.push(SyncAction::RenamedRemoved(old));
                            }
                        }
                    }

                    if options.dry_run {
                        actions.push(SyncAction::WouldSync(dst));
                    } else {
                        write_output(&dst, &page.text)?;
                        info!("Synced {}", dst.display());
                        actions.push(SyncAction::Synced(dst));
                    }
                }
                updated.insert(key, hash);
            }

            if let Some(section) = section.filter(|_| dir.has_markdown) {
                actions.push(self.sync_index(dir, &section, &entries, manual_toc, options)?);
            }
        }

        for key in cache.keys().filter(|k| !updated.contains_key(*k)) {
            if source_root.join(key).exists() {
                continue;
            }
            let old = docs_root.join(key);
            if !old.exists() || removed.contains(&old) {
                continue;
            }
            if !self.config.sync.remove_stale {
                debug!("Keeping stale output {}", old.display());
                continue;
            }
            remove_output(&old, options.dry_run)?;
            removed.insert(old.clone());
            actions.push(SyncAction::StaleRemoved(old));
        }

        if !options.dry_run {
            store.replace(&updated, Utc::now())?;
        }

        let outcome = if options.dry_run {
            SyncOutcome::DryRun
        } else if actions.iter().any(SyncAction::is_change) {
            SyncOutcome::Synced
        } else {
            SyncOutcome::UpToDate
        };
        info!("{}", outcome.message());

        Ok(SyncReport {
            actions,
            outcome,
            pages_seen,
        })
    }

    fn sync_index(
        &self,
        dir: &SourceDir,
        section: &Section,
        entries: &[TocEntry],
        manual_toc: bool,
        options: SyncOptions,
    ) -> Result<SyncAction> {
        let path = self.config.docs_dir().join(&dir.rel).join(INDEX_FILE);
        let status = write_index(
            &path,
            section,
            entries,
            manual_toc,
            &self.config.sync.toc_marker,
            options.dry_run,
        )?;
        Ok(match status {
            IndexStatus::Updated => SyncAction::IndexUpdated(path),
            IndexStatus::UpToDate => SyncAction::IndexUpToDate(path),
        })
    }
}

/// Sibling orders for every scanned directory, keyed by relative path.
fn plan_orders(config: &Config, dirs: &[SourceDir]) -> HashMap<PathBuf, SiblingOrders> {
    dirs.iter()
        .map(|dir| {
            let sections: Vec<String> = dirs
                .iter()
                .filter(|child| child.has_markdown && child.rel.parent() == Some(dir.rel.as_path()))
                .filter_map(|child| child.name().map(str::to_string))
                .collect();
            (
                dir.rel.clone(),
                SiblingOrders::plan(config, &dir.pages, &sections),
            )
        })
        .collect()
}

fn write_output(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, text).map_err(|e| Error::write(path, e))
}

fn remove_output(path: &Path, dry_run: bool) -> Result<()> {
    if dry_run {
        return Ok(());
    }
    std::fs::remove_file(path).map_err(|e| Error::write(path, e))?;
    info!("Removed {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SqliteStore;

    fn section(title: &str, parent: Option<&str>) -> Section {
        Section {
            title: title.to_string(),
            nav_order: 10,
            parent: parent.map(str::to_string),
            grand_parent: None,
        }
    }

    fn page(text: &str) -> Page {
        Page::parse(Path::new("note.md"), text).unwrap()
    }

    fn setup() -> (tempfile::TempDir, Config) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.paths.source_dir = dir.path().to_path_buf();
        (dir, config)
    }

    fn write(root: &Path, rel: &str, text: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, text).unwrap();
    }

    #[test]
    fn test_content_hash() {
        let hash = content_hash("abc");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, content_hash("abc"));
        assert_ne!(hash, content_hash("abd"));
    }

    #[test]
    fn test_render_chapter_page() {
        let aws = section("AWS", None);
        let rendered = render_page("chapter-3-vpc-basics.md", 3, Some(&aws), &page("# VPC\n"));
        assert_eq!(rendered.title, "Chapter 3 – Vpc Basics");
        assert_eq!(
            rendered.text,
            "---\ntitle: \"Chapter 3 – Vpc Basics\"\nparent: AWS\nnav_order: 3\n---\n\n# VPC\n"
        );
    }

    #[test]
    fn test_render_plain_page_uses_planned_order() {
        let rendered = render_page("study-plan.md", 2, None, &page("plan"));
        assert_eq!(
            rendered.text,
            "---\ntitle: \"Study Plan\"\nnav_order: 2\n---\n\nplan"
        );
    }

    #[test]
    fn test_render_respects_source_front_matter() {
        let book = section("Cloud Book", Some("Reading Notes"));
        let source = page("---\ntitle: Preface\nnav_order: 0\nparent: Wrong\nnav_exclude: true\ndescription: intro\n---\nBody\n");
        let rendered = render_page("chapter-1-preface.md", 1, Some(&book), &source);

        assert_eq!(rendered.title, "Preface");
        assert_eq!(
            rendered.text,
            "---\ntitle: \"Preface\"\nparent: Cloud Book\ngrand_parent: Reading Notes\nnav_order: 0\nnav_exclude: true\ndescription: intro\n---\n\nBody\n"
        );
    }

    #[test]
    fn test_sync_writes_pages_and_indexes() {
        let (dir, config) = setup();
        let root = dir.path();
        write(root, "aws/chapter-1-intro.md", "# Intro\n");
        write(root, "README.md", "# Notes\n");

        let mut store = SqliteStore::open_in_memory().unwrap();
        let report = Syncer::new(&config)
            .run_with_store(&mut store, SyncOptions::default())
            .unwrap();

        assert_eq!(report.outcome, SyncOutcome::Synced);
        assert_eq!(report.pages_seen, 2);
        assert_eq!(report.synced_count(), 2);
        assert!(root.join("docs/aws/chapter-1-intro.md").exists());
        assert!(root.join("docs/README.md").exists());
        assert!(root.join("docs/aws/index.md").exists());
        assert!(!root.join("docs/index.md").exists());
        assert_eq!(store.load().unwrap().len(), 2);

        let again = Syncer::new(&config)
            .run_with_store(&mut store, SyncOptions::default())
            .unwrap();
        assert_eq!(again.outcome, SyncOutcome::UpToDate);
        assert_eq!(again.synced_count(), 0);
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let (dir, config) = setup();
        let root = dir.path();
        write(root, "terraform/chapter-2-state.md", "# State\n");

        let mut store = SqliteStore::open_in_memory().unwrap();
        let options = SyncOptions {
            dry_run: true,
            ..SyncOptions::default()
        };
        let report = Syncer::new(&config)
            .run_with_store(&mut store, options)
            .unwrap();

        assert_eq!(report.outcome, SyncOutcome::DryRun);
        assert!(matches!(report.actions[0], SyncAction::WouldSync(_)));
        assert!(matches!(report.actions[1], SyncAction::IndexUpdated(_)));
        assert!(!root.join("docs").exists());
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_rename_removes_old_output() {
        let (dir, config) = setup();
        let root = dir.path();
        write(root, "meta/plan.md", "# Plan\n");

        let mut store = SqliteStore::open_in_memory().unwrap();
        let syncer = Syncer::new(&config);
        syncer
            .run_with_store(&mut store, SyncOptions::default())
            .unwrap();

        let mut config_after = config.clone();
        config_after.sync.remove_stale = false;
        std::fs::rename(root.join("meta/plan.md"), root.join("meta/other.md")).unwrap();
        // Same title keeps the generated text, and so the hash, identical.
        std::fs::write(root.join("meta/other.md"), "---\ntitle: Plan\n---\n# Plan\n").unwrap();

        let report = Syncer::new(&config_after)
            .run_with_store(&mut store, SyncOptions::default())
            .unwrap();

        assert!(report
            .actions
            .contains(&SyncAction::RenamedRemoved(root.join("docs/meta/plan.md"))));
        assert!(!root.join("docs/meta/plan.md").exists());
        assert!(root.join("docs/meta/other.md").exists());
    }

    #[test]
    fn test_stale_output_removed() {
        let (dir, config) = setup();
        let root = dir.path();
        write(root, "aws/s3.md", "# S3\n");
        write(root, "aws/iam.md", "# IAM\n");

        let mut store = SqliteStore::open_in_memory().unwrap();
        let syncer = Syncer::new(&config);
        syncer
            .run_with_store(&mut store, SyncOptions::default())
            .unwrap();

        std::fs::remove_file(root.join("aws/s3.md")).unwrap();
        let report = syncer
            .run_with_store(&mut store, SyncOptions::default())
            .unwrap();

        assert!(report
            .actions
            .contains(&SyncAction::StaleRemoved(root.join("docs/aws/s3.md"))));
        assert!(!root.join("docs/aws/s3.md").exists());
        assert!(!store.load().unwrap().contains_key("aws/s3.md"));
    }

    #[test]
    fn test_stale_output_kept_when_disabled() {
        let (dir, mut config) = setup();
        config.sync.remove_stale = false;
        let root = dir.path();
        write(root, "aws/s3.md", "# S3\n");

        let mut store = SqliteStore::open_in_memory().unwrap();
        let syncer = Syncer::new(&config);
        syncer
            .run_with_store(&mut store, SyncOptions::default())
            .unwrap();
        std::fs::remove_file(root.join("aws/s3.md")).unwrap();
        syncer
            .run_with_store(&mut store, SyncOptions::default())
            .unwrap();

        assert!(root.join("docs/aws/s3.md").exists());
    }

    #[test]
    fn test_clean_forces_rewrite() {
        let (dir, config) = setup();
        write(dir.path(), "aws/vpc.md", "# VPC\n");

        let mut store = SqliteStore::open_in_memory().unwrap();
        let syncer = Syncer::new(&config);
        syncer
            .run_with_store(&mut store, SyncOptions::default())
            .unwrap();

        let report = syncer
            .run_with_store(
                &mut store,
                SyncOptions {
                    clean: true,
                    ..SyncOptions::default()
                },
            )
            .unwrap();
        assert!(matches!(report.actions[0], SyncAction::StateCleared(_)));
        assert_eq!(report.synced_count(), 1);
    }

    #[test]
    fn test_missing_output_is_rewritten() {
        let (dir, config) = setup();
        let root = dir.path();
        write(root, "aws/vpc.md", "# VPC\n");

        let mut store = SqliteStore::open_in_memory().unwrap();
        let syncer = Syncer::new(&config);
        syncer
            .run_with_store(&mut store, SyncOptions::default())
            .unwrap();
        std::fs::remove_file(root.join("docs/aws/vpc.md")).unwrap();

        let report = syncer
            .run_with_store(&mut store, SyncOptions::default())
            .unwrap();
        assert_eq!(report.synced_count(), 1);
        assert!(root.join("docs/aws/vpc.md").exists());
    }

    #[test]
    fn test_invalid_front_matter_is_skipped() {
        let (dir, config) = setup();
        let root = dir.path();
        write(root, "aws/broken.md", "---\ntitle: [oops\n---\n");
        write(root, "aws/fine.md", "# Fine\n");

        let mut store = SqliteStore::open_in_memory().unwrap();
        let report = Syncer::new(&config)
            .run_with_store(&mut store, SyncOptions::default())
            .unwrap();

        assert_eq!(report.skipped_count(), 1);
        assert_eq!(report.synced_count(), 1);
        assert!(!root.join("docs/aws/broken.md").exists());
    }

    #[test]
    fn test_describe_actions() {
        let path = PathBuf::from("docs/aws/vpc.md");
        assert_eq!(
            SyncAction::Synced(path.clone()).describe(false),
            "Synced: docs/aws/vpc.md"
        );
        assert_eq!(
            SyncAction::StaleRemoved(path.clone()).describe(true),
            "Would remove stale: docs/aws/vpc.md"
        );
        assert_eq!(
            SyncAction::IndexUpToDate(path).describe(false),
            "Index is up to date: docs/aws/vpc.md"
        );
    }

    #[test]
    fn test_outcome_messages() {
        assert_eq!(
            SyncOutcome::DryRun.message(),
            "Dry run complete. No files were written."
        );
        assert_eq!(SyncOutcome::Synced.message(), "Sync complete.");
        assert_eq!(SyncOutcome::UpToDate.message(), "All up to date.");
    }
}
