//! `notesync` - Publishes Markdown study notes as a Just the Docs site
//!
//! This library mirrors a tree of notes into a docs directory, giving every
//! page the navigation front matter the site generator expects, maintains
//! section index pages, records what it published so unchanged pages are left
//! alone, and checks a docs tree against the front-matter contract.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod error;
pub mod lint;
pub mod logging;
pub mod naming;
pub mod page;
pub mod section;
pub mod state;
pub mod structure;
pub mod sync;
pub mod tree;
pub mod watch;

pub use config::Config;
pub use error::{Error, Result};
pub use lint::{lint_docs, IssueCode, LintIssue, LintReport, Severity};
pub use logging::init_logging;
pub use page::{FrontMatter, Page};
pub use state::{open_store, OpenMode, StateStats, StateStore};
pub use structure::{analyze_structure, StructureReport};
pub use sync::{SyncAction, SyncOptions, SyncOutcome, SyncReport, Syncer};
pub use watch::{watch, WatchOptions};
