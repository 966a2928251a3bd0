//! Command-line interface for notesync.
//!
//! This module provides the CLI structure for the `notesync` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::PROJECT_CONFIG_FILE;
use crate::logging::Verbosity;

pub use commands::{
    ConfigCommand, LintCommand, StatusCommand, StructureCommand, SyncCommand, WatchCommand,
};

/// notesync - Publish Markdown study notes as a Just the Docs site
///
/// Adds navigation front matter to every note, mirrors the notes into the
/// docs tree, maintains section index pages, and checks the result.
#[derive(Debug, Parser)]
#[command(name = "notesync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Publish notes into the docs tree
    Sync(SyncCommand),

    /// Check the docs tree against the front-matter contract
    Lint(LintCommand),

    /// Show how the notes tree maps onto sections
    Structure(StructureCommand),

    /// Show sync state
    Status(StatusCommand),

    /// Sync whenever the notes change
    Watch(WatchCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.verbose)
    }

    /// Project-level configuration file: `--config` if given, else `notesync.toml`.
    #[must_use]
    pub fn project_config_file(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE))
    }
}
