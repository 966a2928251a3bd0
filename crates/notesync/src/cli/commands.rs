//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand};

/// Sync command arguments.
#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Preview changes without writing files
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Forget recorded hashes and rewrite every page
    #[arg(long)]
    pub clean: bool,

    /// Generate a table of contents in section indexes and set `toc: false`
    #[arg(long)]
    pub manual_toc: bool,
}

/// Lint command arguments.
#[derive(Debug, Args)]
pub struct LintCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,

    /// Docs tree to check instead of the configured one
    #[arg(short, long, value_name = "DIR")]
    pub docs_dir: Option<PathBuf>,
}

/// Structure command arguments.
#[derive(Debug, Args)]
pub struct StructureCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Watch command arguments.
#[derive(Debug, Args)]
pub struct WatchCommand {
    /// Seconds between scans (overrides the configured interval)
    #[arg(short, long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: Option<u64>,

    /// Generate a table of contents in section indexes
    #[arg(long)]
    pub manual_toc: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file paths
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}
