//! `notesync` - CLI for publishing study notes
//!
//! This binary provides the command-line interface for syncing notes into
//! the docs tree and checking the result.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use notesync::cli::{
    Cli, Command, ConfigCommand, LintCommand, StatusCommand, StructureCommand, SyncCommand,
    WatchCommand,
};
use notesync::{
    analyze_structure, init_logging, lint_docs, open_store, watch, Config, OpenMode, SyncOptions,
    SyncReport, Syncer, WatchOptions,
};

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    // `config validate` reports load failures itself.
    if let Command::Config(ConfigCommand::Validate { file }) = &cli.command {
        let shown = file.clone().unwrap_or_else(|| cli.project_config_file());
        return Ok(handle_validate(&shown, file.clone().or_else(|| cli.config.clone())));
    }

    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;
    let project_file = cli.project_config_file();

    match cli.command {
        Command::Sync(cmd) => handle_sync(&config, &cmd),
        Command::Lint(cmd) => handle_lint(&config, &cmd),
        Command::Structure(cmd) => handle_structure(&config, &cmd),
        Command::Status(cmd) => handle_status(&config, &cmd),
        Command::Watch(cmd) => handle_watch(&config, &cmd),
        Command::Config(cmd) => handle_config(&config, &cmd, &project_file),
    }
}

fn print_report(report: &SyncReport, dry_run: bool) {
    for action in &report.actions {
        println!("{}", action.describe(dry_run));
    }
    println!();
    println!("{}", report.outcome.message());
}

fn handle_sync(config: &Config, cmd: &SyncCommand) -> Result<ExitCode> {
    let options = SyncOptions {
        dry_run: cmd.dry_run,
        clean: cmd.clean,
        manual_toc: cmd.manual_toc,
    };
    let report = Syncer::new(config)
        .run(options)
        .with_context(|| format!("sync of {} failed", config.source_dir().display()))?;
    print_report(&report, cmd.dry_run);
    Ok(ExitCode::SUCCESS)
}

fn handle_lint(config: &Config, cmd: &LintCommand) -> Result<ExitCode> {
    let docs_dir = cmd.docs_dir.clone().unwrap_or_else(|| config.docs_dir());
    let report =
        lint_docs(&docs_dir).with_context(|| format!("failed to lint {}", docs_dir.display()))?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for issue in &report.issues {
            println!("{issue}");
        }
        println!();
        println!(
            "{} pages checked: {} errors, {} warnings",
            report.pages_checked,
            report.error_count(),
            report.warning_count()
        );
        println!(
            "{}",
            if report.passed() {
                "docs lint passed"
            } else {
                "docs lint failed"
            }
        );
    }

    Ok(if report.passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn handle_structure(config: &Config, cmd: &StructureCommand) -> Result<ExitCode> {
    let report = analyze_structure(config.source_dir(), &config.excluded_dirs())
        .with_context(|| format!("failed to read {}", config.source_dir().display()))?;
    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{report}");
    }
    Ok(ExitCode::SUCCESS)
}

fn handle_status(config: &Config, cmd: &StatusCommand) -> Result<ExitCode> {
    let store = open_store(config, OpenMode::ReadOnly).context("failed to open sync state")?;
    let stats = store.stats()?;

    if cmd.json {
        let status = serde_json::json!({
            "source_dir": config.source_dir(),
            "docs_dir": config.docs_dir(),
            "state": stats,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("notesync status");
        println!("---------------");
        println!("Source:        {}", config.source_dir().display());
        println!("Docs:          {}", config.docs_dir().display());
        println!("State backend: {}", stats.backend);
        println!("State file:    {}", stats.path.display());
        println!("Tracked pages: {}", stats.tracked_pages);
        match stats.last_sync {
            Some(at) => println!("Last sync:     {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
            None => println!("Last sync:     never"),
        }
        println!("State size:    {} bytes", stats.size_bytes);
    }
    Ok(ExitCode::SUCCESS)
}

fn handle_watch(config: &Config, cmd: &WatchCommand) -> Result<ExitCode> {
    let options = WatchOptions {
        interval: cmd
            .interval
            .map_or_else(|| config.watch_interval(), std::time::Duration::from_secs),
        sync: SyncOptions {
            manual_toc: cmd.manual_toc,
            ..SyncOptions::default()
        },
    };

    println!(
        "Watching {} (Ctrl-C to stop)",
        config.source_dir().display()
    );
    let runs = watch(config, options, |report| {
        if report.actions.iter().any(notesync::SyncAction::is_change) {
            print_report(report, false);
        }
    })
    .context("watch failed")?;
    println!("Stopped after {runs} syncs.");
    Ok(ExitCode::SUCCESS)
}

fn handle_validate(shown: &Path, file: Option<PathBuf>) -> ExitCode {
    println!("Validating configuration: {}", shown.display());
    match Config::load_from(file) {
        Ok(_) => {
            println!("Configuration is valid.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("Configuration error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn handle_config(config: &Config, cmd: &ConfigCommand, project_file: &Path) -> Result<ExitCode> {
    match cmd {
        ConfigCommand::Show { json } => {
            if *json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Paths]");
                println!("  Source dir:         {}", config.source_dir().display());
                println!("  Docs dir:           {}", config.docs_dir().display());
                println!("  State path:         {}", config.state_path().display());
                println!();
                println!("[Sync]");
                println!("  Excluded dirs:      {}", config.excluded_dirs().join(", "));
                println!("  Manual TOC:         {}", config.sync.manual_toc);
                println!("  Remove stale:       {}", config.sync.remove_stale);
                println!("  TOC marker:         {}", config.sync.toc_marker);
                println!(
                    "  Default order:      {}",
                    config.sync.default_section_order
                );
                println!();
                println!("[Sections]");
                for (dir, section) in &config.sections {
                    println!(
                        "  {dir:<20}{} (nav_order {})",
                        section.title, section.nav_order
                    );
                }
                println!();
                println!("[State]");
                println!("  Backend:            {}", config.state.backend);
                println!();
                println!("[Watch]");
                println!("  Interval (secs):    {}", config.watch.interval_secs);
            }
        }
        ConfigCommand::Path => {
            println!("User:    {}", Config::default_config_path().display());
            println!("Project: {}", project_file.display());
        }
        ConfigCommand::Validate { .. } => {}
    }
    Ok(ExitCode::SUCCESS)
}
