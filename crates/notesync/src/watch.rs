//! Continuous sync.
//!
//! The notes tree is polled on an interval; whenever its fingerprint changes
//! a sync runs. Polling keeps the watcher independent of platform file
//! notification APIs, and the trees involved are small.

use std::future::Future;
use std::io::ErrorKind;
use std::path::Path;
use std::time::{Duration, UNIX_EPOCH};

use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::sync::{SyncOptions, SyncReport, Syncer};
use crate::tree::{rel_key, scan};

/// Settings for a watch session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchOptions {
    /// Time between scans of the notes tree.
    pub interval: Duration,
    /// Options for every triggered sync.
    pub sync: SyncOptions,
}

/// BLAKE3 digest over the path, size and modification time of every note.
///
/// Any added, removed, renamed or edited note changes the fingerprint.
///
/// # Errors
///
/// Returns an error if the tree cannot be walked.
pub fn fingerprint(source_root: &Path, excluded: &[String]) -> Result<String> {
    let mut hasher = blake3::Hasher::new();

    for dir in scan(source_root, excluded)? {
        for name in &dir.pages {
            let path = dir.path.join(name);
            let meta = match std::fs::metadata(&path) {
                Ok(meta) => meta,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(Error::read(&path, e)),
            };
            let mtime = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map_or(0, |d| d.as_nanos());

            hasher.update(rel_key(&dir.rel.join(name)).as_bytes());
            hasher.update(&[0]);
            hasher.update(&meta.len().to_le_bytes());
            hasher.update(&mtime.to_le_bytes());
        }
    }

    Ok(hasher.finalize().to_hex().to_string())
}

/// Sync once, then again after every change, until `shutdown` completes.
///
/// `on_sync` sees each report. Returns the number of syncs run. A failing
/// triggered sync is logged and retried on every tick until it succeeds.
///
/// # Errors
///
/// Returns an error if the initial scan or sync fails.
pub async fn watch_until<S, F>(
    config: &Config,
    options: WatchOptions,
    shutdown: S,
    mut on_sync: F,
) -> Result<usize>
where
    S: Future<Output = ()>,
    F: FnMut(&SyncReport),
{
    tokio::pin!(shutdown);

    let syncer = Syncer::new(config);
    let excluded = config.excluded_dirs();
    let source_root = config.source_dir();

    let mut last = fingerprint(source_root, &excluded)?;
    on_sync(&syncer.run(options.sync)?);
    let mut runs = 1;

    info!(
        "Watching {} every {:?}",
        source_root.display(),
        options.interval
    );
    let mut ticker = tokio::time::interval(options.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        tokio::select! {
            () = &mut shutdown => {
                info!("Stopping watch after {} syncs", runs);
                break;
            }
            _ = ticker.tick() => {
                let current = match fingerprint(source_root, &excluded) {
                    Ok(current) => current,
                    Err(e) => {
                        warn!("Scan failed: {}", e);
                        continue;
                    }
                };
                if current == last {
                    debug!("No changes");
                    continue;
                }
                info!("Change detected, syncing");
                match syncer.run(options.sync) {
                    Ok(report) => {
                        last = current;
                        runs += 1;
                        on_sync(&report);
                    }
                    Err(e) => warn!("Sync failed, retrying next tick: {}", e),
                }
            }
        }
    }

    Ok(runs)
}

/// Watch until Ctrl-C on a dedicated single-threaded runtime.
///
/// # Errors
///
/// Returns an error if the runtime cannot start or the initial sync fails.
pub fn watch<F>(config: &Config, options: WatchOptions, on_sync: F) -> Result<usize>
where
    F: FnMut(&SyncReport),
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    runtime.block_on(watch_until(config, options, ctrl_c, on_sync))
}
