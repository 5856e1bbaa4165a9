//! Filesystem event source built on the `notify` crate.
//!
//! Emits `(path, kind, timestamp)` into a tokio channel; the trigger
//! engine does its own debouncing, so raw created/modified/deleted kinds
//! are forwarded as they arrive. The returned [`WatcherHandle`] is an RAII
//! guard; dropping it stops the watch.

use std::path::PathBuf;
use std::time::Instant;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use flowmill_core::trigger::FileEventKind;

/// Errors raised while setting up the filesystem watcher.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// Failed to create the underlying watcher.
    #[error("watcher creation failed: {0}")]
    Creation(String),

    /// Failed to add a path to the watcher.
    #[error("failed to watch path '{path}': {reason}")]
    WatchPath { path: String, reason: String },
}

/// One filesystem change, timestamped on the monotonic clock.
#[derive(Debug, Clone)]
pub struct FileEvent {
    pub path: PathBuf,
    pub kind: FileEventKind,
    pub at: Instant,
}

/// RAII handle that keeps the filesystem watcher alive.
pub struct WatcherHandle {
    _watcher: RecommendedWatcher,
    watched_paths: Vec<PathBuf>,
}

impl WatcherHandle {
    pub fn watched_paths(&self) -> &[PathBuf] {
        &self.watched_paths
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        tracing::debug!(paths = ?self.watched_paths, "file watcher dropped");
    }
}

/// Start watching `paths`, forwarding events into `events_tx`.
///
/// Paths that do not exist are skipped with a warning instead of failing
/// the whole watcher; a file-watch trigger on a not-yet-created path
/// simply stays silent.
pub fn start_watcher(
    paths: &[PathBuf],
    events_tx: mpsc::Sender<FileEvent>,
) -> Result<WatcherHandle, WatchError> {
    let tx = events_tx.clone();

    let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
        match result {
            Ok(event) => {
                let Some(kind) = map_event_kind(&event.kind) else {
                    return;
                };

                let now = Instant::now();
                for path in event.paths {
                    // Non-blocking send; a full queue drops the event, the
                    // same policy the trigger queue applies.
                    if tx
                        .try_send(FileEvent {
                            path,
                            kind,
                            at: now,
                        })
                        .is_err()
                    {
                        tracing::warn!("file event queue full or closed, dropping event");
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "file watcher error");
            }
        }
    })
    .map_err(|e| WatchError::Creation(e.to_string()))?;

    let mut watched_paths = Vec::new();
    for path in paths {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "watch path does not exist, skipping");
            continue;
        }

        watcher
            .watch(path, RecursiveMode::Recursive)
            .map_err(|e| WatchError::WatchPath {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        watched_paths.push(path.clone());
    }

    tracing::info!(paths = ?watched_paths, "file watcher started");

    Ok(WatcherHandle {
        _watcher: watcher,
        watched_paths,
    })
}

/// Map notify's event taxonomy onto the trigger engine's three kinds.
/// Access and metadata-only events are dropped.
fn map_event_kind(kind: &EventKind) -> Option<FileEventKind> {
    match kind {
        EventKind::Create(_) => Some(FileEventKind::Created),
        EventKind::Modify(_) => Some(FileEventKind::Modified),
        EventKind::Remove(_) => Some(FileEventKind::Deleted),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
