//! Lyrics file watching for hot-reload while playing.

use crate::error::{CliError, Result};
use notify_debouncer_mini::notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, Debouncer};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Keeps the debounced watcher alive; dropping it stops watching
pub struct LyricsWatcher {
    _debouncer: Debouncer<RecommendedWatcher>,
}

/// Watch `path` and send `()` on `tx` whenever it changes.
///
/// The parent directory is watched, since editors often save by replacing
/// the file.
///
/// # Errors
///
/// Returns [`CliError::Watch`] if the watcher cannot be created.
pub fn watch_lyrics_file(path: &Path, tx: mpsc::Sender<()>) -> Result<LyricsWatcher> {
    let target = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let filter_target = target.clone();

    // 300ms debounce to handle rapid saves
    let mut debouncer = new_debouncer(
        Duration::from_millis(300),
        move |res: DebounceEventResult| {
            let Ok(events) = res else {
                warn!("Lyrics watcher reported an error");
                return;
            };
            if events.iter().any(|event| event.path == filter_target) {
                // A reload is already pending when the channel is full
                let _ = tx.try_send(());
            }
        },
    )
    .map_err(|e| CliError::Watch(e.to_string()))?;

    let watch_path = target
        .parent()
        .map_or_else(|| target.clone(), PathBuf::from);
    debouncer
        .watcher()
        .watch(&watch_path, RecursiveMode::NonRecursive)
        .map_err(|e| CliError::Watch(e.to_string()))?;

    info!("Watching lyrics file for changes: {}", target.display());
    Ok(LyricsWatcher {
        _debouncer: debouncer,
    })
}
