//! File watcher for the settings document and fragment roots.
//!
//! Emits reload events through a tokio watch channel when changes are
//! detected. Uses debouncing to coalesce rapid file changes, such as the
//! temp-file-then-rename of an atomic save.

use notify_debouncer_mini::{DebouncedEventKind, new_debouncer};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Event types emitted when watched files change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsChangeEvent {
    /// The user settings document changed
    SettingsFile(PathBuf),
    /// A fragment document under one of the fragment roots changed
    Fragment(PathBuf),
    /// Multiple files changed in quick succession
    BatchChange(Vec<PathBuf>),
    /// Watcher encountered an error
    Error(String),
}

impl SettingsChangeEvent {
    /// Returns true if this event requires a settings reload.
    pub fn requires_reload(&self) -> bool {
        !matches!(self, SettingsChangeEvent::Error(_))
    }

    /// Get the affected paths for this event.
    pub fn affected_paths(&self) -> Vec<&Path> {
        match self {
            SettingsChangeEvent::SettingsFile(p) | SettingsChangeEvent::Fragment(p) => vec![p.as_path()],
            SettingsChangeEvent::BatchChange(paths) => paths.iter().map(|p| p.as_path()).collect(),
            SettingsChangeEvent::Error(_) => vec![],
        }
    }
}

/// Configuration for the file watcher.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Debounce duration for coalescing rapid changes.
    pub debounce_duration: Duration,
    /// Whether to watch fragment roots.
    pub watch_fragments: bool,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_duration: Duration::from_millis(500),
            watch_fragments: true,
        }
    }
}

/// Paths to watch for settings changes.
#[derive(Debug, Clone)]
pub struct WatchPaths {
    /// The user settings document. Its directory is watched, since atomic
    /// saves replace the file itself.
    pub settings_file: PathBuf,
    /// Fragment roots, watched recursively.
    pub fragment_roots: Vec<PathBuf>,
}

/// Handle to control the settings watcher.
pub struct SettingsWatcherHandle {
    /// Receiver for change events.
    pub events: watch::Receiver<Option<SettingsChangeEvent>>,
    /// Dropping this stops the watcher.
    _task_handle: tokio::task::JoinHandle<()>,
}

impl SettingsWatcherHandle {
    /// Wait for the next change event.
    pub async fn wait_for_change(&mut self) -> Option<SettingsChangeEvent> {
        loop {
            if self.events.changed().await.is_err() {
                return None;
            }
            let event = self.events.borrow().clone();
            if event.is_some() {
                return event;
            }
        }
    }

    /// Get the latest event without waiting.
    pub fn latest_event(&self) -> Option<SettingsChangeEvent> {
        self.events.borrow().clone()
    }
}

/// Start watching the settings document and fragment roots.
///
/// Must be called from within a tokio runtime. Directories that do not
/// exist are skipped with a warning.
pub fn start_settings_watcher(
    paths: WatchPaths,
    config: WatcherConfig,
) -> Result<SettingsWatcherHandle, notify::Error> {
    let (event_tx, event_rx) = watch::channel(None);
    let (notify_tx, notify_rx) = mpsc::channel();

    let mut debouncer = new_debouncer(config.debounce_duration, notify_tx)?;
    let watcher = debouncer.watcher();

    match paths.settings_file.parent().filter(|dir| dir.exists()) {
        Some(dir) => {
            info!("Watching settings directory: {}", dir.display());
            watcher.watch(dir, notify::RecursiveMode::NonRecursive)?;
        }
        None => warn!(
            "Settings directory does not exist, skipping watch: {}",
            paths.settings_file.display()
        ),
    }

    if config.watch_fragments {
        for root in &paths.fragment_roots {
            if root.exists() {
                info!("Watching fragment root: {}", root.display());
                watcher.watch(root, notify::RecursiveMode::Recursive)?;
            } else {
                debug!("Fragment root does not exist, skipping watch: {}", root.display());
            }
        }
    }

    let task_handle = tokio::task::spawn_blocking(move || {
        let _debouncer = debouncer;
        process_notify_events(notify_rx, event_tx, &paths);
    });

    Ok(SettingsWatcherHandle {
        events: event_rx,
        _task_handle: task_handle,
    })
}

fn process_notify_events(
    rx: mpsc::Receiver<Result<Vec<notify_debouncer_mini::DebouncedEvent>, notify::Error>>,
    tx: watch::Sender<Option<SettingsChangeEvent>>,
    paths: &WatchPaths,
) {
    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                let event = classify_events(events, paths);
                if let Some(event) = event {
                    debug!("Settings change detected: {:?}", event);
                    if tx.send(Some(event)).is_err() {
                        info!("Settings watcher receiver dropped, stopping");
                        return;
                    }
                }
            }
            Ok(Err(e)) => {
                error!("File watcher error: {}", e);
                let _ = tx.send(Some(SettingsChangeEvent::Error(e.to_string())));
            }
            Err(_) => {
                info!("Settings watcher channel closed, stopping");
                return;
            }
        }
    }
}

/// Collapse one debounced batch into at most one event.
fn classify_events(
    events: Vec<notify_debouncer_mini::DebouncedEvent>,
    paths: &WatchPaths,
) -> Option<SettingsChangeEvent> {
    let mut changed: Vec<SettingsChangeEvent> = events
        .into_iter()
        .filter(|event| matches!(event.kind, DebouncedEventKind::Any | DebouncedEventKind::AnyContinuous))
        .filter_map(|event| classify_path(&event.path, paths))
        .collect();
    changed.dedup();

    if changed.len() > 1 {
        let batch = changed
            .iter()
            .flat_map(|event| event.affected_paths())
            .map(Path::to_path_buf)
            .collect();
        Some(SettingsChangeEvent::BatchChange(batch))
    } else {
        changed.pop()
    }
}

/// Classify a single path; unrelated files in the settings directory,
/// including backups and `state.json`, are ignored.
fn classify_path(path: &Path, paths: &WatchPaths) -> Option<SettingsChangeEvent> {
    if path == paths.settings_file {
        return Some(SettingsChangeEvent::SettingsFile(path.to_path_buf()));
    }

    let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
    if is_json && paths.fragment_roots.iter().any(|root| path.starts_with(root)) {
        return Some(SettingsChangeEvent::Fragment(path.to_path_buf()));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths() -> WatchPaths {
        WatchPaths {
            settings_file: PathBuf::from("/cfg/term/settings.json"),
            fragment_roots: vec![PathBuf::from("/cfg/term/Fragments")],
        }
    }

    #[test]
    fn test_classify_settings_file() {
        let result = classify_path(Path::new("/cfg/term/settings.json"), &paths());
        assert!(matches!(result, Some(SettingsChangeEvent::SettingsFile(_))));
    }

    #[test]
    fn test_classify_fragment() {
        let result = classify_path(Path::new("/cfg/term/Fragments/Acme.Tools/extra.json"), &paths());
        assert!(matches!(result, Some(SettingsChangeEvent::Fragment(_))));
    }

    #[test]
    fn test_backups_and_state_ignored() {
        let paths = paths();
        assert!(classify_path(Path::new("/cfg/term/state.json"), &paths).is_none());
        assert!(
            classify_path(Path::new("/cfg/term/settings.json.2026-01-02T03-04-05.backup"), &paths).is_none()
        );
        assert!(classify_path(Path::new("/cfg/term/Fragments/Acme.Tools/readme.txt"), &paths).is_none());
    }

    #[test]
    fn test_event_requires_reload() {
        assert!(SettingsChangeEvent::SettingsFile(PathBuf::new()).requires_reload());
        assert!(SettingsChangeEvent::Fragment(PathBuf::new()).requires_reload());
        assert!(SettingsChangeEvent::BatchChange(vec![]).requires_reload());
        assert!(!SettingsChangeEvent::Error("test".to_string()).requires_reload());
    }
}
