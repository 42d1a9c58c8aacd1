//! File watcher for file-backed settings sources.
//!
//! Watches the dotenv file (through its parent directory, so the file may be
//! created later) and the secrets directory. Changes are debounced and
//! published on a tokio watch channel; consumers respond by calling
//! [`SettingsHandle::reload`](crate::reload::SettingsHandle::reload).

use notify_debouncer_mini::{DebouncedEvent, DebouncedEventKind, new_debouncer};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Event types emitted when a watched source changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsChangeEvent {
    DotEnvChanged(PathBuf),
    /// A file in the secrets directory was added, modified or removed.
    SecretsChanged(PathBuf),
    /// Several watched files changed within one debounce window.
    BatchChange(Vec<PathBuf>),
    Error(String),
}

impl SettingsChangeEvent {
    pub fn requires_reload(&self) -> bool {
        !matches!(self, SettingsChangeEvent::Error(_))
    }

    pub fn affected_paths(&self) -> Vec<&Path> {
        match self {
            SettingsChangeEvent::DotEnvChanged(p) | SettingsChangeEvent::SecretsChanged(p) => {
                vec![p.as_path()]
            }
            SettingsChangeEvent::BatchChange(paths) => paths.iter().map(PathBuf::as_path).collect(),
            SettingsChangeEvent::Error(_) => vec![],
        }
    }
}

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Debounce duration for coalescing rapid changes.
    pub debounce_duration: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_duration: Duration::from_millis(500),
        }
    }
}

/// Sources to watch.
#[derive(Debug, Clone, Default)]
pub struct WatchPaths {
    pub env_file: Option<PathBuf>,
    pub secrets_dir: Option<PathBuf>,
}

impl WatchPaths {
    /// Make relative paths absolute against `base` and resolve symlinks in
    /// existing directories, since notify reports canonical paths.
    pub fn absolute(self, base: &Path) -> Self {
        let absolute = |p: PathBuf| if p.is_absolute() { p } else { base.join(p) };
        Self {
            env_file: self.env_file.map(absolute).map(canonical_file),
            secrets_dir: self.secrets_dir.map(absolute).map(canonical_dir),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.env_file.is_none() && self.secrets_dir.is_none()
    }
}

fn canonical_dir(dir: PathBuf) -> PathBuf {
    dir.canonicalize().unwrap_or(dir)
}

/// The file may not exist yet, so only its directory is resolved.
fn canonical_file(file: PathBuf) -> PathBuf {
    let resolved = match (file.parent(), file.file_name()) {
        (Some(parent), Some(name)) => parent.canonicalize().ok().map(|dir| dir.join(name)),
        _ => None,
    };
    resolved.unwrap_or(file)
}

/// Handle to a running watcher. Dropping it stops the watcher.
pub struct SettingsWatcherHandle {
    pub events: watch::Receiver<Option<SettingsChangeEvent>>,
    _task_handle: tokio::task::JoinHandle<()>,
}

impl SettingsWatcherHandle {
    /// Wait for the next change event. Returns `None` once the watcher stops.
    pub async fn wait_for_change(&mut self) -> Option<SettingsChangeEvent> {
        loop {
            if self.events.changed().await.is_err() {
                return None;
            }
            let event = self.events.borrow_and_update().clone();
            if event.is_some() {
                return event;
            }
        }
    }

    pub fn latest_event(&self) -> Option<SettingsChangeEvent> {
        self.events.borrow().clone()
    }
}

/// Start watching the dotenv file and secrets directory.
///
/// Must be called from within a tokio runtime.
pub fn start_settings_watcher(
    paths: WatchPaths,
    config: WatcherConfig,
) -> Result<SettingsWatcherHandle, notify::Error> {
    let paths = paths.absolute(&std::env::current_dir()?);
    let (event_tx, event_rx) = watch::channel(None);
    let (notify_tx, notify_rx) = mpsc::channel();

    let mut debouncer = new_debouncer(config.debounce_duration, notify_tx)?;
    let watcher = debouncer.watcher();

    if let Some(env_file) = &paths.env_file {
        let dir = match env_file.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        if dir.is_dir() {
            info!(path = %env_file.display(), "Watching dotenv file");
            watcher.watch(&dir, notify::RecursiveMode::NonRecursive)?;
        } else {
            warn!(dir = %dir.display(), "Dotenv directory does not exist, skipping watch");
        }
    }

    if let Some(secrets_dir) = &paths.secrets_dir {
        if secrets_dir.is_dir() {
            info!(path = %secrets_dir.display(), "Watching secrets directory");
            watcher.watch(secrets_dir, notify::RecursiveMode::NonRecursive)?;
        } else {
            warn!(
                path = %secrets_dir.display(),
                "Secrets directory does not exist, skipping watch"
            );
        }
    }

    let task_handle = tokio::task::spawn_blocking(move || {
        let _debouncer = debouncer;
        forward_events(notify_rx, event_tx, &paths);
    });

    Ok(SettingsWatcherHandle {
        events: event_rx,
        _task_handle: task_handle,
    })
}

fn forward_events(
    rx: mpsc::Receiver<Result<Vec<DebouncedEvent>, notify::Error>>,
    tx: watch::Sender<Option<SettingsChangeEvent>>,
    paths: &WatchPaths,
) {
    while let Ok(result) = rx.recv() {
        let event = match result {
            Ok(events) => match classify_events(events, paths) {
                Some(event) => event,
                None => continue,
            },
            Err(e) => {
                error!(error = %e, "File watcher error");
                SettingsChangeEvent::Error(e.to_string())
            }
        };
        debug!(?event, "Settings source change detected");
        if tx.send(Some(event)).is_err() {
            info!("Settings watcher receiver dropped, stopping");
            return;
        }
    }
    info!("Settings watcher channel closed, stopping");
}

/// Collapse one debounced batch into at most one event.
fn classify_events(events: Vec<DebouncedEvent>, paths: &WatchPaths) -> Option<SettingsChangeEvent> {
    let changed = events
        .into_iter()
        .filter(|e| {
            matches!(
                e.kind,
                DebouncedEventKind::Any | DebouncedEventKind::AnyContinuous
            )
        })
        .map(|e| e.path);
    classify_changed(changed, paths)
}

fn classify_changed(
    changed: impl IntoIterator<Item = PathBuf>,
    paths: &WatchPaths,
) -> Option<SettingsChangeEvent> {
    let mut relevant: Vec<SettingsChangeEvent> = changed
        .into_iter()
        .filter_map(|path| classify_path(&path, paths))
        .collect();

    match relevant.len() {
        0 => None,
        1 => relevant.pop(),
        _ => Some(SettingsChangeEvent::BatchChange(
            relevant
                .iter()
                .flat_map(|e| e.affected_paths())
                .map(Path::to_path_buf)
                .collect(),
        )),
    }
}

/// Map a changed path to the source it backs, if any.
fn classify_path(path: &Path, paths: &WatchPaths) -> Option<SettingsChangeEvent> {
    if let Some(env_file) = &paths.env_file
        && path == env_file
    {
        return Some(SettingsChangeEvent::DotEnvChanged(path.to_path_buf()));
    }
    if let Some(secrets_dir) = &paths.secrets_dir
        && path.starts_with(secrets_dir)
        && path != secrets_dir
    {
        return Some(SettingsChangeEvent::SecretsChanged(path.to_path_buf()));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths() -> WatchPaths {
        WatchPaths {
            env_file: Some(PathBuf::from("/srv/app/.env")),
            secrets_dir: Some(PathBuf::from("/run/secrets")),
        }
    }

    #[test]
    fn test_classify_dotenv() {
        let result = classify_path(Path::new("/srv/app/.env"), &paths());
        assert!(matches!(result, Some(SettingsChangeEvent::DotEnvChanged(_))));
    }

    #[test]
    fn test_classify_secret() {
        let result = classify_path(Path::new("/run/secrets/PREFECT_API_KEY"), &paths());
        assert!(matches!(result, Some(SettingsChangeEvent::SecretsChanged(_))));
    }

    #[test]
    fn test_classify_unrelated_file() {
        assert!(classify_path(Path::new("/srv/app/.env.bak"), &paths()).is_none());
        assert!(classify_path(Path::new("/srv/app/main.rs"), &paths()).is_none());
    }

    #[test]
    fn test_classify_changed_batches() {
        let batch = classify_changed(
            [
                PathBuf::from("/srv/app/.env"),
                PathBuf::from("/srv/app/README.md"),
                PathBuf::from("/run/secrets/PREFECT_API_KEY"),
            ],
            &paths(),
        );
        assert_eq!(
            batch,
            Some(SettingsChangeEvent::BatchChange(vec![
                PathBuf::from("/srv/app/.env"),
                PathBuf::from("/run/secrets/PREFECT_API_KEY"),
            ]))
        );

        let single = classify_changed([PathBuf::from("/srv/app/.env")], &paths());
        assert!(matches!(single, Some(SettingsChangeEvent::DotEnvChanged(_))));

        assert_eq!(classify_changed([PathBuf::from("/tmp/other")], &paths()), None);
    }

    #[test]
    fn test_absolute_paths() {
        let paths = WatchPaths {
            env_file: Some(PathBuf::from(".env")),
            secrets_dir: Some(PathBuf::from("/run/secrets")),
        }
        .absolute(Path::new("/srv/app"));
        assert_eq!(paths.env_file, Some(PathBuf::from("/srv/app/.env")));
        assert_eq!(paths.secrets_dir, Some(PathBuf::from("/run/secrets")));
    }

    #[cfg(unix)]
    #[test]
    fn test_absolute_paths_resolve_symlinks() {
        let temp = tempfile::TempDir::new().unwrap();
        let real = temp.path().join("real");
        std::fs::create_dir_all(real.join("secrets")).unwrap();
        let link = temp.path().join("link");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let paths = WatchPaths {
            env_file: Some(link.join(".env")),
            secrets_dir: Some(link.join("secrets")),
        }
        .absolute(temp.path());

        let real = real.canonicalize().unwrap();
        assert_eq!(paths.env_file, Some(real.join(".env")));
        assert_eq!(paths.secrets_dir, Some(real.join("secrets")));
        assert_eq!(
            classify_path(&real.join("secrets").join("PREFECT_TOKEN"), &paths),
            Some(SettingsChangeEvent::SecretsChanged(real.join("secrets").join("PREFECT_TOKEN")))
        );
    }

    #[test]
    fn test_event_requires_reload() {
        assert!(SettingsChangeEvent::DotEnvChanged(PathBuf::new()).requires_reload());
        assert!(SettingsChangeEvent::BatchChange(vec![]).requires_reload());
        assert!(!SettingsChangeEvent::Error("boom".to_string()).requires_reload());
    }
}
