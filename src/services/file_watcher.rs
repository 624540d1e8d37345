use crate::core::{PathFilter, WatchEvent};
use crate::error::{AppError, Result};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Events buffered between the OS callback and the session worker
pub const WATCH_EVENT_BUFFER: usize = 1024;

pub type WatchItem = Result<WatchEvent>;

/// Recursive OS subscription for one root. Dropping it stops the subscription.
pub struct FileWatcher {
    root: PathBuf,
    _watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Subscribes to `filter.root()` and forwards translated events into the returned receiver
    pub fn start(filter: PathFilter) -> Result<(Self, mpsc::Receiver<WatchItem>)> {
        let root = filter.root().to_path_buf();
        if !root.is_dir() {
            return Err(AppError::InvalidPath {
                message: format!("Cannot watch {}: not a directory", root.display()),
            });
        }

        let (tx, rx) = mpsc::channel(WATCH_EVENT_BUFFER);

        // Runs on the notify thread, outside the runtime, so blocking_send is allowed
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for translated in translate_event(event, &filter) {
                    if tx.blocking_send(Ok(translated)).is_err() {
                        return;
                    }
                }
            }
            Err(e) => {
                error!("File watcher error: {}", e);
                let _ = tx.blocking_send(Err(AppError::NotifyError(e)));
            }
        })?;

        watcher.watch(&root, RecursiveMode::Recursive)?;
        info!("Watching {}", root.display());

        Ok((
            Self {
                root,
                _watcher: watcher,
            },
            rx,
        ))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        debug!("Stopped watching {}", self.root.display());
    }
}

/// Maps one notify event onto zero or more watch events, dropping ignored paths
pub fn translate_event(event: Event, filter: &PathFilter) -> Vec<WatchEvent> {
    let keep = |path: &PathBuf| !filter.is_ignored(path);

    match event.kind {
        EventKind::Create(_) => event
            .paths
            .into_iter()
            .filter(keep)
            .map(WatchEvent::Created)
            .collect(),
        EventKind::Remove(_) => event
            .paths
            .into_iter()
            .filter(keep)
            .map(WatchEvent::Deleted)
            .collect(),
        EventKind::Modify(ModifyKind::Name(mode)) => translate_rename(mode, event.paths, filter),
        EventKind::Modify(_) => event
            .paths
            .into_iter()
            .filter(keep)
            .map(WatchEvent::Modified)
            .collect(),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}

fn translate_rename(mode: RenameMode, paths: Vec<PathBuf>, filter: &PathFilter) -> Vec<WatchEvent> {
    match mode {
        RenameMode::Both if paths.len() == 2 => {
            let mut paths = paths.into_iter();
            let (Some(from), Some(to)) = (paths.next(), paths.next()) else {
                return Vec::new();
            };
            match (filter.is_ignored(&from), filter.is_ignored(&to)) {
                (false, false) => vec![WatchEvent::Moved { from, to }],
                (false, true) => vec![WatchEvent::Deleted(from)],
                (true, false) => vec![WatchEvent::Created(to)],
                (true, true) => Vec::new(),
            }
        }
        RenameMode::From => paths
            .into_iter()
            .filter(|p| !filter.is_ignored(p))
            .map(WatchEvent::Deleted)
            .collect(),
        RenameMode::To => paths
            .into_iter()
            .filter(|p| !filter.is_ignored(p))
            .map(WatchEvent::Created)
            .collect(),
        // Unpaired rename: whichever side still exists
        _ => paths
            .into_iter()
            .filter(|p| !filter.is_ignored(p))
            .map(|p| {
                if p.exists() {
                    WatchEvent::Created(p)
                } else {
                    WatchEvent::Deleted(p)
                }
            })
            .collect(),
    }
}
