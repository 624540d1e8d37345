use crate::core::summary_store::SummaryStore;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// A filesystem change as reported by the watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Created(PathBuf),
    Modified(PathBuf),
    Deleted(PathBuf),
    Moved { from: PathBuf, to: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    Created,
    Modified,
    Deleted,
    Moved,
}

impl WatchEvent {
    pub fn kind(&self) -> WatchEventKind {
        match self {
            Self::Created(_) => WatchEventKind::Created,
            Self::Modified(_) => WatchEventKind::Modified,
            Self::Deleted(_) => WatchEventKind::Deleted,
            Self::Moved { .. } => WatchEventKind::Moved,
        }
    }

    pub fn paths(&self) -> Vec<&Path> {
        match self {
            Self::Created(p) | Self::Modified(p) | Self::Deleted(p) => vec![p.as_path()],
            Self::Moved { from, to } => vec![from.as_path(), to.as_path()],
        }
    }
}

/// What recording one event did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recorded {
    /// Nothing new is pending
    Unchanged,
    /// The change is queued for the next batch
    Pending,
    /// The event removed the watched root itself
    RootRemoved,
}

/// Paths to process once the debounce window closes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeBatch {
    /// Paths to re-summarize, sorted
    pub dirty: Vec<PathBuf>,
    /// Paths already dropped from the store during this window
    pub removed: Vec<PathBuf>,
}

impl ChangeBatch {
    /// True when the store lost entries, so the plan is stale even with nothing to summarize
    pub fn store_changed(&self) -> bool {
        !self.removed.is_empty()
    }
}

/// Debounces raw events into batches.
///
/// The window opens at the first event after a flush and is never extended,
/// so a file under continuous writes still produces a batch every window.
#[derive(Debug)]
pub struct ChangeAggregator {
    window: Duration,
    dirty: BTreeSet<PathBuf>,
    removed: BTreeSet<PathBuf>,
    deadline: Option<Instant>,
}

impl ChangeAggregator {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            dirty: BTreeSet::new(),
            removed: BTreeSet::new(),
            deadline: None,
        }
    }

    /// Applies one event.
    ///
    /// A deletion takes effect on `store` immediately, but only once the path
    /// is confirmed gone from disk. A path that still exists is treated as
    /// modified instead.
    pub fn record(&mut self, event: &WatchEvent, store: &mut SummaryStore, now: Instant) -> Recorded {
        match event {
            WatchEvent::Created(path) | WatchEvent::Modified(path) => {
                self.mark_dirty(path, now);
                Recorded::Pending
            }
            WatchEvent::Deleted(path) => self.remove_if_gone(path, store, now),
            WatchEvent::Moved { from, to } => {
                if self.remove_if_gone(from, store, now) == Recorded::RootRemoved {
                    return Recorded::RootRemoved;
                }
                self.mark_dirty(to, now);
                Recorded::Pending
            }
        }
    }

    fn remove_if_gone(&mut self, path: &Path, store: &mut SummaryStore, now: Instant) -> Recorded {
        if std::fs::symlink_metadata(path).is_ok() {
            debug!("{} was reported deleted but still exists", path.display());
            self.mark_dirty(path, now);
            return Recorded::Pending;
        }
        self.remove(path, store, now)
    }

    fn mark_dirty(&mut self, path: &Path, now: Instant) {
        self.dirty.insert(path.to_path_buf());
        self.open_window(now);
    }

    fn remove(&mut self, path: &Path, store: &mut SummaryStore, now: Instant) -> Recorded {
        if store.root().starts_with(path) {
            return Recorded::RootRemoved;
        }

        let removed = store.remove_prefix(path);
        let before = self.dirty.len();
        self.dirty.retain(|dirty| !dirty.starts_with(path));
        let cleared = before - self.dirty.len();

        if removed.is_empty() && cleared == 0 {
            return Recorded::Unchanged;
        }

        debug!(
            "Removed {} stored and {} pending paths under {}",
            removed.len(),
            cleared,
            path.display()
        );
        self.removed.extend(removed);
        self.open_window(now);
        Recorded::Pending
    }

    fn open_window(&mut self, now: Instant) {
        if self.deadline.is_none() {
            self.deadline = Some(now + self.window);
        }
    }

    /// When the current window closes, if one is open
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn has_pending(&self) -> bool {
        !self.dirty.is_empty() || !self.removed.is_empty()
    }

    /// Drains the pending changes and closes the window
    pub fn take_batch(&mut self) -> Option<ChangeBatch> {
        self.deadline = None;
        if !self.has_pending() {
            return None;
        }

        Some(ChangeBatch {
            dirty: std::mem::take(&mut self.dirty).into_iter().collect(),
            removed: std::mem::take(&mut self.removed).into_iter().collect(),
        })
    }
}
