use crate::ai::FileSummary;
use crate::utils::security::relative_to;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Cheap change signal for a file: modification time plus length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModificationSignal {
    pub modified: Option<SystemTime>,
    pub len: u64,
}

impl ModificationSignal {
    pub fn from_metadata(metadata: &std::fs::Metadata) -> Self {
        Self {
            modified: metadata.modified().ok(),
            len: metadata.len(),
        }
    }

    /// Reads the signal for `path`, `None` if it cannot be stat'ed
    pub async fn probe(path: &Path) -> Option<Self> {
        tokio::fs::metadata(path)
            .await
            .ok()
            .map(|m| Self::from_metadata(&m))
    }
}

/// Last-known state of one watched file. A confirmed deletion drops the
/// entry entirely, so there is no tombstone.
#[derive(Debug, Clone)]
pub struct WatchedPath {
    pub path: PathBuf,
    pub summary: Option<String>,
    pub signal: Option<ModificationSignal>,
}

/// Last-known summary per watched file, keyed by absolute path
#[derive(Debug)]
pub struct SummaryStore {
    root: PathBuf,
    entries: BTreeMap<PathBuf, WatchedPath>,
}

impl SummaryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            entries: BTreeMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Records a fresh summary, replacing any earlier one for the same path
    pub fn upsert(&mut self, summary: FileSummary, signal: Option<ModificationSignal>) {
        let path = summary.path;
        self.entries.insert(
            path.clone(),
            WatchedPath {
                path,
                summary: Some(summary.summary),
                signal,
            },
        );
    }

    /// Removes `path` and every stored path beneath it. Returns what was removed.
    pub fn remove_prefix(&mut self, path: &Path) -> Vec<PathBuf> {
        let removed: Vec<PathBuf> = self
            .entries
            .range(path.to_path_buf()..)
            .take_while(|(key, _)| key.starts_with(path))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &removed {
            self.entries.remove(key);
        }
        removed
    }

    pub fn get(&self, path: &Path) -> Option<&WatchedPath> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    /// True when the stored signal for `path` equals `signal`
    pub fn is_unchanged(&self, path: &Path, signal: &ModificationSignal) -> bool {
        self.entries
            .get(path)
            .and_then(|entry| entry.signal.as_ref())
            .is_some_and(|stored| stored == signal)
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.entries.keys().map(PathBuf::as_path)
    }

    /// Summaries with paths relative to the root, sorted by path
    pub fn snapshot(&self) -> Vec<FileSummary> {
        self.entries
            .values()
            .filter_map(|entry| {
                let summary = entry.summary.as_ref()?;
                Some(FileSummary {
                    path: relative_to(&self.root, &entry.path)?,
                    summary: summary.clone(),
                })
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
