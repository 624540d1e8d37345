//! In-process collaborators for pipeline tests
use crate::ai::{Classifier, FileSummary, PlanEntry, Summarizer};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Summarizes a file as its trimmed contents and counts calls per path
#[derive(Default)]
pub struct CountingSummarizer {
    calls: Mutex<HashMap<PathBuf, usize>>,
    failing: Mutex<HashSet<PathBuf>>,
}

impl CountingSummarizer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls_for(&self, path: &Path) -> usize {
        self.calls.lock().get(path).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().values().sum()
    }

    pub fn fail_on(&self, path: &Path) {
        self.failing.lock().insert(path.to_path_buf());
    }
}

#[async_trait]
impl Summarizer for CountingSummarizer {
    async fn summarize(&self, path: &Path) -> Result<FileSummary> {
        *self.calls.lock().entry(path.to_path_buf()).or_insert(0) += 1;

        if self.failing.lock().contains(path) {
            return Err(AppError::AiError {
                message: format!("scripted failure for {}", path.display()),
            });
        }

        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::FileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                AppError::Io(e)
            }
        })?;

        Ok(FileSummary {
            path: path.to_path_buf(),
            summary: content.trim().to_string(),
        })
    }
}

/// Puts every file under `folder/<file name>`, unless a scripted answer is queued
pub struct ScriptedClassifier {
    folder: String,
    queued: Mutex<VecDeque<Result<Vec<PlanEntry>>>>,
    calls: Mutex<Vec<Vec<FileSummary>>>,
    delay: Option<Duration>,
}

impl ScriptedClassifier {
    pub fn into_folder(folder: &str) -> Arc<Self> {
        Arc::new(Self::with_delay(folder, None))
    }

    pub fn with_delay(folder: &str, delay: Option<Duration>) -> Self {
        Self {
            folder: folder.to_string(),
            queued: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            delay,
        }
    }

    pub fn push_response(&self, response: Result<Vec<PlanEntry>>) {
        self.queued.lock().push_back(response);
    }

    pub fn push_failure(&self) {
        self.push_response(Err(AppError::AiError {
            message: "scripted oracle outage".to_string(),
        }));
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn last_call(&self) -> Option<Vec<FileSummary>> {
        self.calls.lock().last().cloned()
    }
}

#[async_trait]
impl Classifier for ScriptedClassifier {
    async fn classify(&self, summaries: &[FileSummary]) -> Result<Vec<PlanEntry>> {
        self.calls.lock().push(summaries.to_vec());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let queued = self.queued.lock().pop_front();
        if let Some(response) = queued {
            return response;
        }

        Ok(summaries
            .iter()
            .map(|summary| PlanEntry {
                src_path: summary.path.clone(),
                dst_path: Path::new(&self.folder)
                    .join(summary.path.file_name().unwrap_or(summary.path.as_os_str())),
                summary: String::new(),
            })
            .collect())
    }
}
