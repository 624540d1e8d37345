use crate::ai::{FileSummary, Summarizer};
use crate::config::Config;
use crate::core::summary_store::{ModificationSignal, SummaryStore};
use crate::error::{AppError, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
pub struct SummaryLimits {
    pub max_concurrent: usize,
    pub per_file_timeout: Duration,
}

impl SummaryLimits {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_concurrent: config.max_concurrent_summaries.max(1),
            per_file_timeout: config.summary_timeout(),
        }
    }
}

/// Result of summarizing one path
#[derive(Debug)]
pub struct Summarized {
    pub path: PathBuf,
    pub outcome: Result<(FileSummary, Option<ModificationSignal>)>,
}

/// Counts of what [`refresh_store`] did
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RefreshReport {
    pub updated: usize,
    pub vanished: usize,
    pub failed: usize,
}

impl RefreshReport {
    pub fn changed(&self) -> bool {
        self.updated > 0 || self.vanished > 0
    }
}

/// Summarizes `paths` with at most `limits.max_concurrent` calls in flight.
///
/// Results come back in the order of `paths`.
pub async fn summarize_paths(
    summarizer: Arc<dyn Summarizer>,
    paths: Vec<PathBuf>,
    limits: SummaryLimits,
) -> Vec<Summarized> {
    if paths.is_empty() {
        return Vec::new();
    }

    let semaphore = Arc::new(Semaphore::new(limits.max_concurrent.max(1)));
    let mut join_set: JoinSet<(usize, Summarized)> = JoinSet::new();

    for (index, path) in paths.into_iter().enumerate() {
        let semaphore = semaphore.clone();
        let summarizer = summarizer.clone();

        join_set.spawn(async move {
            let outcome = match semaphore.acquire_owned().await {
                Ok(_permit) => summarize_one(summarizer.as_ref(), &path, limits.per_file_timeout).await,
                Err(_) => Err(AppError::Cancelled),
            };
            (index, Summarized { path, outcome })
        });
    }

    let mut results = Vec::with_capacity(join_set.len());
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok(result) => results.push(result),
            Err(e) => warn!("Summary task failed to complete: {}", e),
        }
    }

    results.sort_by_key(|(index, _)| *index);
    results.into_iter().map(|(_, summarized)| summarized).collect()
}

async fn summarize_one(
    summarizer: &dyn Summarizer,
    path: &std::path::Path,
    per_file_timeout: Duration,
) -> Result<(FileSummary, Option<ModificationSignal>)> {
    let signal = ModificationSignal::probe(path).await;
    if signal.is_none() {
        return Err(AppError::FileNotFound {
            path: path.display().to_string(),
        });
    }

    let summary = tokio::time::timeout(per_file_timeout, summarizer.summarize(path))
        .await
        .map_err(|_| AppError::Timeout {
            message: format!("Summarizing {} took longer than {:?}", path.display(), per_file_timeout),
        })??;

    Ok((
        FileSummary {
            path: path.to_path_buf(),
            summary: summary.summary,
        },
        signal,
    ))
}

/// Folds summary results into `store`.
///
/// Vanished paths are dropped. Any other failure keeps the prior summary,
/// or leaves the path out if it never had one.
pub fn refresh_store(store: &mut SummaryStore, results: Vec<Summarized>) -> RefreshReport {
    let mut report = RefreshReport::default();

    for Summarized { path, outcome } in results {
        match outcome {
            Ok((summary, signal)) => {
                store.upsert(summary, signal);
                report.updated += 1;
            }
            Err(AppError::FileNotFound { .. }) => {
                debug!("{} vanished before it was summarized", path.display());
                if !store.remove_prefix(&path).is_empty() {
                    report.vanished += 1;
                }
            }
            Err(e) => {
                report.failed += 1;
                if store.contains(&path) {
                    warn!(
                        "Could not re-summarize {}, keeping previous summary: {}",
                        path.display(),
                        e
                    );
                } else {
                    warn!("Could not summarize {}, leaving it out: {}", path.display(), e);
                }
            }
        }
    }

    report
}
