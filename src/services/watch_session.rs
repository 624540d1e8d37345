use crate::ai::{Classifier, Summarizer};
use crate::config::Config;
use crate::core::aggregator::Recorded;
use crate::core::scanner::{scan_files_async, PathFilter};
use crate::core::summarize::{refresh_store, summarize_paths, SummaryLimits};
use crate::core::summary_store::ModificationSignal;
use crate::core::{ChangeAggregator, ChangeBatch, PlanBuilder, SummaryStore};
use crate::error::{AppError, Result};
use crate::services::delivery::{delivery_channel, PlanSender, PlanStream, PlanUpdate, SendOutcome};
use crate::services::file_watcher::{FileWatcher, WatchItem};
use crate::state::SessionContext;
use std::collections::BTreeSet;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

/// Timing and sizing for one watch session
#[derive(Debug, Clone, Copy)]
pub struct WatchSettings {
    pub debounce: Duration,
    pub oracle_timeout: Duration,
    pub channel_capacity: usize,
    pub limits: SummaryLimits,
}

impl WatchSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            debounce: config.debounce_window(),
            oracle_timeout: config.oracle_timeout(),
            channel_capacity: config.channel_capacity,
            limits: SummaryLimits::from_config(config),
        }
    }
}

/// Caller's side of a running watch session.
///
/// Dropping the handle cancels the session.
pub struct WatchHandle {
    context: SessionContext,
    updates: PlanStream,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl WatchHandle {
    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Next plan update; `None` once the session has ended
    pub async fn recv(&mut self) -> Option<PlanUpdate> {
        self.updates.recv().await
    }

    pub fn updates(&mut self) -> &mut PlanStream {
        &mut self.updates
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |task| task.is_finished())
    }

    /// Cancels the session and waits for its worker to exit
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Watch session worker ended abnormally: {}", e);
            }
        }
        info!(session_id = %self.context.session_id, "Watch session stopped");
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Starts watching `filter.root()` and spawns the session worker
pub fn spawn_session(
    filter: PathFilter,
    settings: WatchSettings,
    summarizer: Arc<dyn Summarizer>,
    classifier: Arc<dyn Classifier>,
) -> Result<WatchHandle> {
    let (watcher, events) = FileWatcher::start(filter.clone())?;
    Ok(spawn_with_events(
        Some(watcher),
        events,
        filter,
        settings,
        summarizer,
        classifier,
    ))
}

/// Spawns the worker over an arbitrary event source
pub(crate) fn spawn_with_events(
    watcher: Option<FileWatcher>,
    events: mpsc::Receiver<WatchItem>,
    filter: PathFilter,
    settings: WatchSettings,
    summarizer: Arc<dyn Summarizer>,
    classifier: Arc<dyn Classifier>,
) -> WatchHandle {
    let context = SessionContext::new(filter.root());
    let cancel = CancellationToken::new();
    let (sender, updates) = delivery_channel(settings.channel_capacity);

    let worker = SessionWorker {
        store: SummaryStore::new(filter.root()),
        aggregator: ChangeAggregator::new(settings.debounce),
        builder: PlanBuilder::new(classifier, settings.oracle_timeout),
        filter,
        sender,
        summarizer,
        limits: settings.limits,
        cancel: cancel.clone(),
        _watcher: watcher,
    };

    let span = context.span();
    let task = tokio::spawn(worker.run(events).instrument(span));

    WatchHandle {
        context,
        updates,
        cancel,
        task: Some(task),
    }
}

struct SessionWorker {
    filter: PathFilter,
    store: SummaryStore,
    aggregator: ChangeAggregator,
    builder: PlanBuilder,
    sender: PlanSender,
    summarizer: Arc<dyn Summarizer>,
    limits: SummaryLimits,
    cancel: CancellationToken,
    _watcher: Option<FileWatcher>,
}

impl SessionWorker {
    async fn run(mut self, mut events: mpsc::Receiver<WatchItem>) {
        info!("Watch session started");

        if self.initial_plan().await.is_continue() {
            self.watch(&mut events).await;
        }

        info!("Watch session ended");
    }

    async fn initial_plan(&mut self) -> ControlFlow<()> {
        let root = self.filter.root().to_path_buf();
        let files = match scan_files_async(root.clone(), self.filter.clone()).await {
            Ok(files) => files,
            Err(e) => {
                warn!("Initial scan of {} failed: {}", root.display(), e);
                return self.terminate().await;
            }
        };
        info!("Initial scan found {} files", files.len());

        let results = tokio::select! {
            _ = self.cancel.cancelled() => return ControlFlow::Break(()),
            results = summarize_paths(self.summarizer.clone(), files, self.limits) => results,
        };
        refresh_store(&mut self.store, results);

        self.publish().await
    }

    async fn watch(&mut self, events: &mut mpsc::Receiver<WatchItem>) {
        // Stands in for "no deadline" while the sleep branch is disabled
        let idle = Instant::now() + Duration::from_secs(365 * 24 * 60 * 60);

        loop {
            let deadline = self.aggregator.deadline();

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!("Watch session cancelled");
                    break;
                }
                item = events.recv() => match item {
                    Some(Ok(event)) => {
                        debug!(kind = ?event.kind(), "Filesystem event");
                        if self.aggregator.record(&event, &mut self.store, Instant::now())
                            == Recorded::RootRemoved
                        {
                            let _ = self.terminate().await;
                            break;
                        }
                    }
                    Some(Err(e)) => warn!("Watcher reported an error: {}", e),
                    None => {
                        info!("Watcher channel closed");
                        break;
                    }
                },
                _ = sleep_until(deadline.unwrap_or(idle)), if deadline.is_some() => {
                    if self.process_batch().await.is_break() {
                        break;
                    }
                }
            }
        }
    }

    async fn process_batch(&mut self) -> ControlFlow<()> {
        let Some(batch) = self.aggregator.take_batch() else {
            return ControlFlow::Continue(());
        };

        let root = self.filter.root().to_path_buf();
        if !tokio::fs::metadata(&root).await.is_ok_and(|m| m.is_dir()) {
            return self.terminate().await;
        }

        debug!(
            "Processing batch with {} dirty and {} removed paths",
            batch.dirty.len(),
            batch.removed.len()
        );

        let (to_summarize, vanished) = self.expand_dirty(&batch).await;

        let results = tokio::select! {
            _ = self.cancel.cancelled() => return ControlFlow::Break(()),
            results = summarize_paths(self.summarizer.clone(), to_summarize, self.limits) => results,
        };
        let report = refresh_store(&mut self.store, results);

        if !(report.changed() || vanished || batch.store_changed()) {
            debug!("Batch left the store unchanged, keeping the current plan");
            return ControlFlow::Continue(());
        }

        self.publish().await
    }

    /// Resolves dirty paths to files needing a summary.
    ///
    /// Directories expand to their candidate files, missing paths count as
    /// deleted, and files whose signal matches the store are skipped, whether
    /// named directly or found under a directory.
    async fn expand_dirty(&mut self, batch: &ChangeBatch) -> (Vec<PathBuf>, bool) {
        let mut files = BTreeSet::new();
        let mut vanished = false;

        for path in &batch.dirty {
            match tokio::fs::metadata(path).await {
                Ok(meta) if meta.is_dir() => {
                    let found = match scan_files_async(path.clone(), self.filter.clone()).await {
                        Ok(found) => found,
                        Err(e) => {
                            warn!("Could not scan {}: {}", path.display(), e);
                            continue;
                        }
                    };
                    for file in found {
                        let unchanged = match ModificationSignal::probe(&file).await {
                            Some(signal) => self.store.is_unchanged(&file, &signal),
                            None => false,
                        };
                        if !unchanged {
                            files.insert(file);
                        }
                    }
                }
                Ok(meta) => {
                    if self
                        .store
                        .is_unchanged(path, &ModificationSignal::from_metadata(&meta))
                    {
                        debug!("{} is unchanged, skipping", path.display());
                    } else {
                        files.insert(path.clone());
                    }
                }
                Err(_) => {
                    if !self.store.remove_prefix(path).is_empty() {
                        vanished = true;
                    }
                }
            }
        }

        (files.into_iter().collect(), vanished)
    }

    async fn publish(&mut self) -> ControlFlow<()> {
        let built = tokio::select! {
            _ = self.cancel.cancelled() => return ControlFlow::Break(()),
            built = self.builder.build(&self.store) => built,
        };

        let outcome = match built {
            Ok(plan) => {
                info!("Publishing plan with {} entries", plan.len());
                self.sender.send_plan(plan, &self.cancel).await
            }
            Err(e) => {
                warn!("Plan computation failed, keeping last plan: {}", e);
                self.sender.send_error(e, &self.cancel).await
            }
        };

        Self::continue_after(outcome)
    }

    async fn terminate(&mut self) -> ControlFlow<()> {
        let root = self.filter.root().display().to_string();
        warn!("Watched root {} is no longer available", root);
        let _ = self
            .sender
            .send_terminated(AppError::RootUnavailable { path: root }, &self.cancel)
            .await;
        ControlFlow::Break(())
    }

    fn continue_after(outcome: SendOutcome) -> ControlFlow<()> {
        match outcome {
            SendOutcome::Delivered => ControlFlow::Continue(()),
            SendOutcome::Cancelled => ControlFlow::Break(()),
            SendOutcome::Disconnected => {
                info!("Plan consumer went away, ending session");
                ControlFlow::Break(())
            }
        }
    }
}
