use crate::commands::resolve_root;
use crate::core::scanner::{scan_files_async, PathFilter};
use crate::core::summarize::{refresh_store, summarize_paths, SummaryLimits};
use crate::core::{PlanBuilder, ReorganizationPlan, SummaryStore};
use crate::error::Result;
use crate::state::AppState;
use std::path::Path;
use tracing::info;

/// One-shot plan for everything currently under `root`
pub async fn compute_plan(state: &AppState, root: &Path) -> Result<ReorganizationPlan> {
    let config = state.config_snapshot();
    let root = resolve_root(root)?;
    let filter = PathFilter::new(&root, &config);

    let files = scan_files_async(root.clone(), filter).await?;
    info!("Computing plan for {} files under {}", files.len(), root.display());

    let results = summarize_paths(
        state.summarizer.clone(),
        files,
        SummaryLimits::from_config(&config),
    )
    .await;

    let mut store = SummaryStore::new(&root);
    let report = refresh_store(&mut store, results);
    if report.failed > 0 {
        info!("{} files could not be summarized and were skipped", report.failed);
    }

    PlanBuilder::new(state.classifier.clone(), config.oracle_timeout())
        .build(&store)
        .await
}
