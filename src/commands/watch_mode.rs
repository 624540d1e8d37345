use crate::commands::resolve_root;
use crate::core::PathFilter;
use crate::error::Result;
use crate::services::watch_session::{spawn_session, WatchHandle, WatchSettings};
use crate::state::AppState;
use std::path::Path;
use tracing::info;

/// Starts a watch session on `root`. Plans arrive through the returned handle.
pub async fn start_watch(state: &AppState, root: &Path) -> Result<WatchHandle> {
    let config = state.config_snapshot();
    let root = resolve_root(root)?;

    let handle = spawn_session(
        PathFilter::new(&root, &config),
        WatchSettings::from_config(&config),
        state.summarizer.clone(),
        state.classifier.clone(),
    )?;

    info!(
        session_id = %handle.context().session_id,
        "Started watching {}",
        root.display()
    );
    Ok(handle)
}
