use crate::core::commit::{execute_commit, CommitOutcome, CommitRequest};
use crate::error::Result;
use crate::state::AppState;
use tracing::{info, warn};

/// Applies one approved plan entry on disk
pub async fn commit(_state: &AppState, request: CommitRequest) -> Result<CommitOutcome> {
    info!(
        "Committing {} -> {} under {}",
        request.src_path.display(),
        request.dst_path.display(),
        request.base_path.display()
    );

    match execute_commit(&request).await {
        Ok(outcome) => Ok(outcome),
        Err(e) => {
            warn!("Commit of {} failed: {}", request.src_path.display(), e);
            Err(e)
        }
    }
}
