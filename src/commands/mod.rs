pub mod files;
pub mod organization;
pub mod system;
pub mod watch_mode;

#[cfg(test)]
mod tests;

pub use files::commit;
pub use organization::compute_plan;
pub use system::{health, HealthStatus};
pub use watch_mode::start_watch;

use crate::error::{AppError, Result};
use std::path::{Path, PathBuf};

/// Canonical form of a root directory given by the caller
pub(crate) fn resolve_root(root: &Path) -> Result<PathBuf> {
    let canonical = std::fs::canonicalize(root).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AppError::FileNotFound {
                path: root.display().to_string(),
            }
        } else {
            AppError::Io(e)
        }
    })?;

    if !canonical.is_dir() {
        return Err(AppError::InvalidPath {
            message: format!("Not a directory: {}", root.display()),
        });
    }

    Ok(canonical)
}
