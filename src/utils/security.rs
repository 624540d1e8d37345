use crate::error::{AppError, Result};
use std::path::{Component, Path, PathBuf};

/// Checks that `path` is a non-empty relative path made only of normal components.
///
/// `.` segments are dropped; `..`, root and drive prefixes are rejected.
/// Returns the normalized path.
pub fn validate_relative_path(path: &Path) -> Result<PathBuf> {
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(AppError::InvalidPath {
                    message: format!("Path traversal not allowed: {}", path.display()),
                });
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(AppError::InvalidPath {
                    message: format!("Path must be relative: {}", path.display()),
                });
            }
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(AppError::InvalidPath {
            message: "Path cannot be empty".to_string(),
        });
    }

    Ok(normalized)
}

/// Joins a validated relative path onto `base`
pub fn resolve_within(base: &Path, relative: &Path) -> Result<PathBuf> {
    Ok(base.join(validate_relative_path(relative)?))
}

/// Returns `path` relative to `root`, or `None` if it lies outside it
pub fn relative_to(root: &Path, path: &Path) -> Option<PathBuf> {
    path.strip_prefix(root).ok().map(Path::to_path_buf)
}
