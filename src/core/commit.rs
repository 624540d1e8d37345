use crate::error::{AppError, Result};
use crate::utils::security::resolve_within;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::fs;
use tracing::{debug, info, warn};

/// Infix of the hidden sibling a cross-device move copies into
pub const STAGING_MARKER: &str = ".reshelve-partial-";

/// One approved move, both paths relative to `base_path`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRequest {
    pub base_path: PathBuf,
    pub src_path: PathBuf,
    pub dst_path: PathBuf,
}

/// Final absolute locations after a successful commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitOutcome {
    pub source: PathBuf,
    pub destination: PathBuf,
}

fn not_found(path: &Path) -> AppError {
    AppError::FileNotFound {
        path: path.display().to_string(),
    }
}

/// Moves `src_path` to `dst_path` under `base_path`.
///
/// Missing parent directories are created. A file committed onto an existing
/// directory lands inside it under its own name. An existing destination is
/// never overwritten.
pub async fn execute_commit(request: &CommitRequest) -> Result<CommitOutcome> {
    let source = resolve_within(&request.base_path, &request.src_path)?;
    let mut destination = resolve_within(&request.base_path, &request.dst_path)?;

    let source_meta = match fs::symlink_metadata(&source).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found(&source)),
        Err(e) => return Err(e.into()),
    };

    if !source_meta.is_dir() && fs::metadata(&destination).await.is_ok_and(|m| m.is_dir()) {
        if let Some(name) = source.file_name() {
            destination = destination.join(name);
        }
    }

    if fs::symlink_metadata(&destination).await.is_ok() {
        return Err(AppError::DestinationExists {
            path: destination.display().to_string(),
        });
    }

    if source_meta.is_dir() && destination.starts_with(&source) {
        return Err(AppError::InvalidOperation {
            message: format!(
                "Cannot move directory {} into itself",
                source.display()
            ),
        });
    }

    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).await?;
    }

    match fs::rename(&source, &destination).await {
        Ok(()) => {}
        Err(e) if is_cross_device(&e) => {
            debug!(
                "Rename across filesystems for {}, copying instead",
                source.display()
            );
            move_by_copy(&source, &destination).await?;
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found(&source)),
        Err(e) => return Err(e.into()),
    }

    info!("Moved {} to {}", source.display(), destination.display());
    Ok(CommitOutcome {
        source,
        destination,
    })
}

fn is_cross_device(error: &std::io::Error) -> bool {
    #[cfg(unix)]
    const EXDEV: i32 = 18;
    #[cfg(windows)]
    const EXDEV: i32 = 17; // ERROR_NOT_SAME_DEVICE
    #[cfg(not(any(unix, windows)))]
    const EXDEV: i32 = -1;

    error.raw_os_error() == Some(EXDEV)
}

fn staging_path(destination: &Path) -> Result<PathBuf> {
    let parent = destination.parent().ok_or_else(|| AppError::InvalidPath {
        message: format!("Destination has no parent: {}", destination.display()),
    })?;
    let name = destination
        .file_name()
        .ok_or_else(|| AppError::InvalidPath {
            message: format!("Destination has no file name: {}", destination.display()),
        })?
        .to_string_lossy();

    Ok(parent.join(format!(
        ".{}{}{}",
        name,
        STAGING_MARKER,
        uuid::Uuid::new_v4().simple()
    )))
}

/// Copy-then-delete move used when a rename cannot cross filesystems.
///
/// The copy is written to a hidden staging sibling of `destination` and renamed
/// into place once complete; the source is removed last.
pub(crate) async fn move_by_copy(source: &Path, destination: &Path) -> Result<()> {
    let staging = staging_path(destination)?;
    let file_type = fs::symlink_metadata(source).await?.file_type();
    let is_dir = file_type.is_dir();

    let copied = if is_dir {
        copy_dir_recursively(source, &staging).await
    } else if file_type.is_symlink() {
        copy_symlink(source, &staging).await
    } else {
        fs::copy(source, &staging).await.map(|_| ()).map_err(AppError::from)
    };

    if let Err(e) = copied {
        remove_staging(&staging, is_dir).await;
        return Err(e);
    }

    if fs::symlink_metadata(destination).await.is_ok() {
        remove_staging(&staging, is_dir).await;
        return Err(AppError::DestinationExists {
            path: destination.display().to_string(),
        });
    }

    if let Err(e) = fs::rename(&staging, destination).await {
        remove_staging(&staging, is_dir).await;
        return Err(e.into());
    }

    let removed = if is_dir {
        fs::remove_dir_all(source).await
    } else {
        fs::remove_file(source).await
    };
    if let Err(e) = removed {
        warn!(
            "Copied {} to {} but could not remove the source: {}",
            source.display(),
            destination.display(),
            e
        );
        return Err(e.into());
    }

    Ok(())
}

async fn remove_staging(staging: &Path, is_dir: bool) {
    let result = if is_dir {
        fs::remove_dir_all(staging).await
    } else {
        fs::remove_file(staging).await
    };
    if let Err(e) = result {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to clean up staging copy {}: {}", staging.display(), e);
        }
    }
}

fn copy_dir_recursively<'a>(
    source: &'a Path,
    destination: &'a Path,
) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
    Box::pin(async move {
        fs::create_dir_all(destination).await?;

        let mut entries = fs::read_dir(source).await?;
        while let Some(entry) = entries.next_entry().await? {
            let entry_path = entry.path();
            let dest_path = destination.join(entry.file_name());

            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                copy_dir_recursively(&entry_path, &dest_path).await?;
            } else if file_type.is_symlink() {
                copy_symlink(&entry_path, &dest_path).await?;
            } else {
                fs::copy(&entry_path, &dest_path).await?;
            }
        }

        Ok(())
    })
}

/// Recreates the link itself rather than copying what it points at
#[cfg(unix)]
async fn copy_symlink(source: &Path, destination: &Path) -> Result<()> {
    let target = fs::read_link(source).await?;
    fs::symlink(&target, destination).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn copy_symlink(source: &Path, destination: &Path) -> Result<()> {
    fs::copy(source, destination).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn request(base: &Path, src: &str, dst: &str) -> CommitRequest {
        CommitRequest {
            base_path: base.to_path_buf(),
            src_path: PathBuf::from(src),
            dst_path: PathBuf::from(dst),
        }
    }

    fn leftover_staging(dir: &Path) -> bool {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .any(|e| e.file_name().to_string_lossy().contains(STAGING_MARKER))
    }

    #[tokio::test]
    async fn test_commit_creates_parents_and_moves() {
        let dir = tempdir().unwrap();
        let base = dir.path();
        std::fs::create_dir_all(base.join("a")).unwrap();
        std::fs::write(base.join("a/b.txt"), "quarterly numbers").unwrap();

        let outcome = execute_commit(&request(base, "a/b.txt", "c/b.txt"))
            .await
            .unwrap();

        assert_eq!(outcome.destination, base.join("c/b.txt"));
        assert!(!base.join("a/b.txt").exists());
        assert_eq!(
            std::fs::read_to_string(base.join("c/b.txt")).unwrap(),
            "quarterly numbers"
        );

        let err = execute_commit(&request(base, "a/b.txt", "c/b.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn test_commit_into_existing_directory() {
        let dir = tempdir().unwrap();
        let base = dir.path();
        std::fs::create_dir_all(base.join("archive")).unwrap();
        std::fs::write(base.join("report.pdf"), "pdf").unwrap();

        let outcome = execute_commit(&request(base, "report.pdf", "archive"))
            .await
            .unwrap();

        assert_eq!(outcome.destination, base.join("archive/report.pdf"));
        assert!(base.join("archive/report.pdf").is_file());
    }

    #[tokio::test]
    async fn test_commit_refuses_to_overwrite() {
        let dir = tempdir().unwrap();
        let base = dir.path();
        std::fs::write(base.join("a.txt"), "new").unwrap();
        std::fs::create_dir_all(base.join("c")).unwrap();
        std::fs::write(base.join("c/a.txt"), "old").unwrap();

        let err = execute_commit(&request(base, "a.txt", "c/a.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DestinationExists { .. }));

        // Directory-merge resolves to the same existing file
        let err = execute_commit(&request(base, "a.txt", "c")).await.unwrap_err();
        assert!(matches!(err, AppError::DestinationExists { .. }));

        assert_eq!(std::fs::read_to_string(base.join("a.txt")).unwrap(), "new");
        assert_eq!(std::fs::read_to_string(base.join("c/a.txt")).unwrap(), "old");
    }

    #[tokio::test]
    async fn test_commit_rejects_traversal() {
        let dir = tempdir().unwrap();
        let base = dir.path();
        std::fs::write(base.join("a.txt"), "a").unwrap();

        for (src, dst) in [("a.txt", "../a.txt"), ("../a.txt", "b.txt"), ("a.txt", "/tmp/a.txt")] {
            let err = execute_commit(&request(base, src, dst)).await.unwrap_err();
            assert!(matches!(err, AppError::InvalidPath { .. }), "{} -> {}", src, dst);
        }
        assert!(base.join("a.txt").exists());
    }

    #[tokio::test]
    async fn test_commit_rejects_directory_into_itself() {
        let dir = tempdir().unwrap();
        let base = dir.path();
        std::fs::create_dir_all(base.join("photos")).unwrap();
        std::fs::write(base.join("photos/cat.jpg"), "jpg").unwrap();

        let err = execute_commit(&request(base, "photos", "photos/2024"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidOperation { .. }));
        assert!(!base.join("photos/2024").exists());
    }

    #[tokio::test]
    async fn test_commit_moves_directory() {
        let dir = tempdir().unwrap();
        let base = dir.path();
        std::fs::create_dir_all(base.join("old/nested")).unwrap();
        std::fs::write(base.join("old/nested/x.txt"), "x").unwrap();

        execute_commit(&request(base, "old", "projects/new"))
            .await
            .unwrap();
        assert!(base.join("projects/new/nested/x.txt").is_file());
        assert!(!base.join("old").exists());
    }

    #[tokio::test]
    async fn test_copy_fallback_moves_file() {
        let dir = tempdir().unwrap();
        let base = dir.path();
        std::fs::create_dir_all(base.join("dst")).unwrap();
        std::fs::write(base.join("src.txt"), "payload").unwrap();

        move_by_copy(&base.join("src.txt"), &base.join("dst/moved.txt"))
            .await
            .unwrap();

        assert!(!base.join("src.txt").exists());
        assert_eq!(
            std::fs::read_to_string(base.join("dst/moved.txt")).unwrap(),
            "payload"
        );
        assert!(!leftover_staging(&base.join("dst")));
    }

    #[tokio::test]
    async fn test_copy_fallback_moves_directory_tree() {
        let dir = tempdir().unwrap();
        let base = dir.path();
        std::fs::create_dir_all(base.join("tree/a/b")).unwrap();
        std::fs::write(base.join("tree/a/b/leaf.txt"), "leaf").unwrap();
        std::fs::write(base.join("tree/top.txt"), "top").unwrap();

        move_by_copy(&base.join("tree"), &base.join("copied"))
            .await
            .unwrap();

        assert!(!base.join("tree").exists());
        assert_eq!(
            std::fs::read_to_string(base.join("copied/a/b/leaf.txt")).unwrap(),
            "leaf"
        );
        assert!(base.join("copied/top.txt").is_file());
        assert!(!leftover_staging(base));
    }

    #[tokio::test]
    async fn test_copy_fallback_keeps_source_when_destination_appears() {
        let dir = tempdir().unwrap();
        let base = dir.path();
        std::fs::write(base.join("src.txt"), "payload").unwrap();
        std::fs::write(base.join("taken.txt"), "other").unwrap();

        let err = move_by_copy(&base.join("src.txt"), &base.join("taken.txt"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::DestinationExists { .. }));
        assert!(base.join("src.txt").exists());
        assert_eq!(std::fs::read_to_string(base.join("taken.txt")).unwrap(), "other");
        assert!(!leftover_staging(base));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_copy_fallback_moves_symlink_not_its_target() {
        let dir = tempdir().unwrap();
        let base = dir.path();
        std::fs::write(base.join("target.txt"), "real data").unwrap();
        std::os::unix::fs::symlink(base.join("target.txt"), base.join("link.txt")).unwrap();

        move_by_copy(&base.join("link.txt"), &base.join("moved-link.txt"))
            .await
            .unwrap();

        let moved = std::fs::symlink_metadata(base.join("moved-link.txt")).unwrap();
        assert!(moved.file_type().is_symlink());
        assert_eq!(
            std::fs::read_link(base.join("moved-link.txt")).unwrap(),
            base.join("target.txt")
        );
        assert!(std::fs::symlink_metadata(base.join("link.txt")).is_err());
        assert_eq!(std::fs::read_to_string(base.join("target.txt")).unwrap(), "real data");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_copy_failure_midway_removes_staging_and_keeps_source() {
        let dir = tempdir().unwrap();
        let base = dir.path();
        std::fs::create_dir_all(base.join("tree")).unwrap();
        std::fs::write(base.join("tree/a.txt"), "a").unwrap();
        std::fs::write(base.join("tree/b.txt"), "b").unwrap();
        // Opening a socket for reading fails, so the copy cannot complete
        let _listener = std::os::unix::net::UnixListener::bind(base.join("tree/s.sock")).unwrap();

        let result = move_by_copy(&base.join("tree"), &base.join("copied")).await;

        assert!(result.is_err());
        assert!(!leftover_staging(base));
        assert!(!base.join("copied").exists());
        assert_eq!(std::fs::read_to_string(base.join("tree/a.txt")).unwrap(), "a");
        assert!(base.join("tree/b.txt").exists());
    }

    #[test]
    fn test_cross_device_detection() {
        #[cfg(unix)]
        assert!(is_cross_device(&std::io::Error::from_raw_os_error(18)));
        assert!(!is_cross_device(&std::io::Error::new(
            std::io::ErrorKind::Other,
            "boom"
        )));
    }
}
