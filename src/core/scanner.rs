use crate::config::Config;
use crate::core::commit::STAGING_MARKER;
use crate::error::{AppError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Ignore rules shared by the scanner and the watcher
#[derive(Debug, Clone)]
pub struct PathFilter {
    root: PathBuf,
    excluded_extensions: Vec<String>,
    excluded_directories: Vec<String>,
    include_hidden: bool,
    max_depth: usize,
}

impl PathFilter {
    pub fn new(root: &Path, config: &Config) -> Self {
        Self {
            root: root.to_path_buf(),
            excluded_extensions: config
                .excluded_extensions
                .iter()
                .map(|e| e.to_lowercase())
                .collect(),
            excluded_directories: config
                .excluded_directories
                .iter()
                .map(|d| d.to_lowercase())
                .collect(),
            include_hidden: config.include_hidden,
            max_depth: config.max_scan_depth,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// True when `path` should never reach the summarizer
    pub fn is_ignored(&self, path: &Path) -> bool {
        let relative = match path.strip_prefix(&self.root) {
            Ok(relative) => relative,
            Err(_) => return true,
        };

        let components: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect();

        let Some((file_name, parents)) = components.split_last() else {
            // The root itself
            return false;
        };

        for dir in parents {
            if self.excluded_directories.contains(&dir.to_lowercase()) {
                return true;
            }
            if !self.include_hidden && dir.starts_with('.') {
                return true;
            }
        }

        self.is_ignored_name(file_name)
    }

    fn is_ignored_name(&self, file_name: &str) -> bool {
        if file_name.contains(STAGING_MARKER) {
            return true;
        }

        if self.excluded_directories.contains(&file_name.to_lowercase()) {
            return true;
        }

        if let Some(extension) = Path::new(file_name).extension().and_then(|e| e.to_str()) {
            let ext_lower = format!(".{}", extension.to_lowercase());
            if self.excluded_extensions.contains(&ext_lower) {
                return true;
            }
        }

        if !self.include_hidden && file_name.starts_with('.') {
            return true;
        }

        file_name.starts_with('~')
            || file_name.ends_with('~')
            || file_name == "Thumbs.db"
            || file_name == ".DS_Store"
    }
}

/// Lists every candidate file under `path`, sorted.
///
/// `path` may be the filter's root or any directory beneath it.
pub fn scan_files(path: &Path, filter: &PathFilter) -> Result<Vec<PathBuf>> {
    if !path.is_dir() {
        return Err(AppError::InvalidPath {
            message: format!("Not a directory: {}", path.display()),
        });
    }

    let mut files = Vec::new();
    let walker = WalkDir::new(path)
        .max_depth(filter.max_depth)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !filter.is_ignored(entry.path()));

    for entry in walker {
        match entry {
            Ok(entry) if entry.file_type().is_file() => files.push(entry.into_path()),
            Ok(_) => {}
            Err(e) => {
                // Entries can vanish or be unreadable mid-walk
                warn!("Skipping unreadable entry under {}: {}", path.display(), e);
            }
        }
    }

    files.sort();
    debug!("Scanned {} candidate files under {}", files.len(), path.display());
    Ok(files)
}

/// Runs [`scan_files`] on the blocking pool
pub async fn scan_files_async(path: PathBuf, filter: PathFilter) -> Result<Vec<PathBuf>> {
    tokio::task::spawn_blocking(move || scan_files(&path, &filter))
        .await
        .map_err(|e| AppError::Other(anyhow::anyhow!("Scan task failed: {}", e)))?
}
