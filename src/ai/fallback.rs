use crate::ai::content::{guess_mime, read_text_excerpt};
use crate::ai::{Classifier, FileSummary, PlanEntry, Summarizer};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Offline, rule-based summarizer and classifier
pub struct FallbackEngine {
    max_input_chars: usize,
}

impl FallbackEngine {
    pub fn new(max_input_chars: usize) -> Self {
        Self { max_input_chars }
    }
}

/// Folder a file lands in, keyed by extension
pub fn category_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "jpg" | "jpeg" | "png" | "gif" | "bmp" | "webp" | "heic" | "svg" => "Images",
        "mp4" | "avi" | "mkv" | "mov" | "webm" => "Videos",
        "mp3" | "wav" | "flac" | "m4a" | "ogg" => "Audio",
        "pdf" | "doc" | "docx" | "txt" | "rtf" | "odt" | "pages" | "md" => "Documents",
        "ppt" | "pptx" | "pptm" | "ppsx" | "key" | "odp" => "Presentations",
        "xls" | "xlsx" | "xlsm" | "csv" | "numbers" | "ods" => "Spreadsheets",
        "rs" | "py" | "js" | "ts" | "go" | "c" | "h" | "cpp" | "java" | "sh" | "toml"
        | "yaml" | "yml" | "json" => "Code",
        "stl" | "obj" | "3mf" | "gcode" | "blend" | "fbx" => "3D Print Files",
        "zip" | "rar" | "7z" | "tar" | "gz" => "Archives",
        _ => "Other",
    }
}

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

#[async_trait]
impl Summarizer for FallbackEngine {
    async fn summarize(&self, path: &Path) -> Result<FileSummary> {
        let metadata = tokio::fs::metadata(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::FileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                AppError::Io(e)
            }
        })?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let mime_type = guess_mime(path);
        let size = human_size(metadata.len());

        let first_line = match read_text_excerpt(path, self.max_input_chars).await {
            Ok(excerpt) => excerpt
                .lines()
                .map(str::trim)
                .find(|line| !line.is_empty())
                .map(|line| line.chars().take(120).collect::<String>()),
            Err(AppError::UnsupportedFile { .. }) => None,
            Err(e) => return Err(e),
        };

        let summary = match first_line {
            Some(line) => format!(
                "{} file '{}' ({}) beginning with: {}",
                category_for(path),
                file_name,
                size,
                line
            ),
            None => format!(
                "{} file '{}' ({}, {})",
                category_for(path),
                file_name,
                mime_type,
                size
            ),
        };

        Ok(FileSummary {
            path: path.to_path_buf(),
            summary,
        })
    }
}

#[async_trait]
impl Classifier for FallbackEngine {
    async fn classify(&self, summaries: &[FileSummary]) -> Result<Vec<PlanEntry>> {
        Ok(summaries
            .iter()
            .map(|summary| {
                let file_name = summary
                    .path
                    .file_name()
                    .map(PathBuf::from)
                    .unwrap_or_else(|| summary.path.clone());
                PlanEntry {
                    src_path: summary.path.clone(),
                    dst_path: Path::new(category_for(&summary.path)).join(file_name),
                    summary: summary.summary.clone(),
                }
            })
            .collect())
    }
}
