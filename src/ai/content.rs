use crate::error::{AppError, Result};
use std::path::Path;
use tokio::io::AsyncReadExt;

/// Bytes inspected when deciding whether a file is binary
const SNIFF_LEN: usize = 8 * 1024;

pub fn guess_mime(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .to_string()
}

/// Returns true when the leading bytes look like binary data
pub fn looks_binary(bytes: &[u8]) -> bool {
    bytes.iter().take(SNIFF_LEN).any(|b| *b == 0)
}

/// Read at most `max_chars` characters of a text file. A cut excerpt ends
/// with a `[...]` marker.
///
/// Fails with `UnsupportedFile` for binary content.
pub async fn read_text_excerpt(path: &Path, max_chars: usize) -> Result<String> {
    let metadata = tokio::fs::metadata(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AppError::FileNotFound {
                path: path.display().to_string(),
            }
        } else {
            AppError::Io(e)
        }
    })?;

    if !metadata.is_file() {
        return Err(AppError::UnsupportedFile {
            path: path.display().to_string(),
            reason: "not a regular file".to_string(),
        });
    }

    // UTF-8 needs at most 4 bytes per char
    let byte_budget = max_chars.saturating_mul(4) as u64;
    let file = tokio::fs::File::open(path).await?;
    let mut buffer = Vec::with_capacity(byte_budget.min(metadata.len()) as usize);
    file.take(byte_budget).read_to_end(&mut buffer).await?;

    if looks_binary(&buffer) {
        return Err(AppError::UnsupportedFile {
            path: path.display().to_string(),
            reason: "binary content".to_string(),
        });
    }

    let (decoded, _, _) = encoding_rs::UTF_8.decode(&buffer);
    let mut text: String = decoded.chars().take(max_chars).collect();
    if metadata.len() > buffer.len() as u64 || text.len() < decoded.len() {
        text.push_str("\n[...]");
    }

    Ok(text)
}
