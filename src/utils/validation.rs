use crate::config::AllowedMimes;
use crate::error::{MediaError, MediaResult};
use std::path::Path;

pub const MAX_ALT_LENGTH: usize = 255;
pub const MAX_TITLE_LENGTH: usize = 255;
pub const MAX_CAPTION_LENGTH: usize = 1000;

/// Strip parameters and lower-case a declared content type
pub fn normalize_mime(content_type: &str) -> String {
    content_type
        .parse::<mime::Mime>()
        .map(|m| m.essence_str().to_lowercase())
        .unwrap_or_else(|_| {
            content_type
                .split(';')
                .next()
                .unwrap_or("")
                .trim()
                .to_lowercase()
        })
}

/// Resolve the MIME type of an upload. The declared type wins unless it is
/// missing or generic, in which case the content is sniffed.
pub fn detect_mime(declared: Option<&str>, data: &[u8]) -> String {
    let declared = declared.map(normalize_mime).filter(|m| !m.is_empty());
    match declared {
        Some(m) if m != "application/octet-stream" => m,
        other => infer::get(data)
            .map(|kind| kind.mime_type().to_string())
            .or(other)
            .unwrap_or_else(|| "application/octet-stream".to_string()),
    }
}

/// Validates file size against maximum limit
pub fn validate_file_size(size: u64, max_size: u64) -> MediaResult<()> {
    if size > max_size {
        return Err(MediaError::Validation(format!(
            "File size {} bytes exceeds maximum allowed {} bytes ({} KB)",
            size,
            max_size,
            max_size / 1024
        )));
    }
    Ok(())
}

/// Validates MIME type against the configured allow-lists
pub fn validate_mime_type(mime_type: &str, allowed: &AllowedMimes) -> MediaResult<()> {
    if allowed.contains(mime_type) {
        return Ok(());
    }
    Err(MediaError::Validation(format!(
        "File type '{}' is not allowed",
        mime_type
    )))
}

/// Rejects optional text fields that exceed `max` characters
pub fn validate_length(field: &str, value: Option<&str>, max: usize) -> MediaResult<()> {
    if let Some(v) = value {
        let len = v.chars().count();
        if len > max {
            return Err(MediaError::Validation(format!(
                "{} must be at most {} characters (got {})",
                field, max, len
            )));
        }
    }
    Ok(())
}

/// Sanitizes a client supplied filename down to a safe display name
pub fn sanitize_filename(filename: &str) -> MediaResult<String> {
    // Get only the filename component (remove any path)
    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    if name.trim().is_empty() {
        return Err(MediaError::Validation(
            "Filename cannot be empty".to_string(),
        ));
    }

    if filename.contains("..") || filename.contains('/') || filename.contains('\\') {
        tracing::warn!("Path components stripped from upload name: {}", filename);
    }

    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_control()
                || matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | ';')
            {
                '_'
            } else {
                c
            }
        })
        .collect();

    // Limit length safely for UTF-8
    let sanitized = if sanitized.len() > 255 {
        let mut end = 255;
        while !sanitized.is_char_boundary(end) {
            end -= 1;
        }
        sanitized[..end].to_string()
    } else {
        sanitized
    };

    Ok(sanitized)
}

/// Extension for the stored blob: the client's extension if it has a sane one,
/// otherwise one derived from the MIME type.
pub fn file_extension(filename: &str, mime_type: &str) -> String {
    let from_name = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .filter(|e| !e.is_empty() && e.len() <= 10 && e.chars().all(|c| c.is_ascii_alphanumeric()));

    if let Some(ext) = from_name {
        return ext;
    }

    match mime_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/svg+xml" => "svg",
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "application/pdf" => "pdf",
        "text/plain" => "txt",
        "text/csv" => "csv",
        _ => "bin",
    }
    .to_string()
}
