//! Input resolution: a local path or URL → [`UploadedFile`].
//!
//! Used by the CLI, where the user names a file rather than uploading one.
//! The MIME type comes from the `Content-Type` header (URLs), then the file
//! extension, then magic bytes. Anything unrecognised is labelled
//! `application/octet-stream`, which the extractor rejects.

use crate::error::FlashcardError;
use crate::output::UploadedFile;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve a path or URL to file bytes with a MIME type.
pub async fn resolve_file(input: &str, timeout_secs: u64) -> Result<UploadedFile, FlashcardError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(input).await
    }
}

/// MIME type for a file extension, if it is one the extractor handles.
pub fn mime_from_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "webp" => "image/webp",
        _ => return None,
    };
    Some(mime)
}

/// MIME type from the leading bytes of a file.
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"%PDF") {
        Some("application/pdf")
    } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("image/png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else {
        None
    }
}

fn guess_mime(path: &Path, bytes: &[u8]) -> String {
    mime_from_extension(path)
        .or_else(|| sniff_mime(bytes))
        .unwrap_or("application/octet-stream")
        .to_string()
}

fn file_name_of(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

async fn read_local(path_str: &str) -> Result<UploadedFile, FlashcardError> {
    let path = PathBuf::from(path_str);

    let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
            FlashcardError::FileNotFound { path: path.clone() }
        }
        _ => FlashcardError::Internal(format!("Failed to read '{}': {}", path.display(), e)),
    })?;

    let mime_type = guess_mime(&path, &bytes);
    debug!("Resolved local file {} as {}", path.display(), mime_type);

    Ok(UploadedFile {
        bytes,
        mime_type,
        file_name: file_name_of(&path),
    })
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<UploadedFile, FlashcardError> {
    info!("Downloading file from: {}", url);

    let download_failed = |reason: String| FlashcardError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| download_failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            download_failed(format!("timed out after {timeout_secs}s"))
        } else {
            download_failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(download_failed(format!("HTTP {}", response.status())));
    }

    let header_mime = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
        .filter(|v| !v.is_empty() && v != "application/octet-stream");

    let url_path = reqwest::Url::parse(url)
        .map(|u| PathBuf::from(u.path()))
        .unwrap_or_default();

    let bytes = response
        .bytes()
        .await
        .map_err(|e| download_failed(e.to_string()))?
        .to_vec();

    let mime_type = header_mime.unwrap_or_else(|| guess_mime(&url_path, &bytes));
    info!("Downloaded {} bytes ({})", bytes.len(), mime_type);

    Ok(UploadedFile {
        bytes,
        mime_type,
        file_name: file_name_of(&url_path),
    })
}
