//! Template resolution: read a local `.pptx` or download one from a URL.
//!
//! The template is loaded into memory once per pass and parsed from the
//! bytes, so each pass owns an independent copy and nothing touches the
//! source file again. The zip magic (`PK\x03\x04`) is checked up front so a
//! wrong path yields a clear error instead of a zip parser complaint.

use crate::error::DeckError;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

const ZIP_MAGIC: [u8; 4] = *b"PK\x03\x04";

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Load the template bytes from a path or an http(s) URL.
pub async fn load_template(input: &str, timeout_secs: u64) -> Result<Vec<u8>, DeckError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(DeckError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download(input, timeout_secs).await
    } else if input.contains("://") {
        Err(DeckError::InvalidInput {
            input: input.to_string(),
        })
    } else {
        read_local(input).await
    }
}

/// `true` when the template path exists locally (URLs are not probed).
pub fn template_exists(input: &str) -> bool {
    is_url(input) || PathBuf::from(input).is_file()
}

async fn read_local(path_str: &str) -> Result<Vec<u8>, DeckError> {
    let path = PathBuf::from(path_str);
    let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => DeckError::TemplateNotFound { path: path.clone() },
        std::io::ErrorKind::PermissionDenied => DeckError::PermissionDenied { path: path.clone() },
        _ => DeckError::Internal(format!("reading {}: {e}", path.display())),
    })?;
    check_magic(&bytes, path)?;
    debug!("Loaded template {path_str} ({} bytes)", bytes.len());
    Ok(bytes)
}

async fn download(url: &str, timeout_secs: u64) -> Result<Vec<u8>, DeckError> {
    info!("Downloading template from: {}", url);

    let failed = |reason: String| DeckError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            DeckError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;
    check_magic(&bytes, PathBuf::from(url))?;
    Ok(bytes.to_vec())
}

fn check_magic(bytes: &[u8], path: PathBuf) -> Result<(), DeckError> {
    if bytes.len() < 4 || bytes[..4] != ZIP_MAGIC {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        return Err(DeckError::NotAPresentation { path, magic });
    }
    Ok(())
}
