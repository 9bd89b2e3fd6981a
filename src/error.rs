//! Error types for the research-deck library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`DeckError`] — **Fatal**: the deck cannot be produced at all
//!   (template missing, package corrupt, output not writable). Returned as
//!   `Err(DeckError)` from the top-level `generate*` functions.
//!
//! * [`FieldError`] — **Non-fatal**: a single field failed (image host
//!   unreachable, bytes are not an image, slot points past the last slide)
//!   but every other field is fine. Stored inside
//!   [`crate::output::FieldOutcome::Failed`] so callers see partial success
//!   instead of losing the whole report to one broken chart URL.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the research-deck library.
///
/// Field-level failures use [`FieldError`] and are stored in
/// [`crate::output::PopulationResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum DeckError {
    // ── Template errors ───────────────────────────────────────────────────
    /// Template file was not found at the given path.
    #[error("Template not found: '{path}'\nCheck the path exists or pass --template.")]
    TemplateNotFound { path: PathBuf },

    /// Process does not have read permission on the template.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The template string is neither a file path nor an HTTP(S) URL.
    #[error("Invalid template '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// Template URL was syntactically valid but the download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Template download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file was read but is not a zip-based presentation.
    #[error("File is not a .pptx package: '{path}'\nFirst bytes: {magic:?}")]
    NotAPresentation { path: PathBuf, magic: [u8; 4] },

    // ── Package errors ────────────────────────────────────────────────────
    /// A package part exists but cannot be parsed.
    #[error("Template part '{part}' is malformed: {detail}")]
    MalformedTemplate { part: String, detail: String },

    /// A part every presentation needs is absent.
    #[error("Template is missing required part '{part}'")]
    MissingPart { part: String },

    // ── Input errors ──────────────────────────────────────────────────────
    /// The report payload is not a JSON object.
    #[error("Invalid report record: {0}")]
    InvalidRecord(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output deck.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DeckError {
    pub(crate) fn malformed(part: impl Into<String>, detail: impl ToString) -> Self {
        DeckError::MalformedTemplate {
            part: part.into(),
            detail: detail.to_string(),
        }
    }
}

/// A non-fatal error for a single field.
///
/// Stored in [`crate::output::FieldOutcome::Failed`]. Generation continues
/// with the remaining fields and the deck is still saved.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum FieldError {
    /// Image request failed before a response arrived.
    #[error("{field}: download of '{url}' failed: {detail}")]
    DownloadFailed {
        field: String,
        url: String,
        detail: String,
    },

    /// Image request exceeded the configured timeout.
    #[error("{field}: download of '{url}' timed out after {secs}s")]
    DownloadTimeout {
        field: String,
        url: String,
        secs: u64,
    },

    /// Image host answered with a non-success status.
    #[error("{field}: '{url}' returned HTTP {status}")]
    HttpStatus {
        field: String,
        url: String,
        status: u16,
    },

    /// Downloaded bytes are not a decodable raster image.
    #[error("{field}: image could not be decoded: {detail}")]
    UndecodableImage { field: String, detail: String },

    /// Slot points at a slide the template does not have.
    #[error("{field}: slide {slide} is out of range (template has {total} slides)")]
    SlideOutOfRange {
        field: String,
        slide: usize,
        total: usize,
    },

    /// Token shape has no explicit geometry to inherit.
    #[error("{field}: placeholder shape '{shape}' has no position to place an image at")]
    NoGeometry { field: String, shape: String },
}

impl FieldError {
    /// Rebind the error to a different field name.
    ///
    /// Fetchers do not know which field a URL belongs to; the orchestrator
    /// fills it in once the error reaches it.
    pub fn for_field(self, name: &str) -> Self {
        let field = name.to_string();
        match self {
            FieldError::DownloadFailed { url, detail, .. } => {
                FieldError::DownloadFailed { field, url, detail }
            }
            FieldError::DownloadTimeout { url, secs, .. } => {
                FieldError::DownloadTimeout { field, url, secs }
            }
            FieldError::HttpStatus { url, status, .. } => {
                FieldError::HttpStatus { field, url, status }
            }
            FieldError::UndecodableImage { detail, .. } => {
                FieldError::UndecodableImage { field, detail }
            }
            FieldError::SlideOutOfRange { slide, total, .. } => {
                FieldError::SlideOutOfRange {
                    field,
                    slide,
                    total,
                }
            }
            FieldError::NoGeometry { shape, .. } => FieldError::NoGeometry { field, shape },
        }
    }
}
