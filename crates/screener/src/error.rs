use thiserror::Error;

/// Errors from the scraper.
///
/// Yahoo enrichment never produces one of these: it is best effort and
/// degrades to an empty map.
#[derive(Debug, Error)]
pub enum ScreenerError {
    /// Neither the consolidated nor the standalone page has financial tables.
    #[error("Company '{code}' not found on Screener.in")]
    NotFound { code: String },

    /// The page was found but nothing could be extracted from it.
    #[error("No data extracted for '{code}'")]
    NoData { code: String },

    /// Empty or malformed company code.
    #[error("Invalid company code: {0:?}")]
    InvalidCode(String),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}
