use crate::error::ScreenerError;
use crate::extract::extract;
use crate::metrics::Metrics;
use crate::yahoo::{YahooClient, USER_AGENT};
use chrono::{DateTime, Local};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

pub const SCREENER_BASE_URL: &str = "https://www.screener.in";

/// Company pages are tried in this order; consolidated figures first.
const PAGE_SUFFIXES: [&str; 2] = ["/consolidated/", "/"];

/// Marker present on every page that carries financial tables.
const DATA_MARKER: &str = "data-table";

/// Metrics for one company at one point in time.
#[derive(Debug, Clone, Serialize)]
pub struct CompanySnapshot {
    pub code: String,
    pub fetched_at: DateTime<Local>,
    pub metrics: Metrics,
}

#[derive(Debug, Clone)]
pub struct ScreenerClient {
    http: reqwest::Client,
    base_url: String,
    yahoo: YahooClient,
}

impl ScreenerClient {
    pub fn new(timeout_secs: u64) -> Result<Self, ScreenerError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("text/html,application/xhtml+xml"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: SCREENER_BASE_URL.to_string(),
            yahoo: YahooClient::new(timeout_secs)?,
        })
    }

    /// Point at another host, e.g. a local mirror in tests.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn yahoo(&self) -> &YahooClient {
        &self.yahoo
    }

    /// Scrape a company page and overlay Yahoo quote data.
    ///
    /// Yahoo values replace scraped ones where both exist.
    pub async fn fetch_company(&self, code: &str) -> Result<CompanySnapshot, ScreenerError> {
        let code = code.trim().to_ascii_uppercase();
        if code.is_empty() || code.contains(['/', '?', '#']) {
            return Err(ScreenerError::InvalidCode(code));
        }

        let html = self
            .fetch_page(&code)
            .await
            .ok_or_else(|| ScreenerError::NotFound { code: code.clone() })?;
        let mut metrics = extract(&html);
        debug!("{code}: {} metrics from page", metrics.len());

        metrics.overlay(self.yahoo.quote_metrics(&code).await);
        if metrics.is_empty() {
            return Err(ScreenerError::NoData { code });
        }
        info!("{code}: {} metrics", metrics.len());
        Ok(CompanySnapshot {
            code,
            fetched_at: Local::now(),
            metrics,
        })
    }

    async fn fetch_page(&self, code: &str) -> Option<String> {
        for suffix in PAGE_SUFFIXES {
            let url = format!("{}/company/{code}{suffix}", self.base_url);
            let response = match self.http.get(&url).send().await {
                Ok(r) => r,
                Err(e) => {
                    debug!("{url}: {e}");
                    continue;
                }
            };
            if !response.status().is_success() {
                debug!("{url}: HTTP {}", response.status());
                continue;
            }
            match response.text().await {
                Ok(body) if body.contains(DATA_MARKER) => return Some(body),
                Ok(_) => debug!("{url}: no financial tables"),
                Err(e) => debug!("{url}: {e}"),
            }
        }
        None
    }
}
