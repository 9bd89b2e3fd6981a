//! # screener-client
//!
//! Scrape [Screener.in](https://www.screener.in) company pages into a flat
//! metric map, enriched with Yahoo Finance quote data.
//!
//! ## How it works
//!
//! On [`ScreenerClient::fetch_company`]:
//!
//! 1. Fetches `/company/{code}/consolidated/`, falling back to the standalone
//!    page, and keeps the first one that carries financial tables.
//! 2. Reads the top ratios, sector links, and the quarterly, profit & loss,
//!    balance sheet, ratio and shareholding tables.
//! 3. Derives growth, margins, valuation multiples and cash approximations,
//!    then projects FY26–FY28 estimates from historical CAGR.
//! 4. Overlays volume, consensus target and forward estimates from Yahoo.
//!
//! Keys follow one convention: `{metric}_fy{yy}` for fiscal years,
//! `{metric}_ttm` for trailing twelve months.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use screener_client::ScreenerClient;
//!
//! # async fn run() -> Result<(), screener_client::ScreenerError> {
//! let client = ScreenerClient::new(15)?;
//! let snapshot = client.fetch_company("WIPRO").await?;
//! println!("P/E: {:?}", snapshot.metrics.get("pe_ttm"));
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod estimates;
mod extract;
mod metrics;
mod parse;
mod yahoo;

pub use client::{CompanySnapshot, ScreenerClient, SCREENER_BASE_URL};
pub use error::ScreenerError;
pub use estimates::{cagr, project_estimates};
pub use extract::extract;
pub use metrics::Metrics;
pub use parse::{parse_number, parse_table, year_key, SectionTable};
pub use yahoo::{known_bse_code, YahooClient};
