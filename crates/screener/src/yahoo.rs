//! Yahoo Finance enrichment: volume, consensus target, forward P/E and
//! growth estimates, plus BSE code lookup.
//!
//! Everything here is best effort. Network and decode failures are logged
//! and produce an empty result.

use crate::error::ScreenerError;
use crate::metrics::Metrics;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

const QUOTE_SUMMARY_URL: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary";
const SEARCH_URL: &str = "https://query2.finance.yahoo.com/v1/finance/search";
const SUMMARY_MODULES: &str = "price,financialData,defaultKeyStatistics,summaryDetail";

pub(crate) const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// NSE symbol → BSE scrip code for large caps, consulted before searching.
const KNOWN_BSE_CODES: &[(&str, &str)] = &[
    ("WIPRO", "507685"),
    ("TCS", "532540"),
    ("INFY", "500209"),
    ("RELIANCE", "500325"),
    ("HDFCBANK", "500180"),
    ("ICICIBANK", "532174"),
    ("SBIN", "500112"),
    ("BHARTIARTL", "532454"),
    ("ITC", "500875"),
    ("HINDUNILVR", "500696"),
    ("KOTAKBANK", "500247"),
    ("LT", "500510"),
    ("AXISBANK", "532215"),
    ("ASIANPAINT", "500820"),
    ("MARUTI", "532500"),
    ("TATAMOTORS", "500570"),
    ("SUNPHARMA", "524715"),
    ("TITAN", "500114"),
    ("BAJFINANCE", "500034"),
    ("HCLTECH", "532281"),
];

/// BSE code from the built-in table (case-insensitive).
pub fn known_bse_code(symbol: &str) -> Option<&'static str> {
    let symbol = symbol.trim();
    KNOWN_BSE_CODES
        .iter()
        .find(|(s, _)| s.eq_ignore_ascii_case(symbol))
        .map(|(_, code)| *code)
}

/// Tickers to try for a code: numeric codes are BSE-only.
fn tickers_for(code: &str) -> Vec<String> {
    if !code.is_empty() && code.chars().all(|c| c.is_ascii_digit()) {
        vec![format!("{code}.BO")]
    } else {
        vec![format!("{code}.NS"), format!("{code}.BO")]
    }
}

#[derive(Debug, Clone)]
pub struct YahooClient {
    http: reqwest::Client,
}

impl YahooClient {
    pub fn new(timeout_secs: u64) -> Result<Self, ScreenerError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self { http })
    }

    /// Quote metrics for a company code; empty when no ticker resolves.
    pub async fn quote_metrics(&self, code: &str) -> Metrics {
        let code = code.trim().to_ascii_uppercase();
        if code.is_empty() {
            return Metrics::new();
        }
        for ticker in tickers_for(&code) {
            match self.quote_summary(&ticker).await {
                Ok(summary) => {
                    if let Some(m) = metrics_from_summary(&summary) {
                        debug!("{ticker}: {} metrics from Yahoo", m.len());
                        return m;
                    }
                }
                Err(e) => debug!("{ticker}: quote summary failed: {e}"),
            }
        }
        Metrics::new()
    }

    async fn quote_summary(&self, ticker: &str) -> Result<Value, reqwest::Error> {
        self.http
            .get(format!("{QUOTE_SUMMARY_URL}/{ticker}"))
            .query(&[("modules", SUMMARY_MODULES)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }

    /// Search by symbol, then company name, for the first `.BO` listing.
    pub async fn find_bse_code(&self, symbol: &str, company_name: &str) -> Option<String> {
        let queries = [symbol.trim(), company_name.trim()];
        for query in queries.into_iter().filter(|q| !q.is_empty()) {
            debug!("Searching Yahoo Finance for {query:?}");
            match self.search(query).await {
                Ok(body) => {
                    if let Some(code) = bse_code_from_search(&body) {
                        return Some(code);
                    }
                }
                Err(e) => warn!("Yahoo search for {query:?} failed: {e}"),
            }
        }
        None
    }

    async fn search(&self, query: &str) -> Result<Value, reqwest::Error> {
        self.http
            .get(SEARCH_URL)
            .query(&[("q", query), ("quotesCount", "10"), ("newsCount", "0")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }
}

/// `{"raw": 1.23, "fmt": "1.23"}` → `1.23`; bare numbers pass through.
fn raw(module: &Value, field: &str) -> Option<f64> {
    let v = module.get(field)?;
    v.get("raw").unwrap_or(v).as_f64().filter(|x| *x != 0.0)
}

/// Metrics from a `quoteSummary` body; `None` if it carries no price.
pub(crate) fn metrics_from_summary(body: &Value) -> Option<Metrics> {
    let result = body.pointer("/quoteSummary/result/0")?;
    let null = Value::Null;
    let price = result.get("price").unwrap_or(&null);
    let financial = result.get("financialData").unwrap_or(&null);
    let stats = result.get("defaultKeyStatistics").unwrap_or(&null);
    let detail = result.get("summaryDetail").unwrap_or(&null);

    let current = raw(financial, "currentPrice").or_else(|| raw(price, "regularMarketPrice"))?;

    let mut m = Metrics::new();
    if let Some(volume) = raw(detail, "volume").or_else(|| raw(price, "regularMarketVolume")) {
        m.set("volume", volume);
    }
    if let Some(target) = raw(financial, "targetMeanPrice") {
        m.set_rounded("consensus_target", target, 2);
        m.set_rounded("consensus_upside", (target - current) / current * 100.0, 2);
    }
    if let Some(fwd) = raw(stats, "forwardPE").or_else(|| raw(detail, "forwardPE")) {
        m.set_rounded("pe_fy26e", fwd, 2);
    }
    if let Some(g) = raw(financial, "revenueGrowth") {
        m.set_rounded("revenue_cagr_fwd", g * 100.0, 2);
    }
    if let Some(g) = raw(financial, "earningsGrowth") {
        m.set_rounded("pat_cagr_fwd", g * 100.0, 2);
    }
    Some(m)
}

/// Prefix of the first `.BO` symbol in a search body.
pub(crate) fn bse_code_from_search(body: &Value) -> Option<String> {
    body.get("quotes")?
        .as_array()?
        .iter()
        .filter_map(|q| q.get("symbol").and_then(Value::as_str))
        .find_map(|s| s.strip_suffix(".BO"))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn known_codes_ignore_case() {
        assert_eq!(known_bse_code("wipro"), Some("507685"));
        assert_eq!(known_bse_code(" TCS "), Some("532540"));
        assert_eq!(known_bse_code("ACME"), None);
    }

    #[test]
    fn numeric_codes_only_try_bse() {
        assert_eq!(tickers_for("500209"), vec!["500209.BO"]);
        assert_eq!(tickers_for("INFY"), vec!["INFY.NS", "INFY.BO"]);
    }

    #[test]
    fn summary_maps_to_metrics() {
        let body = json!({"quoteSummary": {"result": [{
            "price": {"regularMarketPrice": {"raw": 200.0}, "regularMarketVolume": {"raw": 12345}},
            "financialData": {
                "currentPrice": {"raw": 200.0},
                "targetMeanPrice": {"raw": 250.0},
                "revenueGrowth": {"raw": 0.123},
                "earningsGrowth": {"raw": -0.05}
            },
            "defaultKeyStatistics": {"forwardPE": {"raw": 18.456}},
            "summaryDetail": {}
        }]}});
        let m = metrics_from_summary(&body).unwrap();
        assert_eq!(m.get("volume"), Some(12345.0));
        assert_eq!(m.get("consensus_target"), Some(250.0));
        assert_eq!(m.get("consensus_upside"), Some(25.0));
        assert_eq!(m.get("pe_fy26e"), Some(18.46));
        assert_eq!(m.get("revenue_cagr_fwd"), Some(12.3));
        assert_eq!(m.get("pat_cagr_fwd"), Some(-5.0));
    }

    #[test]
    fn summary_without_price_is_rejected() {
        let body = json!({"quoteSummary": {"result": [{"financialData": {}}]}});
        assert!(metrics_from_summary(&body).is_none());
        assert!(metrics_from_summary(&json!({})).is_none());
    }

    #[test]
    fn search_picks_first_bse_listing() {
        let body = json!({"quotes": [
            {"symbol": "WIPRO.NS"},
            {"symbol": "507685.BO"},
            {"symbol": "WIPRO.BO"}
        ]});
        assert_eq!(bse_code_from_search(&body).as_deref(), Some("507685"));
        assert_eq!(bse_code_from_search(&json!({"quotes": []})), None);
    }
}
