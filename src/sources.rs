//! External financial data consulted before the grid is built.
//!
//! A [`FinancialSource`] fills gaps in a record: per-year metrics the caller
//! did not send, and the BSE scrip code when `bom_code` is missing or not
//! numeric. Figures already in the record always win. A source that fails
//! simply contributes nothing; the pass carries on with what it has.

use crate::record::ReportRecord;
use futures::future::BoxFuture;

/// Supplier of financial metrics and exchange codes.
pub trait FinancialSource: Send + Sync {
    /// Flat metric map for an NSE symbol, e.g. `revenue_fy25`, `pe_fy26e`.
    fn metrics<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, Result<ReportRecord, String>>;

    /// BSE scrip code for a symbol, if one can be found.
    fn bse_code<'a>(&'a self, symbol: &'a str, company_name: &'a str) -> BoxFuture<'a, Option<String>>;
}

#[cfg(feature = "screener")]
pub use screener::ScreenerSource;

#[cfg(feature = "screener")]
mod screener {
    use super::FinancialSource;
    use crate::error::DeckError;
    use crate::record::ReportRecord;
    use futures::future::BoxFuture;
    use screener_client::{known_bse_code, ScreenerClient};
    use tracing::{debug, warn};

    /// [`FinancialSource`] backed by Screener.in with Yahoo quote enrichment.
    #[derive(Debug, Clone)]
    pub struct ScreenerSource {
        client: ScreenerClient,
    }

    impl ScreenerSource {
        pub fn new(timeout_secs: u64) -> Result<Self, DeckError> {
            let client = ScreenerClient::new(timeout_secs).map_err(|e| DeckError::Internal(e.to_string()))?;
            Ok(Self { client })
        }

        async fn fetch(&self, symbol: &str) -> Result<ReportRecord, String> {
            let snapshot = self
                .client
                .fetch_company(symbol)
                .await
                .map_err(|e| e.to_string())?;
            debug!("{symbol}: {} metrics from screener", snapshot.metrics.len());
            Ok(ReportRecord::from(snapshot.metrics.into_map()))
        }

        async fn lookup_bse(&self, symbol: &str, company_name: &str) -> Option<String> {
            if let Some(code) = known_bse_code(symbol) {
                return Some(code.to_string());
            }
            let found = self.client.yahoo().find_bse_code(symbol, company_name).await;
            if found.is_none() {
                warn!("No BSE code found for {symbol}");
            }
            found
        }
    }

    impl FinancialSource for ScreenerSource {
        fn metrics<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, Result<ReportRecord, String>> {
            Box::pin(self.fetch(symbol))
        }

        fn bse_code<'a>(&'a self, symbol: &'a str, company_name: &'a str) -> BoxFuture<'a, Option<String>> {
            Box::pin(self.lookup_bse(symbol, company_name))
        }
    }
}
