use async_trait::async_trait;
use crate::{AnalysisError, FundamentalsSeries};

/// Remote source of fundamentals, quotes and historical valuation ratios.
///
/// `Ok(None)` means "absent" (no credential, malformed payload, nothing
/// returned); `Err` is reserved for transport failures that survived retries.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn fetch_fundamentals(&self, ticker: &str, years: u32) -> Result<Option<FundamentalsSeries>, AnalysisError>;

    async fn fetch_quote_price(&self, ticker: &str) -> Result<Option<f64>, AnalysisError>;

    /// Median of up to five annual P/E ratios. Failures of any kind are absent.
    async fn fetch_five_year_median_pe(&self, ticker: &str) -> Option<f64>;
}
