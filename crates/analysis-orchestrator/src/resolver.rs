//! Chooses where a ticker's fundamentals come from: an uploaded table, the
//! local cache, or the remote provider (written through to the cache).

use analysis_core::{DataSource, FundamentalsRow, FundamentalsSeries, MarketDataProvider};
use fundamentals_store::{rows_for_ticker, FundamentalsStore};
use std::sync::Arc;

/// Annual periods requested from the remote provider on a cache miss.
pub const DEFAULT_REMOTE_YEARS: u32 = 10;

#[derive(Debug, Clone)]
pub struct Resolution {
    pub series: FundamentalsSeries,
    pub source: DataSource,
    /// User-facing messages about degraded steps (remote or cache failures).
    pub notices: Vec<String>,
}

impl Resolution {
    fn found(series: FundamentalsSeries, source: DataSource) -> Self {
        Self {
            series,
            source,
            notices: Vec::new(),
        }
    }
}

pub struct FundamentalsResolver {
    store: FundamentalsStore,
    provider: Arc<dyn MarketDataProvider>,
    remote_years: u32,
}

impl FundamentalsResolver {
    pub fn new(store: FundamentalsStore, provider: Arc<dyn MarketDataProvider>) -> Self {
        Self {
            store,
            provider,
            remote_years: DEFAULT_REMOTE_YEARS,
        }
    }

    #[cfg(test)]
    pub(crate) fn store(&self) -> &FundamentalsStore {
        &self.store
    }

    /// First non-empty of upload, cache, remote. Never fails: an empty series
    /// with `DataSource::Unavailable` means nothing could be found.
    pub async fn resolve(&self, ticker: &str, uploaded: Option<&[FundamentalsRow]>) -> Resolution {
        let ticker = ticker.trim().to_uppercase();

        if let Some(rows) = uploaded {
            let series = rows_for_ticker(rows, &ticker);
            if !series.is_empty() {
                tracing::info!("Using {} uploaded rows for {}", series.len(), ticker);
                return Resolution::found(series, DataSource::Upload);
            }
        }

        let cached = self.store.load(&ticker);
        if !cached.is_empty() {
            tracing::info!("Using {} cached rows for {}", cached.len(), ticker);
            return Resolution::found(cached, DataSource::Cache);
        }

        let mut notices = Vec::new();
        match self.provider.fetch_fundamentals(&ticker, self.remote_years).await {
            Ok(Some(series)) if !series.is_empty() => {
                tracing::info!("Fetched {} remote rows for {}", series.len(), ticker);
                if let Err(e) = self.store.upsert(&ticker, series.rows()) {
                    tracing::warn!("Failed to cache fundamentals for {}: {}", ticker, e);
                    notices.push(format!("Could not cache fundamentals for {}: {}", ticker, e));
                }
                return Resolution {
                    series,
                    source: DataSource::Remote,
                    notices,
                };
            }
            Ok(_) => tracing::debug!("No remote fundamentals for {}", ticker),
            Err(e) => {
                tracing::warn!("Remote fundamentals fetch failed for {}: {}", ticker, e);
                notices.push(format!("Remote fetch failed for {}: {}", ticker, e));
            }
        }

        Resolution {
            series: FundamentalsSeries::empty(),
            source: DataSource::Unavailable,
            notices,
        }
    }
}
