use analysis_core::{
    DataSource, FundamentalsRow, MarketDataProvider, PriceSource, Scorecard, Settings,
};
use chrono::{DateTime, Utc};
use fmp_client::FmpClient;
use fundamental_analysis::{reference_pe, EntrySignals, FundamentalAnalysisEngine};
use fundamentals_store::FundamentalsStore;
use portfolio_manager::{value_portfolio, Holding, PortfolioValuation, PricePoint};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

pub mod resolver;
pub use resolver::{FundamentalsResolver, Resolution, DEFAULT_REMOTE_YEARS};

/// Shown when no source produced any fundamentals.
pub const NO_DATA_MESSAGE: &str = "No fundamentals found. Upload CSV or set API key.";

#[derive(Debug, Clone, Copy, Default)]
pub struct AnalyzeOptions<'a> {
    pub uploaded: Option<&'a [FundamentalsRow]>,
    /// Used instead of the live quote when positive.
    pub price_override: Option<f64>,
    /// Reference P/E for the relative check; the 5-year median is used when
    /// this is absent or not positive.
    pub industry_pe: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickerReport {
    pub ticker: String,
    pub company: Option<String>,
    pub source: DataSource,
    pub rows: usize,
    pub last_year: Option<i32>,
    pub scorecard: Option<Scorecard>,
    pub aggregate_score: Option<f64>,
    pub price: Option<f64>,
    pub price_source: PriceSource,
    pub entry_signals: Option<EntrySignals>,
    pub notices: Vec<String>,
    pub evaluated_at: DateTime<Utc>,
}

impl TickerReport {
    pub fn has_data(&self) -> bool {
        self.rows > 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioReport {
    pub valuation: PortfolioValuation,
    pub reports: Vec<TickerReport>,
}

pub struct TickerAnalyzer {
    resolver: FundamentalsResolver,
    provider: Arc<dyn MarketDataProvider>,
    engine: FundamentalAnalysisEngine,
}

impl TickerAnalyzer {
    pub fn new(store: FundamentalsStore, provider: Arc<dyn MarketDataProvider>) -> Self {
        Self {
            resolver: FundamentalsResolver::new(store, provider.clone()),
            provider,
            engine: FundamentalAnalysisEngine::new(),
        }
    }

    /// FMP-backed analyzer with the cache under `settings.cache_dir`.
    pub fn from_settings(settings: &Settings) -> Self {
        let client = FmpClient::new(settings);
        if !client.has_credentials() {
            tracing::info!("FMP_API_KEY not set; remote fundamentals and quotes are disabled");
        }
        Self::new(FundamentalsStore::from_settings(settings), Arc::new(client))
    }

    pub async fn analyze(&self, ticker: &str, options: AnalyzeOptions<'_>) -> TickerReport {
        let ticker = ticker.trim().to_uppercase();
        let mut notices = Vec::new();

        let point = match options.price_override.filter(|p| *p > 0.0) {
            Some(price) => PricePoint {
                price: Some(price),
                source: PriceSource::Manual,
            },
            None => {
                let live = self.live_quote(&ticker, &mut notices).await;
                PricePoint::resolve(live, None)
            }
        };

        self.analyze_at(&ticker, options.uploaded, options.industry_pe, point, notices)
            .await
    }

    /// Values the holdings and builds one report per distinct ticker. Live
    /// quotes win; `manual_prices` fill in where no quote is available.
    pub async fn review_portfolio(
        &self,
        holdings: &[Holding],
        manual_prices: &HashMap<String, f64>,
        uploaded: Option<&[FundamentalsRow]>,
    ) -> PortfolioReport {
        let mut tickers: Vec<String> = Vec::new();
        for h in holdings {
            let t = h.ticker.trim().to_uppercase();
            if !tickers.contains(&t) {
                tickers.push(t);
            }
        }
        tracing::info!("Reviewing portfolio of {} holdings ({} tickers)", holdings.len(), tickers.len());

        let mut prices = HashMap::new();
        let mut reports = Vec::with_capacity(tickers.len());
        for ticker in tickers {
            let mut notices = Vec::new();
            let live = self.live_quote(&ticker, &mut notices).await;
            let point = PricePoint::resolve(live, manual_prices.get(&ticker).copied());
            if point.source == PriceSource::Missing {
                notices.push(format!("No price for {}; pass --price {}=<price> to value it", ticker, ticker));
            }
            prices.insert(ticker.clone(), point);

            reports.push(self.analyze_at(&ticker, uploaded, None, point, notices).await);
        }

        PortfolioReport {
            valuation: value_portfolio(holdings, &prices),
            reports,
        }
    }

    async fn live_quote(&self, ticker: &str, notices: &mut Vec<String>) -> Option<f64> {
        match self.provider.fetch_quote_price(ticker).await {
            Ok(price) => price.filter(|p| *p > 0.0),
            Err(e) => {
                tracing::warn!("Quote lookup failed for {}: {}", ticker, e);
                notices.push(format!("Live price unavailable for {}: {}", ticker, e));
                None
            }
        }
    }

    async fn analyze_at(
        &self,
        ticker: &str,
        uploaded: Option<&[FundamentalsRow]>,
        industry_pe: Option<f64>,
        point: PricePoint,
        mut notices: Vec<String>,
    ) -> TickerReport {
        let resolution = self.resolver.resolve(ticker, uploaded).await;
        notices.extend(resolution.notices);
        let series = resolution.series;

        let mut report = TickerReport {
            ticker: ticker.to_string(),
            company: series.latest().map(|r| r.company.clone()),
            source: resolution.source,
            rows: series.len(),
            last_year: series.last_year(),
            scorecard: None,
            aggregate_score: None,
            price: point.price,
            price_source: point.source,
            entry_signals: None,
            notices,
            evaluated_at: Utc::now(),
        };

        if series.is_empty() {
            tracing::info!("No fundamentals for {}", ticker);
            report.notices.push(NO_DATA_MESSAGE.to_string());
            return report;
        }

        let scorecard = self.engine.scorecard(&series);
        report.aggregate_score = scorecard.aggregate_score();
        report.scorecard = Some(scorecard);

        let median_pe = match industry_pe.filter(|pe| *pe > 0.0) {
            Some(_) => None,
            None => self.provider.fetch_five_year_median_pe(ticker).await,
        };
        let reference = reference_pe(industry_pe, median_pe);
        report.entry_signals = self.engine.entry_signals(&series, point.price, reference);

        tracing::info!(
            "Scored {} from {} ({} rows, aggregate {:?})",
            ticker,
            report.source.to_label(),
            report.rows,
            report.aggregate_score
        );
        report
    }
}
