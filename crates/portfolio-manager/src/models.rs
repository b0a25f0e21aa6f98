use analysis_core::PriceSource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One line of the holdings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub ticker: String,
    pub shares: f64,
    pub avg_cost: f64,
    pub sector: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub price: Option<f64>,
    pub source: PriceSource,
}

impl PricePoint {
    pub fn missing() -> Self {
        Self {
            price: None,
            source: PriceSource::Missing,
        }
    }

    /// A live quote wins; a positive manual price only fills a missing quote.
    pub fn resolve(live: Option<f64>, manual: Option<f64>) -> Self {
        if let Some(price) = live {
            return Self {
                price: Some(price),
                source: PriceSource::Live,
            };
        }
        match manual.filter(|p| *p > 0.0) {
            Some(price) => Self {
                price: Some(price),
                source: PriceSource::Manual,
            },
            None => Self::missing(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingValuation {
    pub ticker: String,
    pub sector: Option<String>,
    pub currency: String,
    pub shares: f64,
    pub avg_cost: f64,
    pub price: Option<f64>,
    pub price_source: PriceSource,
    pub market_value: Option<f64>,
    pub cost: f64,
    pub unrealized_pl: Option<f64>,
    pub weight: Option<f64>,
}

/// Why portfolio totals are or are not reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TotalsStatus {
    Reported,
    /// No holding has a price, or the priced total is not positive.
    NoPrices,
    /// Holdings span more than one currency; totals would need FX.
    MixedCurrencies,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub status: TotalsStatus,
    /// Set only when every holding shares one currency.
    pub currency: Option<String>,
    pub total_market_value: Option<f64>,
    pub total_cost: Option<f64>,
    pub total_unrealized_pl: Option<f64>,
    /// Summed market value per sector, for holdings that carry one.
    pub sector_totals: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioValuation {
    pub holdings: Vec<HoldingValuation>,
    pub summary: PortfolioSummary,
}
