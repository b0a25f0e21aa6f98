//! Latest-year valuation ratios and the three entry-point checks.
//!
//! These are independent of the scorecard and never feed its aggregate.

use analysis_core::{FundamentalsRow, MetricResult};
use serde::{Deserialize, Serialize};

pub const PRICE_TO_BOOK_ENTRY: &str = "P/B entry (Price ≤ 0.8 × BVPS)";
pub const NET_NET_ENTRY: &str = "Graham net-net (Price ≤ ⅔ × NCAV/share)";
pub const RELATIVE_PE_ENTRY: &str = "Relative P/E entry (P/E ≤ 0.70 × reference)";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValuationThresholds {
    /// Price must be at most this multiple of book value per share.
    pub max_price_to_book: f64,
    /// Price must be at most this fraction of NCAV per share.
    pub net_net_fraction: f64,
    /// Company P/E must be at most this fraction of the reference P/E.
    pub pe_margin: f64,
}

impl Default for ValuationThresholds {
    fn default() -> Self {
        Self {
            max_price_to_book: 0.80,
            net_net_fraction: 2.0 / 3.0,
            pe_margin: 0.70,
        }
    }
}

fn per_share(amount: Option<f64>, shares: Option<f64>) -> Option<f64> {
    match (amount, shares) {
        (Some(a), Some(s)) if s != 0.0 => Some(a / s),
        _ => None,
    }
}

/// Book value per share.
pub fn bvps(row: &FundamentalsRow) -> Option<f64> {
    per_share(row.shareholders_equity, row.shares_outstanding)
}

/// Net current asset value per share: (current assets - total liabilities) / shares.
pub fn ncav_per_share(row: &FundamentalsRow) -> Option<f64> {
    let ncav = match (row.current_assets, row.total_liabilities) {
        (Some(ca), Some(tl)) => Some(ca - tl),
        _ => None,
    };
    per_share(ncav, row.shares_outstanding)
}

/// Earnings per share for the row's year.
pub fn eps(row: &FundamentalsRow) -> Option<f64> {
    per_share(row.net_income, row.shares_outstanding)
}

/// Price over EPS; undefined for missing price or non-positive earnings.
pub fn company_pe(price: Option<f64>, eps: Option<f64>) -> Option<f64> {
    match (price, eps) {
        (Some(p), Some(e)) if e > 0.0 => Some(p / e),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferencePeSource {
    Industry,
    FiveYearMedian,
}

impl ReferencePeSource {
    pub fn to_label(&self) -> &'static str {
        match self {
            ReferencePeSource::Industry => "industry average",
            ReferencePeSource::FiveYearMedian => "5-year median",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferencePe {
    pub value: f64,
    pub source: ReferencePeSource,
}

/// A positive industry P/E wins; otherwise the company's own 5-year median.
pub fn reference_pe(industry_pe: Option<f64>, median_pe: Option<f64>) -> Option<ReferencePe> {
    match industry_pe.filter(|pe| *pe > 0.0) {
        Some(value) => Some(ReferencePe {
            value,
            source: ReferencePeSource::Industry,
        }),
        None => median_pe.map(|value| ReferencePe {
            value,
            source: ReferencePeSource::FiveYearMedian,
        }),
    }
}

/// Entry-point figures for one company at one price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntrySignals {
    pub year: i32,
    pub price: Option<f64>,
    pub bvps: Option<f64>,
    pub price_to_book: Option<f64>,
    pub ncav_per_share: Option<f64>,
    pub net_net_threshold: Option<f64>,
    pub eps: Option<f64>,
    pub company_pe: Option<f64>,
    pub reference_pe: Option<ReferencePe>,
    pub required_pe: Option<f64>,
    pub price_threshold: Option<f64>,
    pub price_to_book_check: MetricResult,
    pub net_net_check: MetricResult,
    pub relative_pe_check: MetricResult,
}

impl EntrySignals {
    pub fn checks(&self) -> [&MetricResult; 3] {
        [&self.price_to_book_check, &self.net_net_check, &self.relative_pe_check]
    }
}

fn fmt_opt(v: Option<f64>, decimals: usize) -> String {
    v.map_or_else(|| "n/a".to_string(), |v| format!("{:.*}", decimals, v))
}

/// Evaluates the three entry checks on the latest row. A non-positive price is
/// treated as missing.
pub fn entry_signals(
    latest: &FundamentalsRow,
    price: Option<f64>,
    reference: Option<ReferencePe>,
    thresholds: &ValuationThresholds,
) -> EntrySignals {
    let price = price.filter(|p| *p > 0.0);

    let bvps = bvps(latest);
    // Negative book value makes P/B meaningless.
    let usable_bvps = bvps.filter(|b| *b > 0.0);
    let price_to_book = match (price, usable_bvps) {
        (Some(p), Some(b)) => Some(p / b),
        _ => None,
    };
    let price_to_book_check = match price_to_book {
        Some(ratio) => MetricResult::new(
            PRICE_TO_BOOK_ENTRY,
            Some(ratio),
            Some(ratio <= thresholds.max_price_to_book),
            format!("Price/BVPS={:.2} (needs ≤ {:.2})", ratio, thresholds.max_price_to_book),
        ),
        None => MetricResult::unknown(
            PRICE_TO_BOOK_ENTRY,
            format!("price={}, BVPS={}", fmt_opt(price, 2), fmt_opt(bvps, 2)),
        ),
    };

    let ncav_per_share = ncav_per_share(latest);
    let net_net_threshold = ncav_per_share.map(|n| n * thresholds.net_net_fraction);
    let net_net_check = match (price, net_net_threshold) {
        (Some(p), Some(limit)) => MetricResult::new(
            NET_NET_ENTRY,
            Some(limit),
            Some(p <= limit),
            format!("price={:.2}, limit={:.2}, NCAV/share={}", p, limit, fmt_opt(ncav_per_share, 2)),
        ),
        _ => MetricResult::unknown(
            NET_NET_ENTRY,
            format!("price={}, NCAV/share={}", fmt_opt(price, 2), fmt_opt(ncav_per_share, 2)),
        ),
    };

    let eps = eps(latest);
    let company_pe = company_pe(price, eps);
    let required_pe = reference.map(|r| r.value * thresholds.pe_margin);
    let price_threshold = match (eps, required_pe) {
        (Some(e), Some(req)) if e > 0.0 => Some(e * req),
        _ => None,
    };
    let relative_pe_check = match (company_pe, required_pe, reference) {
        (Some(pe), Some(req), Some(r)) => MetricResult::new(
            RELATIVE_PE_ENTRY,
            Some(pe),
            Some(pe <= req),
            format!("P/E={:.1}, required ≤ {:.1} ({} P/E {:.1})", pe, req, r.source.to_label(), r.value),
        ),
        _ => MetricResult::unknown(
            RELATIVE_PE_ENTRY,
            format!("P/E={}, reference={}", fmt_opt(company_pe, 1), fmt_opt(reference.map(|r| r.value), 1)),
        ),
    };

    EntrySignals {
        year: latest.year,
        price,
        bvps,
        price_to_book,
        ncav_per_share,
        net_net_threshold,
        eps,
        company_pe,
        reference_pe: reference,
        required_pe,
        price_threshold,
        price_to_book_check,
        net_net_check,
        relative_pe_check,
    }
}
