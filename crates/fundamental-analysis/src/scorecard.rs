//! The five-rule Buffett scorecard.
//!
//! Every rule looks at the trailing window of the series (at most
//! `window_years` rows, fewer if that is all there is). A rule that cannot be
//! computed reports `pass_flag: None` rather than failing.

use analysis_core::{FundamentalsRow, FundamentalsSeries, MetricResult, Scorecard};
use serde::{Deserialize, Serialize};

pub const EQUITY_GROWTH: &str = "Equity growing (5y)";
pub const DEBT_TO_EQUITY: &str = "Debt-to-Equity < 50% (latest)";
pub const PROFIT_GROWTH: &str = "Profit growing (5y)";
pub const ROE_CONSISTENCY: &str = "ROE ≥ 15% (5y)";
pub const FCF_POSITIVITY: &str = "FCF positive (5y)";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScorecardThresholds {
    pub window_years: usize,
    /// D/E must be strictly below this.
    pub max_debt_to_equity: f64,
    /// Per-year ROE floor.
    pub min_roe: f64,
    /// Share of years that must clear `min_roe`.
    pub min_roe_pass_ratio: f64,
}

impl Default for ScorecardThresholds {
    fn default() -> Self {
        Self {
            window_years: 5,
            max_debt_to_equity: 0.50,
            min_roe: 0.15,
            min_roe_pass_ratio: 0.80,
        }
    }
}

/// Compound annual growth rate from `first` to `last` over `periods` years.
///
/// `None` if either endpoint is missing or not positive, or `periods` is zero.
pub fn cagr(first: Option<f64>, last: Option<f64>, periods: usize) -> Option<f64> {
    let (first, last) = (first?, last?);
    if periods == 0 || first <= 0.0 || last <= 0.0 {
        return None;
    }
    Some((last / first).powf(1.0 / periods as f64) - 1.0)
}

fn growth_rule(name: &str, window: &[FundamentalsRow], field: fn(&FundamentalsRow) -> Option<f64>) -> MetricResult {
    if window.len() < 2 {
        return MetricResult::unknown(name, "insufficient data");
    }
    let first = field(&window[0]);
    let last = field(&window[window.len() - 1]);
    match cagr(first, last, window.len() - 1) {
        Some(g) => MetricResult::new(name, Some(g), Some(g > 0.0), format!("CAGR={:.2}%", g * 100.0)),
        None => MetricResult::unknown(name, "insufficient data"),
    }
}

/// Shareholders' equity CAGR over the window; passes when positive.
pub fn equity_growth(window: &[FundamentalsRow]) -> MetricResult {
    growth_rule(EQUITY_GROWTH, window, |r| r.shareholders_equity)
}

/// Net income CAGR over the window; passes when positive.
pub fn profit_growth(window: &[FundamentalsRow]) -> MetricResult {
    growth_rule(PROFIT_GROWTH, window, |r| r.net_income)
}

/// Latest-year total debt over shareholders' equity; unknown when equity is
/// not positive.
pub fn debt_to_equity(latest: Option<&FundamentalsRow>, max_ratio: f64) -> MetricResult {
    let ratio = latest.and_then(|row| match (row.total_debt, row.shareholders_equity) {
        (Some(debt), Some(equity)) if equity > 0.0 => Some(debt / equity),
        _ => None,
    });
    match ratio {
        Some(r) => MetricResult::new(DEBT_TO_EQUITY, Some(r), Some(r < max_ratio), format!("D/E={:.2}", r)),
        None => MetricResult::unknown(DEBT_TO_EQUITY, "n/a"),
    }
}

/// Return on equity for one year; `None` when equity is missing or not positive, or
/// net income is missing.
pub fn roe(row: &FundamentalsRow) -> Option<f64> {
    match (row.net_income, row.shareholders_equity) {
        (Some(ni), Some(eq)) if eq > 0.0 => Some(ni / eq),
        _ => None,
    }
}

/// Fraction of computable years with ROE at or above `min_roe`.
pub fn roe_consistency(window: &[FundamentalsRow], min_roe: f64, min_pass_ratio: f64) -> MetricResult {
    let per_year: Vec<(i32, Option<f64>)> = window.iter().map(|r| (r.year, roe(r))).collect();
    let computable: Vec<f64> = per_year.iter().filter_map(|(_, v)| *v).collect();
    if computable.is_empty() {
        return MetricResult::unknown(ROE_CONSISTENCY, "no data");
    }

    let passing = computable.iter().filter(|&&v| v >= min_roe).count();
    let pass_ratio = passing as f64 / computable.len() as f64;
    let details = per_year
        .iter()
        .map(|(year, v)| match v {
            Some(v) => format!("{}: {:.1}%", year, v * 100.0),
            None => format!("{}: n/a", year),
        })
        .collect::<Vec<_>>()
        .join("; ");

    MetricResult::new(ROE_CONSISTENCY, Some(pass_ratio), Some(pass_ratio >= min_pass_ratio), details)
}

/// Fraction of window years with strictly positive free cash flow.
///
/// Missing values count as not positive, and an empty window is a determinate
/// fail at 0.0 rather than unknown.
pub fn fcf_positivity(window: &[FundamentalsRow]) -> MetricResult {
    let pos_ratio = if window.is_empty() {
        0.0
    } else {
        let positive = window
            .iter()
            .filter(|r| r.free_cash_flow.is_some_and(|v| v > 0.0))
            .count();
        positive as f64 / window.len() as f64
    };
    MetricResult::new(
        FCF_POSITIVITY,
        Some(pos_ratio),
        Some(pos_ratio == 1.0),
        format!("positive_years={:.0}%", pos_ratio * 100.0),
    )
}

/// Runs all five rules over the trailing window of `series`.
pub fn evaluate(series: &FundamentalsSeries, thresholds: &ScorecardThresholds) -> Scorecard {
    let window = series.tail(thresholds.window_years);
    Scorecard {
        equity_growth: equity_growth(window),
        debt_to_equity: debt_to_equity(series.latest(), thresholds.max_debt_to_equity),
        profit_growth: profit_growth(window),
        roe_consistency: roe_consistency(window, thresholds.min_roe, thresholds.min_roe_pass_ratio),
        fcf_positivity: fcf_positivity(window),
    }
}
