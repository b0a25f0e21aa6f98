use serde::{Deserialize, Serialize};

/// Column order of a persisted fundamentals table.
pub const FUNDAMENTALS_COLUMNS: [&str; 11] = [
    "ticker",
    "year",
    "revenue",
    "net_income",
    "shareholders_equity",
    "total_debt",
    "shares_outstanding",
    "free_cash_flow",
    "current_assets",
    "total_liabilities",
    "company",
];

/// One fiscal year of fundamentals for one ticker.
///
/// Field order matches [`FUNDAMENTALS_COLUMNS`] so CSV headers line up with
/// the cache file layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundamentalsRow {
    pub ticker: String,
    pub year: i32,
    #[serde(default)]
    pub revenue: Option<f64>,
    #[serde(default)]
    pub net_income: Option<f64>,
    #[serde(default)]
    pub shareholders_equity: Option<f64>,
    #[serde(default)]
    pub total_debt: Option<f64>,
    #[serde(default)]
    pub shares_outstanding: Option<f64>,
    #[serde(default)]
    pub free_cash_flow: Option<f64>,
    #[serde(default)]
    pub current_assets: Option<f64>,
    #[serde(default)]
    pub total_liabilities: Option<f64>,
    #[serde(default)]
    pub company: String,
}

impl FundamentalsRow {
    /// Empty row for `ticker`/`year`; every measure starts as null.
    pub fn new(ticker: &str, year: i32) -> Self {
        let ticker = ticker.trim().to_uppercase();
        Self {
            company: ticker.clone(),
            ticker,
            year,
            revenue: None,
            net_income: None,
            shareholders_equity: None,
            total_debt: None,
            shares_outstanding: None,
            free_cash_flow: None,
            current_assets: None,
            total_liabilities: None,
        }
    }

    /// Uppercases the ticker in place.
    pub fn normalize(&mut self) {
        self.ticker = self.ticker.trim().to_uppercase();
    }
}

/// Annual fundamentals for one ticker, sorted by `year` ascending with unique years.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FundamentalsSeries {
    rows: Vec<FundamentalsRow>,
}

impl FundamentalsSeries {
    /// Builds a series from rows in any order.
    ///
    /// Rows are sorted by year; when a year repeats, the row that came later in
    /// the input wins.
    pub fn from_rows(rows: Vec<FundamentalsRow>) -> Self {
        let mut rows: Vec<FundamentalsRow> = rows
            .into_iter()
            .map(|mut r| {
                r.normalize();
                r
            })
            .collect();
        // Stable sort keeps input order within a year, so the last duplicate is the newest.
        rows.sort_by_key(|r| r.year);
        let mut deduped: Vec<FundamentalsRow> = Vec::with_capacity(rows.len());
        for row in rows {
            match deduped.last_mut() {
                Some(prev) if prev.year == row.year => *prev = row,
                _ => deduped.push(row),
            }
        }
        Self { rows: deduped }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[FundamentalsRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<FundamentalsRow> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Most recent year.
    pub fn latest(&self) -> Option<&FundamentalsRow> {
        self.rows.last()
    }

    /// The `n` most recent years, still ascending.
    pub fn tail(&self, n: usize) -> &[FundamentalsRow] {
        let start = self.rows.len().saturating_sub(n);
        &self.rows[start..]
    }

    pub fn years(&self) -> Vec<i32> {
        self.rows.iter().map(|r| r.year).collect()
    }

    pub fn last_year(&self) -> Option<i32> {
        self.latest().map(|r| r.year)
    }
}

/// Outcome of a single rule or threshold check.
///
/// `pass_flag` is `None` when the check could not be computed, which is
/// distinct from a failed check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricResult {
    pub name: String,
    pub value: Option<f64>,
    pub pass_flag: Option<bool>,
    pub details: String,
}

impl MetricResult {
    pub fn new(name: &str, value: Option<f64>, pass_flag: Option<bool>, details: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            value,
            pass_flag,
            details: details.into(),
        }
    }

    /// Result for a check that could not be computed.
    pub fn unknown(name: &str, details: impl Into<String>) -> Self {
        Self::new(name, None, None, details)
    }

    /// "PASS", "FAIL" or "n/a".
    pub fn verdict(&self) -> &'static str {
        match self.pass_flag {
            Some(true) => "PASS",
            Some(false) => "FAIL",
            None => "n/a",
        }
    }
}

/// The five Buffett checks in their fixed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scorecard {
    pub equity_growth: MetricResult,
    pub debt_to_equity: MetricResult,
    pub profit_growth: MetricResult,
    pub roe_consistency: MetricResult,
    pub fcf_positivity: MetricResult,
}

impl Scorecard {
    /// Checks in rule order: equity, D/E, profit, ROE, FCF.
    pub fn checks(&self) -> [&MetricResult; 5] {
        [
            &self.equity_growth,
            &self.debt_to_equity,
            &self.profit_growth,
            &self.roe_consistency,
            &self.fcf_positivity,
        ]
    }

    /// Fraction of determinate checks that passed; `None` when no check was determinate.
    pub fn aggregate_score(&self) -> Option<f64> {
        aggregate_score(&self.checks())
    }
}

/// Mean of the determinate pass flags. Unknown flags count toward neither side.
pub fn aggregate_score(results: &[&MetricResult]) -> Option<f64> {
    let flags: Vec<bool> = results.iter().filter_map(|r| r.pass_flag).collect();
    if flags.is_empty() {
        return None;
    }
    let passed = flags.iter().filter(|&&f| f).count();
    Some(passed as f64 / flags.len() as f64)
}

/// Where a resolved series came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Upload,
    Cache,
    Remote,
    Unavailable,
}

impl DataSource {
    pub fn to_label(&self) -> &'static str {
        match self {
            DataSource::Upload => "uploaded fundamentals",
            DataSource::Cache => "local cache",
            DataSource::Remote => "remote API",
            DataSource::Unavailable => "unavailable",
        }
    }
}

/// Where a quoted price came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    Live,
    Manual,
    Missing,
}

impl PriceSource {
    pub fn to_label(&self) -> &'static str {
        match self {
            PriceSource::Live => "live",
            PriceSource::Manual => "manual",
            PriceSource::Missing => "missing",
        }
    }
}
