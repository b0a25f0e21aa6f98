pub mod scorecard;
pub mod valuation;

use analysis_core::{FundamentalsSeries, Scorecard};

pub use scorecard::ScorecardThresholds;
pub use valuation::{
    reference_pe, EntrySignals, ReferencePe, ReferencePeSource, ValuationThresholds,
};

/// Scores a company's history and checks entry prices against its latest year.
#[derive(Debug, Clone, Default)]
pub struct FundamentalAnalysisEngine {
    scorecard: ScorecardThresholds,
    valuation: ValuationThresholds,
}

impl FundamentalAnalysisEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scorecard(&self, series: &FundamentalsSeries) -> Scorecard {
        scorecard::evaluate(series, &self.scorecard)
    }

    /// Entry checks on the latest year; `None` when the series is empty.
    pub fn entry_signals(
        &self,
        series: &FundamentalsSeries,
        price: Option<f64>,
        reference: Option<ReferencePe>,
    ) -> Option<EntrySignals> {
        series
            .latest()
            .map(|latest| valuation::entry_signals(latest, price, reference, &self.valuation))
    }
}
