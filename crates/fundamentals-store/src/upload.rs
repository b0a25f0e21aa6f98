//! User-supplied fundamentals tables (same schema as the cache files).

use crate::read_rows;
use analysis_core::{AnalysisError, FundamentalsRow, FundamentalsSeries};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Parses a fundamentals CSV. Columns may appear in any order; measure
/// columns that are missing are read as null and extra columns are ignored.
/// `ticker` and `year` are required.
pub fn read_fundamentals_csv<R: Read>(reader: R) -> Result<Vec<FundamentalsRow>, AnalysisError> {
    let mut rows = read_rows(reader)?;
    rows.retain(|r| !r.ticker.is_empty());
    for row in &mut rows {
        if row.company.trim().is_empty() {
            row.company = row.ticker.clone();
        }
    }
    Ok(rows)
}

pub fn read_fundamentals_file(path: impl AsRef<Path>) -> Result<Vec<FundamentalsRow>, AnalysisError> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| AnalysisError::InvalidData(format!("cannot open {}: {}", path.display(), e)))?;
    let rows = read_fundamentals_csv(file)?;
    tracing::info!("Loaded {} fundamentals rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// Rows of `ticker` (case-insensitive), sorted by year.
pub fn rows_for_ticker(rows: &[FundamentalsRow], ticker: &str) -> FundamentalsSeries {
    let wanted = ticker.trim().to_uppercase();
    FundamentalsSeries::from_rows(
        rows.iter()
            .filter(|r| r.ticker.trim().to_uppercase() == wanted)
            .cloned()
            .collect(),
    )
}
