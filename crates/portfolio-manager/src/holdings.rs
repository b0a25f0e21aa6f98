use crate::models::Holding;
use analysis_core::AnalysisError;
use std::io::Read;
use std::path::Path;

pub const REQUIRED_COLUMNS: [&str; 3] = ["Ticker", "Shares", "AvgCost"];
const SECTOR_COLUMN: &str = "Sector";

/// Parses a holdings table.
/// Expected columns: Ticker, Shares, AvgCost, Sector (optional); others are ignored.
pub fn parse_holdings_csv(csv_data: &str) -> Result<Vec<Holding>, AnalysisError> {
    parse_holdings(csv_data.as_bytes())
}

pub fn read_holdings_file(path: impl AsRef<Path>) -> Result<Vec<Holding>, AnalysisError> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .map_err(|e| AnalysisError::InvalidData(format!("cannot open {}: {}", path.display(), e)))?;
    let holdings = parse_holdings(file)?;
    tracing::info!("Loaded {} holdings from {}", holdings.len(), path.display());
    Ok(holdings)
}

pub fn parse_holdings<R: Read>(reader: R) -> Result<Vec<Holding>, AnalysisError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AnalysisError::InvalidData(e.to_string()))?
        .clone();
    let column = |name: &str| headers.iter().position(|h| h == name);

    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|&name| column(name).is_none())
        .collect();
    if !missing.is_empty() {
        return Err(AnalysisError::InvalidData(format!(
            "missing required columns: {}",
            missing.join(", ")
        )));
    }
    // Presence checked above.
    let (ticker_idx, shares_idx, cost_idx) = (
        column("Ticker").unwrap_or_default(),
        column("Shares").unwrap_or_default(),
        column("AvgCost").unwrap_or_default(),
    );
    let sector_idx = column(SECTOR_COLUMN);

    let mut holdings = Vec::new();
    for (line, result) in reader.records().enumerate() {
        let record = result.map_err(|e| AnalysisError::InvalidData(e.to_string()))?;
        let ticker = record.get(ticker_idx).unwrap_or("").to_uppercase();
        if ticker.is_empty() {
            continue;
        }

        let number = |idx: usize, name: &str| -> Result<f64, AnalysisError> {
            let raw = record.get(idx).unwrap_or("");
            raw.parse::<f64>().map_err(|_| {
                AnalysisError::InvalidData(format!("row {}: invalid {} '{}' for {}", line + 2, name, raw, ticker))
            })
        };

        holdings.push(Holding {
            shares: number(shares_idx, "Shares")?,
            avg_cost: number(cost_idx, "AvgCost")?,
            sector: sector_idx
                .and_then(|idx| record.get(idx))
                .map(str::to_string)
                .filter(|s| !s.is_empty()),
            ticker,
        });
    }

    Ok(holdings)
}
