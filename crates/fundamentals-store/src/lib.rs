//! Per-ticker on-disk cache of annual fundamentals.
//!
//! Each ticker lives in its own CSV table under the cache directory. Writes
//! are read-merge-write with no locking: two processes upserting the same
//! ticker at once can lose one of the updates.

use analysis_core::{AnalysisError, FundamentalsRow, FundamentalsSeries, Settings};
use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub mod upload;

pub use upload::{read_fundamentals_csv, read_fundamentals_file, rows_for_ticker};

/// Maps a ticker to a filesystem-safe stem: uppercase, with anything outside
/// `A-Z 0-9 . _ -` replaced by `_`.
pub fn sanitize_ticker(ticker: &str) -> String {
    ticker
        .trim()
        .to_uppercase()
        .chars()
        .map(|c| match c {
            'A'..='Z' | '0'..='9' | '.' | '_' | '-' => c,
            _ => '_',
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct FundamentalsStore {
    dir: PathBuf,
}

impl FundamentalsStore {
    /// Store rooted at `dir`. Nothing touches the disk until the first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.fundamentals_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, ticker: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", sanitize_ticker(ticker)))
    }

    /// Cached rows for `ticker`. A missing or unreadable file is an empty series.
    pub fn load(&self, ticker: &str) -> FundamentalsSeries {
        let path = self.path_for(ticker);
        if !path.exists() {
            return FundamentalsSeries::empty();
        }
        match Self::read_table(&path) {
            Ok(rows) => FundamentalsSeries::from_rows(rows),
            Err(e) => {
                tracing::warn!("Ignoring unreadable cache file {}: {}", path.display(), e);
                FundamentalsSeries::empty()
            }
        }
    }

    /// Merges `rows` into the cache, replacing any cached row with the same year.
    ///
    /// Rows with a blank ticker are attributed to `ticker`; the rest keep their
    /// own, so one batch may update several files.
    pub fn upsert(&self, ticker: &str, rows: &[FundamentalsRow]) -> Result<(), AnalysisError> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut by_ticker: BTreeMap<String, Vec<FundamentalsRow>> = BTreeMap::new();
        for row in rows {
            let mut row = row.clone();
            if row.ticker.trim().is_empty() {
                row.ticker = ticker.to_string();
            }
            row.normalize();
            by_ticker.entry(row.ticker.clone()).or_default().push(row);
        }

        fs::create_dir_all(&self.dir).map_err(|e| {
            AnalysisError::CacheError(format!("cannot create {}: {}", self.dir.display(), e))
        })?;

        for (tkr, incoming) in by_ticker {
            let incoming = FundamentalsSeries::from_rows(incoming);
            let incoming_years: HashSet<i32> = incoming.years().into_iter().collect();

            let mut merged: Vec<FundamentalsRow> = self
                .load(&tkr)
                .into_rows()
                .into_iter()
                .filter(|r| !incoming_years.contains(&r.year))
                .collect();
            merged.extend(incoming.into_rows());
            let merged = FundamentalsSeries::from_rows(merged);

            let path = self.path_for(&tkr);
            self.write_table(&path, merged.rows())?;
            tracing::debug!("Cached {} rows for {} at {}", merged.len(), tkr, path.display());
        }

        Ok(())
    }

    fn read_table(path: &Path) -> Result<Vec<FundamentalsRow>, AnalysisError> {
        let file = File::open(path).map_err(|e| AnalysisError::CacheError(e.to_string()))?;
        read_rows(file)
    }

    /// Writes to a temp file in the cache directory, then renames over `path`.
    fn write_table(&self, path: &Path, rows: &[FundamentalsRow]) -> Result<(), AnalysisError> {
        let tmp = NamedTempFile::new_in(&self.dir).map_err(|e| AnalysisError::CacheError(e.to_string()))?;
        let mut writer = csv::Writer::from_writer(tmp);
        for row in rows {
            writer
                .serialize(row)
                .map_err(|e| AnalysisError::CacheError(e.to_string()))?;
        }
        let mut tmp = writer
            .into_inner()
            .map_err(|e| AnalysisError::CacheError(e.to_string()))?;
        tmp.flush().map_err(|e| AnalysisError::CacheError(e.to_string()))?;
        tmp.persist(path)
            .map_err(|e| AnalysisError::CacheError(format!("cannot replace {}: {}", path.display(), e)))?;
        Ok(())
    }
}

pub(crate) fn read_rows<R: Read>(reader: R) -> Result<Vec<FundamentalsRow>, AnalysisError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();
    for result in reader.deserialize::<FundamentalsRow>() {
        let mut row = result.map_err(|e| AnalysisError::InvalidData(e.to_string()))?;
        row.normalize();
        rows.push(row);
    }
    Ok(rows)
}
