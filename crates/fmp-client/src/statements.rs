//! Turning raw statement payloads into fundamentals rows.

use analysis_core::FundamentalsRow;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Fiscal year of a statement record: `calendarYear`, else the year prefix of `date`.
pub(crate) fn statement_year(record: &Value) -> Option<i32> {
    let from_calendar = match record.get("calendarYear") {
        Some(Value::Number(n)) => n.as_i64().and_then(|y| i32::try_from(y).ok()),
        Some(Value::String(s)) => s.trim().parse::<i32>().ok(),
        _ => None,
    };
    from_calendar.or_else(|| {
        record
            .get("date")
            .and_then(|d| d.as_str())
            .and_then(|d| d.get(..4))
            .and_then(|y| y.parse::<i32>().ok())
    })
}

/// A numeric field given either as a JSON number or a numeric string.
pub(crate) fn number(record: &Value, key: &str) -> Option<f64> {
    let value = match record.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    value.filter(|v| v.is_finite())
}

/// Records keyed by year. The API lists newest first, so the first record of a
/// repeated year is kept.
fn index_by_year<'a>(records: &'a [Value], statement: &str) -> BTreeMap<i32, &'a Value> {
    let mut by_year = BTreeMap::new();
    for record in records {
        match statement_year(record) {
            Some(year) => {
                if by_year.contains_key(&year) {
                    tracing::warn!("{} statement repeats year {}, keeping the first record", statement, year);
                } else {
                    by_year.insert(year, record);
                }
            }
            None => tracing::warn!("Dropping {} record without a fiscal year", statement),
        }
    }
    by_year
}

/// Years reported on the balance sheet or cash flow statement but not on the
/// income statement, each listed once.
fn years_without_income<V>(
    income: &BTreeMap<i32, V>,
    balance: &BTreeMap<i32, V>,
    cash: &BTreeMap<i32, V>,
) -> BTreeSet<i32> {
    balance
        .keys()
        .chain(cash.keys())
        .filter(|year| !income.contains_key(year))
        .copied()
        .collect()
}

/// Joins the three statements on fiscal year.
///
/// Only years present in all three statements produce a row; the rest are
/// logged and left out. Rows come back ascending by year.
pub(crate) fn assemble_rows(
    ticker: &str,
    income: &[Value],
    balance: &[Value],
    cash: &[Value],
) -> Vec<FundamentalsRow> {
    let income = index_by_year(income, "income");
    let balance = index_by_year(balance, "balance sheet");
    let cash = index_by_year(cash, "cash flow");

    for year in years_without_income(&income, &balance, &cash) {
        tracing::warn!("{}: excluding {} (no income statement for that year)", ticker, year);
    }

    let mut rows = Vec::with_capacity(income.len());
    for (&year, inc) in &income {
        let (Some(bal), Some(cf)) = (balance.get(&year), cash.get(&year)) else {
            tracing::warn!(
                "{}: excluding {} (balance sheet: {}, cash flow: {})",
                ticker,
                year,
                if balance.contains_key(&year) { "present" } else { "missing" },
                if cash.contains_key(&year) { "present" } else { "missing" },
            );
            continue;
        };

        let mut row = FundamentalsRow::new(ticker, year);
        if let Some(symbol) = inc.get("symbol").and_then(|s| s.as_str()).filter(|s| !s.trim().is_empty()) {
            row.company = symbol.to_string();
        }
        row.revenue = number(inc, "revenue");
        row.net_income = number(inc, "netIncome");
        row.shares_outstanding = number(inc, "weightedAverageShsOut");
        row.shareholders_equity = number(bal, "totalStockholdersEquity");
        row.current_assets = number(bal, "totalCurrentAssets");
        row.total_liabilities = number(bal, "totalLiabilities");
        row.total_debt = Some(
            number(bal, "shortTermDebt").unwrap_or(0.0) + number(bal, "longTermDebt").unwrap_or(0.0),
        );
        row.free_cash_flow = number(cf, "freeCashFlow");
        rows.push(row);
    }
    rows
}
