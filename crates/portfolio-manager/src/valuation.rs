use crate::currency::detect_currency;
use crate::models::{Holding, HoldingValuation, PortfolioSummary, PortfolioValuation, PricePoint, TotalsStatus};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Values every holding at its price point (keyed by uppercase ticker).
pub fn value_portfolio(holdings: &[Holding], prices: &HashMap<String, PricePoint>) -> PortfolioValuation {
    let mut rows: Vec<HoldingValuation> = holdings
        .iter()
        .map(|h| {
            let point = prices
                .get(&h.ticker.to_uppercase())
                .copied()
                .unwrap_or_else(PricePoint::missing);
            let market_value = point.price.map(|p| h.shares * p);
            let cost = h.shares * h.avg_cost;
            HoldingValuation {
                ticker: h.ticker.clone(),
                sector: h.sector.clone(),
                currency: detect_currency(&h.ticker).to_string(),
                shares: h.shares,
                avg_cost: h.avg_cost,
                price: point.price,
                price_source: point.source,
                market_value,
                cost,
                unrealized_pl: market_value.map(|mv| mv - cost),
                weight: None,
            }
        })
        .collect();

    let total_market_value = sum_present(rows.iter().map(|r| r.market_value));
    if let Some(total) = total_market_value.filter(|t| *t > 0.0) {
        for row in &mut rows {
            row.weight = row.market_value.map(|mv| mv / total);
        }
    }

    let currencies: BTreeSet<&str> = rows.iter().map(|r| r.currency.as_str()).collect();
    let single_currency = match currencies.len() {
        1 => currencies.iter().next().map(|c| c.to_string()),
        _ => None,
    };

    let status = if currencies.len() > 1 {
        TotalsStatus::MixedCurrencies
    } else if total_market_value.is_some_and(|t| t > 0.0) {
        TotalsStatus::Reported
    } else {
        TotalsStatus::NoPrices
    };

    let mut sector_totals: BTreeMap<String, f64> = BTreeMap::new();
    for row in &rows {
        if let (Some(sector), Some(mv)) = (&row.sector, row.market_value) {
            *sector_totals.entry(sector.clone()).or_insert(0.0) += mv;
        }
    }

    let reported = status == TotalsStatus::Reported;
    if !reported {
        tracing::debug!("Portfolio totals not reported: {:?}", status);
    }

    let summary = PortfolioSummary {
        status,
        currency: single_currency,
        total_market_value: total_market_value.filter(|_| reported),
        total_cost: Some(rows.iter().map(|r| r.cost).sum::<f64>()).filter(|_| currencies.len() == 1),
        total_unrealized_pl: sum_present(rows.iter().map(|r| r.unrealized_pl)).filter(|_| reported),
        sector_totals,
    };

    PortfolioValuation { holdings: rows, summary }
}

/// Sum of the present values; `None` when every value is absent.
fn sum_present(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    values.flatten().fold(None, |acc, v| Some(acc.unwrap_or(0.0) + v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::PriceSource;
    use approx::assert_relative_eq;

    fn holding(ticker: &str, shares: f64, avg_cost: f64, sector: Option<&str>) -> Holding {
        Holding {
            ticker: ticker.to_string(),
            shares,
            avg_cost,
            sector: sector.map(str::to_string),
        }
    }

    fn prices(entries: &[(&str, Option<f64>, Option<f64>)]) -> HashMap<String, PricePoint> {
        entries
            .iter()
            .map(|(t, live, manual)| (t.to_string(), PricePoint::resolve(*live, *manual)))
            .collect()
    }

    #[test]
    fn test_price_point_resolution() {
        assert_eq!(PricePoint::resolve(Some(10.0), Some(12.0)).source, PriceSource::Live);
        let manual = PricePoint::resolve(None, Some(12.0));
        assert_eq!(manual.source, PriceSource::Manual);
        assert_eq!(manual.price, Some(12.0));
        assert_eq!(PricePoint::resolve(None, Some(0.0)), PricePoint::missing());
        assert_eq!(PricePoint::resolve(None, None).price, None);
    }

    #[test]
    fn test_single_currency_totals_and_weights() {
        let holdings = vec![
            holding("AAPL", 10.0, 100.0, Some("Tech")),
            holding("MSFT", 5.0, 200.0, Some("Tech")),
            holding("KO", 20.0, 50.0, Some("Staples")),
        ];
        let p = prices(&[
            ("AAPL", Some(150.0), None),
            ("MSFT", None, Some(300.0)),
            ("KO", Some(25.0), None),
        ]);
        let val = value_portfolio(&holdings, &p);

        // 1500 + 1500 + 500
        assert_eq!(val.summary.status, TotalsStatus::Reported);
        assert_eq!(val.summary.currency.as_deref(), Some("USD"));
        assert_relative_eq!(val.summary.total_market_value.unwrap(), 3500.0);
        assert_relative_eq!(val.summary.total_cost.unwrap(), 3000.0);
        assert_relative_eq!(val.summary.total_unrealized_pl.unwrap(), 500.0);
        assert_relative_eq!(val.holdings[0].weight.unwrap(), 1500.0 / 3500.0);
        assert_eq!(val.holdings[1].price_source, PriceSource::Manual);
        assert_relative_eq!(val.holdings[2].unrealized_pl.unwrap(), -500.0);
        assert_relative_eq!(val.summary.sector_totals["Tech"], 3000.0);
        assert_relative_eq!(val.summary.sector_totals["Staples"], 500.0);
    }

    #[test]
    fn test_missing_price_leaves_row_unvalued() {
        let holdings = vec![holding("AAPL", 10.0, 100.0, None), holding("KO", 1.0, 10.0, None)];
        let val = value_portfolio(&holdings, &prices(&[("AAPL", Some(150.0), None)]));

        let ko = &val.holdings[1];
        assert_eq!(ko.price_source, PriceSource::Missing);
        assert_eq!(ko.market_value, None);
        assert_eq!(ko.unrealized_pl, None);
        assert_eq!(ko.weight, None);
        assert_relative_eq!(ko.cost, 10.0);
        assert_relative_eq!(val.holdings[0].weight.unwrap(), 1.0);
        assert!(val.summary.sector_totals.is_empty());
    }

    #[test]
    fn test_no_prices() {
        let holdings = vec![holding("AAPL", 10.0, 100.0, None)];
        let val = value_portfolio(&holdings, &HashMap::new());
        assert_eq!(val.summary.status, TotalsStatus::NoPrices);
        assert_eq!(val.summary.total_market_value, None);
        assert_eq!(val.summary.total_unrealized_pl, None);
        assert_relative_eq!(val.summary.total_cost.unwrap(), 1000.0);
        assert_eq!(val.holdings[0].weight, None);
    }

    #[test]
    fn test_mixed_currencies_suppress_totals() {
        let holdings = vec![holding("AAPL", 1.0, 100.0, None), holding("2222.SR", 10.0, 30.0, None)];
        let p = prices(&[("AAPL", Some(100.0), None), ("2222.SR", Some(30.0), None)]);
        let val = value_portfolio(&holdings, &p);

        assert_eq!(val.summary.status, TotalsStatus::MixedCurrencies);
        assert_eq!(val.summary.currency, None);
        assert_eq!(val.summary.total_market_value, None);
        assert_eq!(val.summary.total_cost, None);
        assert_eq!(val.holdings[1].currency, "SAR");
        // Weights still follow the raw market values.
        assert_relative_eq!(val.holdings[0].weight.unwrap(), 0.25);
    }

    #[test]
    fn test_empty_portfolio() {
        let val = value_portfolio(&[], &HashMap::new());
        assert!(val.holdings.is_empty());
        assert_eq!(val.summary.status, TotalsStatus::NoPrices);
        assert_eq!(val.summary.total_cost, None);
    }
}
