use analysis_core::{FundamentalsRow, MetricResult};
use analysis_orchestrator::TickerReport;
use portfolio_manager::{detect_currency, format_money, PortfolioValuation, TotalsStatus};

fn opt(v: Option<f64>, decimals: usize) -> String {
    v.map_or_else(|| "n/a".to_string(), |v| format!("{:.*}", decimals, v))
}

fn print_checks(checks: &[&MetricResult]) {
    let width = checks.iter().map(|c| c.name.chars().count()).max().unwrap_or(0);
    for check in checks {
        let pad = width - check.name.chars().count();
        println!("  {}{}  {:<4}  {}", check.name, " ".repeat(pad), check.verdict(), check.details);
    }
}

pub fn print_ticker_report(report: &TickerReport) {
    let company = report.company.as_deref().unwrap_or(&report.ticker);
    println!("== {} ({}) ==", report.ticker, company);

    if !report.has_data() {
        for notice in &report.notices {
            println!("{}", notice);
        }
        return;
    }

    println!(
        "Source: {}, {} rows, last year {}",
        report.source.to_label(),
        report.rows,
        report.last_year.map_or_else(|| "n/a".to_string(), |y| y.to_string())
    );

    if let Some(scorecard) = &report.scorecard {
        println!("Scorecard:");
        print_checks(&scorecard.checks());
    }
    println!(
        "Aggregate score: {}",
        report
            .aggregate_score
            .map_or_else(|| "n/a".to_string(), |s| format!("{:.0}%", s * 100.0))
    );

    let ccy = detect_currency(&report.ticker);
    println!(
        "Price: {} ({})",
        format_money(report.price, ccy),
        report.price_source.to_label()
    );

    if let Some(signals) = &report.entry_signals {
        println!("Entry signals ({}):", signals.year);
        print_checks(&signals.checks());
        println!(
            "  BVPS {}  NCAV/share {}  EPS {}  P/E {}",
            format_money(signals.bvps, ccy),
            format_money(signals.ncav_per_share, ccy),
            format_money(signals.eps, ccy),
            opt(signals.company_pe, 1)
        );
        match &signals.reference_pe {
            Some(reference) => println!(
                "  Reference P/E {:.1} ({}), required P/E {}, price threshold {}",
                reference.value,
                reference.source.to_label(),
                opt(signals.required_pe, 1),
                format_money(signals.price_threshold, ccy)
            ),
            None => println!("  Reference P/E n/a"),
        }
    }

    for notice in &report.notices {
        println!("Note: {}", notice);
    }
}

pub fn print_portfolio(valuation: &PortfolioValuation) {
    println!(
        "{:<10} {:>10} {:>18} {:>8} {:>20} {:>20} {:>8}",
        "Ticker", "Shares", "Price", "Source", "Market value", "P/L", "Weight"
    );
    for h in &valuation.holdings {
        println!(
            "{:<10} {:>10.2} {:>18} {:>8} {:>20} {:>20} {:>8}",
            h.ticker,
            h.shares,
            format_money(h.price, &h.currency),
            h.price_source.to_label(),
            format_money(h.market_value, &h.currency),
            format_money(h.unrealized_pl, &h.currency),
            h.weight.map_or_else(|| "n/a".to_string(), |w| format!("{:.1}%", w * 100.0)),
        );
    }

    let summary = &valuation.summary;
    match summary.status {
        TotalsStatus::Reported => {
            let ccy = summary.currency.as_deref().unwrap_or("USD");
            println!(
                "Total market value {}  cost {}  P/L {}",
                format_money(summary.total_market_value, ccy),
                format_money(summary.total_cost, ccy),
                format_money(summary.total_unrealized_pl, ccy)
            );
        }
        TotalsStatus::NoPrices => println!("Totals unavailable: add live or --price overrides."),
        TotalsStatus::MixedCurrencies => println!("Totals disabled for mixed currencies (needs FX)."),
    }

    if !summary.sector_totals.is_empty() {
        println!("By sector:");
        for (sector, value) in &summary.sector_totals {
            println!("  {:<20} {:>18.2}", sector, value);
        }
    }
}

pub fn print_rows(rows: &[FundamentalsRow]) {
    println!(
        "{:>6} {:>16} {:>16} {:>16} {:>16} {:>16} {:>16}",
        "Year", "Revenue", "Net income", "Equity", "Debt", "FCF", "Shares"
    );
    for r in rows {
        println!(
            "{:>6} {:>16} {:>16} {:>16} {:>16} {:>16} {:>16}",
            r.year,
            opt(r.revenue, 0),
            opt(r.net_income, 0),
            opt(r.shareholders_equity, 0),
            opt(r.total_debt, 0),
            opt(r.free_cash_flow, 0),
            opt(r.shares_outstanding, 0)
        );
    }
}
