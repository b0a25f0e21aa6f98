//! buffett: score companies against Buffett-style fundamentals rules.
//!
//! Usage:
//!   buffett lookup AAPL
//!   buffett lookup 2222.SR --price 27.5 --industry-pe 14
//!   buffett portfolio holdings.csv --price VOD.L=0.72 --json
//!   buffett cache MSFT

use analysis_core::{FundamentalsRow, Settings};
use analysis_orchestrator::{AnalyzeOptions, TickerAnalyzer, NO_DATA_MESSAGE};
use anyhow::Context;
use clap::{Parser, Subcommand};
use fundamentals_store::{read_fundamentals_file, FundamentalsStore};
use portfolio_manager::read_holdings_file;
use std::collections::HashMap;
use std::path::PathBuf;

mod render;

#[derive(Parser, Debug)]
#[command(name = "buffett")]
#[command(version, about = "Buffett-style fundamentals scorecard", long_about = None)]
struct Cli {
    /// Cache root; fundamentals live under <dir>/fundamentals
    #[arg(long, global = true, env = "CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Score one ticker and check its entry price
    Lookup {
        ticker: String,

        /// Manual price; used instead of the live quote
        #[arg(long)]
        price: Option<f64>,

        /// Industry average P/E for the relative P/E check
        #[arg(long)]
        industry_pe: Option<f64>,

        /// Fundamentals CSV that takes priority over cache and API
        #[arg(long)]
        fundamentals: Option<PathBuf>,

        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Value a holdings CSV (Ticker, Shares, AvgCost, Sector) and score each ticker
    Portfolio {
        holdings: PathBuf,

        #[arg(long)]
        fundamentals: Option<PathBuf>,

        /// Price for a ticker without a live quote, as TICKER=PRICE
        #[arg(long = "price", value_parser = parse_price_override)]
        prices: Vec<(String, f64)>,

        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Print the cached fundamentals for a ticker
    Cache { ticker: String },
}

fn parse_price_override(raw: &str) -> Result<(String, f64), String> {
    let (ticker, price) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected TICKER=PRICE, got '{}'", raw))?;
    let ticker = ticker.trim().to_uppercase();
    if ticker.is_empty() {
        return Err(format!("missing ticker in '{}'", raw));
    }
    let price: f64 = price
        .trim()
        .parse()
        .map_err(|_| format!("invalid price in '{}'", raw))?;
    if !(price.is_finite() && price > 0.0) {
        return Err(format!("price must be positive in '{}'", raw));
    }
    Ok((ticker, price))
}

fn load_uploaded(path: Option<&PathBuf>) -> anyhow::Result<Option<Vec<FundamentalsRow>>> {
    path.map(|p| read_fundamentals_file(p).with_context(|| format!("reading fundamentals {}", p.display())))
        .transpose()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "buffett_cli=info,fmp_client=warn".into()),
        )
        .init();

    let cli = Cli::parse();

    let mut settings = Settings::from_env();
    if let Some(dir) = &cli.cache_dir {
        settings = settings.with_cache_dir(dir);
    }
    tracing::debug!("Settings: {:?}", settings);

    match cli.command {
        Commands::Lookup {
            ticker,
            price,
            industry_pe,
            fundamentals,
            json,
        } => {
            let uploaded = load_uploaded(fundamentals.as_ref())?;
            let analyzer = TickerAnalyzer::from_settings(&settings);
            let report = analyzer
                .analyze(
                    &ticker,
                    AnalyzeOptions {
                        uploaded: uploaded.as_deref(),
                        price_override: price,
                        industry_pe,
                    },
                )
                .await;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                render::print_ticker_report(&report);
            }
        }
        Commands::Portfolio {
            holdings,
            fundamentals,
            prices,
            json,
        } => {
            let holdings = read_holdings_file(&holdings)
                .with_context(|| format!("reading holdings {}", holdings.display()))?;
            let uploaded = load_uploaded(fundamentals.as_ref())?;
            let manual: HashMap<String, f64> = prices.into_iter().collect();

            let analyzer = TickerAnalyzer::from_settings(&settings);
            let review = analyzer
                .review_portfolio(&holdings, &manual, uploaded.as_deref())
                .await;

            if json {
                println!("{}", serde_json::to_string_pretty(&review)?);
            } else {
                render::print_portfolio(&review.valuation);
                for report in &review.reports {
                    println!();
                    render::print_ticker_report(report);
                }
            }
        }
        Commands::Cache { ticker } => {
            let store = FundamentalsStore::from_settings(&settings);
            let series = store.load(&ticker);
            if series.is_empty() {
                println!("{}", NO_DATA_MESSAGE);
            } else {
                println!("{} ({})", ticker.trim().to_uppercase(), store.path_for(&ticker).display());
                render::print_rows(series.rows());
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_price_override() {
        assert_eq!(parse_price_override("vod.l=0.72"), Ok(("VOD.L".to_string(), 0.72)));
        assert!(parse_price_override("AAPL").is_err());
        assert!(parse_price_override("=5").is_err());
        assert!(parse_price_override("AAPL=abc").is_err());
        assert!(parse_price_override("AAPL=0").is_err());
    }

    #[test]
    fn test_portfolio_args() {
        let cli = Cli::try_parse_from([
            "buffett", "portfolio", "h.csv", "--price", "AAA=1.5", "--price", "bbb=2",
        ])
        .unwrap();
        match cli.command {
            Commands::Portfolio { prices, json, .. } => {
                assert_eq!(prices, vec![("AAA".to_string(), 1.5), ("BBB".to_string(), 2.0)]);
                assert!(!json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
