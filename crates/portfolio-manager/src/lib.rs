pub mod currency;
pub mod holdings;
pub mod models;
pub mod valuation;

pub use currency::{detect_currency, format_money};
pub use holdings::{parse_holdings, parse_holdings_csv, read_holdings_file};
pub use models::*;
pub use valuation::value_portfolio;
