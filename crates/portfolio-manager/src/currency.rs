/// Trading currency inferred from the exchange suffix; USD when there is none.
pub fn detect_currency(ticker: &str) -> &'static str {
    let t = ticker.trim().to_uppercase();
    if t.ends_with(".SR") {
        "SAR"
    } else if t.ends_with(".L") {
        "GBP"
    } else if t.ends_with(".TO") {
        "CAD"
    } else if t.ends_with(".HK") {
        "HKD"
    } else if t.ends_with(".F") || t.ends_with(".DE") {
        "EUR"
    } else {
        "USD"
    }
}

/// `"USD 1,234.50"`, or `"n/a"` when the amount is absent or not finite.
pub fn format_money(amount: Option<f64>, currency: &str) -> String {
    match amount.filter(|a| a.is_finite()) {
        Some(a) => format!("{} {}", currency, group_thousands(a)),
        None => "n/a".to_string(),
    }
}

fn group_thousands(amount: f64) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    // -0.00 prints without a sign
    let sign = if amount < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, frac_part)
}
