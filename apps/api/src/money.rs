//! Shared numeric and formatting helpers for Turkish lira amounts.

/// Rounds a monetary amount to the nearest whole lira (half away from zero).
pub fn round_currency(amount: f64) -> f64 {
    amount.round()
}

/// True for amounts the calculators accept: finite and non-negative.
pub fn is_valid_amount(amount: f64) -> bool {
    amount.is_finite() && amount >= 0.0
}

/// True for a rate expressed as a fraction in `[0, 1]`.
pub fn is_valid_rate(rate: f64) -> bool {
    rate.is_finite() && (0.0..=1.0).contains(&rate)
}

/// Formats an amount with Turkish digit grouping, e.g. `1.500.000 ₺`.
pub fn format_try(amount: f64) -> String {
    let rounded = round_currency(amount);
    let negative = rounded < 0.0;
    let digits = format!("{:.0}", rounded.abs());

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    if negative {
        format!("-{grouped} ₺")
    } else {
        format!("{grouped} ₺")
    }
}

/// Formats a fractional rate as a percentage with up to two decimals, e.g. `%4,67`.
pub fn format_rate(rate: f64) -> String {
    let pct = format!("{:.2}", rate * 100.0);
    let pct = pct.trim_end_matches('0').trim_end_matches('.');
    format!("%{}", pct.replace('.', ","))
}
