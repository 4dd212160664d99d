//! # Price normalization
//! Converts free-form auction price strings into comparable amounts.
//!
//! Scrapers hand us prices exactly as the auction house printed them:
//! `"R$ 1.234,56"`, `"1,234.56"`, `"US$ 300"`, `"N/A"`. The heuristic here
//! decides which separator is the decimal point and which one groups
//! thousands. It is total: every input maps to a finite amount `>= 0`, and
//! anything unreadable maps to `0.0`.
//!
//! Known ambiguity: a single 3-digit group without fraction (`"1.234"`) is read
//! as thousands (1234). Callers must not re-interpret it per call site.

use once_cell::sync::Lazy;
use regex::Regex;

/// Currency designators and any other non-numeric lead-in.
static RE_LEAD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^0-9.,]+").expect("valid regex"));
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
/// Longest float-looking prefix, the way a lenient float parser reads it.
static RE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:\d+(?:\.\d*)?|\.\d+)").expect("valid regex"));

/// Normalize a raw price into an amount in the collection's base currency.
///
/// Rules, in order:
/// 1. `None`, blank, `"N/A"` and `"0"` are `0.0`.
/// 2. Whitespace is removed and a leading currency designator is stripped.
/// 3. With both `,` and `.`: the one occurring last is the decimal point,
///    the other is dropped as a thousands separator.
/// 4. Only `,`: an integer part longer than 3 digits means `,` groups
///    thousands (removed, no fraction); otherwise `,` is the decimal point.
/// 5. Only `.`: several dots, or more than 2 digits after the last one,
///    means the dots group thousands; otherwise the dot is the decimal point.
/// 6. The remaining literal is parsed; failure yields `0.0`.
///
/// ```
/// use auction_monitor::normalize::normalize_price;
/// assert_eq!(normalize_price("R$ 1.234,56"), 1234.56);
/// assert_eq!(normalize_price("1,234.56"), 1234.56);
/// assert_eq!(normalize_price(None), 0.0);
/// ```
pub fn normalize_price<'a>(raw: impl Into<Option<&'a str>>) -> f64 {
    let Some(raw) = raw.into() else {
        return 0.0;
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "0" || trimmed.eq_ignore_ascii_case("n/a") {
        return 0.0;
    }

    let compact = RE_WS.replace_all(trimmed, "");
    let body = RE_LEAD.replace(&compact, "");
    let literal = disambiguate_separators(&body);
    parse_leading_float(&literal)
}

fn disambiguate_separators(s: &str) -> String {
    let last_comma = s.rfind(',');
    let last_dot = s.rfind('.');

    match (last_comma, last_dot) {
        (Some(c), Some(d)) if c > d => s.replace('.', "").replacen(',', ".", 1),
        (Some(_), Some(_)) => s.replace(',', ""),
        (Some(_), None) => {
            let int_part = s.split(',').next().unwrap_or_default();
            if int_part.len() > 3 {
                s.replace(',', "")
            } else {
                s.replacen(',', ".", 1)
            }
        }
        (None, Some(_)) => {
            let groups: Vec<&str> = s.split('.').collect();
            let tail = groups.last().map(|g| g.len()).unwrap_or(0);
            if groups.len() > 2 || tail > 2 {
                s.replace('.', "")
            } else {
                s.to_string()
            }
        }
        (None, None) => s.to_string(),
    }
}

fn parse_leading_float(s: &str) -> f64 {
    RE_NUMBER
        .find(s)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v >= 0.0)
        .unwrap_or(0.0)
}

/// Render an amount the way the dashboard shows prices: `R$ 1.234,56`.
pub fn format_amount(value: f64) -> String {
    let value = if value.is_finite() { value.max(0.0) } else { 0.0 };
    let cents = (value * 100.0).round() as u64;
    let (int_part, frac) = (cents / 100, cents % 100);

    let digits = int_part.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    format!("R$ {grouped},{frac:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_separator_is_decimal() {
        assert_eq!(normalize_price("1.234,56"), 1234.56);
        assert_eq!(normalize_price("1,234.56"), 1234.56);
        assert_eq!(normalize_price("R$ 12.345.678,90"), 12_345_678.90);
    }

    #[test]
    fn lone_comma_depends_on_integer_width() {
        assert_eq!(normalize_price("12,5"), 12.5);
        assert_eq!(normalize_price("350,00"), 350.0);
        // wider than 3 digits: comma groups thousands, no fraction
        assert_eq!(normalize_price("1234,56"), 123_456.0);
    }

    #[test]
    fn lone_dot_depends_on_groups() {
        assert_eq!(normalize_price("12.50"), 12.5);
        assert_eq!(normalize_price("1.234"), 1234.0);
        assert_eq!(normalize_price("1.234.567"), 1_234_567.0);
    }

    #[test]
    fn sentinels_and_garbage_are_zero() {
        for raw in ["", "   ", "N/A", "n/a", "0", "consulte", "R$", "-", "inf", "NaN"] {
            assert_eq!(normalize_price(raw), 0.0, "input {raw:?}");
        }
    }

    #[test]
    fn trailing_text_is_ignored() {
        assert_eq!(normalize_price("US$ 300 (estimativa)"), 300.0);
        assert_eq!(normalize_price("R$\u{a0}2.500,00 BRL"), 2500.0);
    }

    #[test]
    fn format_groups_thousands() {
        assert_eq!(format_amount(1234.56), "R$ 1.234,56");
        assert_eq!(format_amount(0.0), "R$ 0,00");
        assert_eq!(format_amount(999.999), "R$ 1.000,00");
        assert_eq!(format_amount(1_000_000.0), "R$ 1.000.000,00");
        assert_eq!(format_amount(f64::NAN), "R$ 0,00");
    }
}
