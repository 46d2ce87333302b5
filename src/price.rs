//! Price text normalisation and display.
//!
//! Listing pages render amounts like `5 500 000 kr`, usually with U+00A0 as
//! the thousands separator.

const NBSP: char = '\u{a0}';

/// Replace non-breaking spaces with ordinary spaces.
pub fn normalize_whitespace(text: &str) -> String {
    text.replace(NBSP, " ")
}

/// Parse a localised price such as `7 500 kr` into an integer amount.
///
/// Absence is an expected outcome: empty input, a bare `kr`, or anything
/// that is not a digit run yields `None`.
pub fn parse_price(text: &str) -> Option<i64> {
    let cleaned = normalize_whitespace(text).replace("kr", "");
    let digits: String = cleaned.chars().filter(|c| !c.is_whitespace()).collect();

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Render an amount as `5 500 000 kr`, or `N/A` when absent.
pub fn format_price(price: Option<i64>) -> String {
    match price {
        Some(amount) if amount < 0 => format!("-{} kr", group_thousands(amount.unsigned_abs())),
        Some(amount) => format!("{} kr", group_thousands(amount.unsigned_abs())),
        None => "N/A".to_string(),
    }
}

/// Render a signed difference as `+1 500 kr` / `-250 kr`.
pub fn format_delta(delta: i64) -> String {
    let sign = if delta < 0 { '-' } else { '+' };
    format!("{sign}{} kr", group_thousands(delta.unsigned_abs()))
}

fn group_thousands(amount: u64) -> String {
    let digits = amount.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(ch);
    }
    grouped
}
