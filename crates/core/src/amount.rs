//! Monetary amount parsing and rendering.
//!
//! Populated field values are strings so that a reasoning backend can answer `N/A`. This module
//! turns the usual ways of writing sterling amounts (`£500M`, `£1.2bn`, `500 million`, `1,250`,
//! `-£20M`, `(20)`) into GBP figures, and renders derived figures back as `£<millions>M`.

use crate::constants::NOT_AVAILABLE;
use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

const MILLION: f64 = 1_000_000.0;

static NUMBER_WITH_UNIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d[\d,]*(?:\.\d+)?)\s*([a-z]*)$").expect("static regex is valid")
});

// Either a £-prefixed figure with an optional unit, or a bare figure with a mandatory unit.
// Requiring one of the two keeps rule numbers such as "1.1.1" and years out of the matches.
static AMOUNT_IN_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?P<neg>-\s?)?(?:£\s?(?P<a>\d[\d,]*(?:\.\d+)?)\s*(?:(?P<ua>bn|billion|mn|million|m|k|thousand)\b)?|\b(?P<b>\d[\d,]*(?:\.\d+)?)\s*(?P<ub>bn|billion|mn|million|m)\b)",
    )
    .expect("static regex is valid")
});

/// Outcome of reading a populated field value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParsedValue {
    /// `N/A` or empty.
    Missing,
    /// Amount in GBP.
    Amount(f64),
    /// Text that is neither missing nor a recognisable amount.
    Invalid,
}

impl ParsedValue {
    pub fn amount(self) -> Option<f64> {
        match self {
            ParsedValue::Amount(v) => Some(v),
            _ => None,
        }
    }
}

/// Returns true for values that mean "not determined".
pub fn is_missing(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case(NOT_AVAILABLE)
}

fn unit_multiplier(unit: &str) -> Option<f64> {
    match unit {
        "" => Some(1.0),
        "k" | "thousand" => Some(1_000.0),
        "m" | "mn" | "million" => Some(MILLION),
        "b" | "bn" | "billion" => Some(1_000.0 * MILLION),
        _ => None,
    }
}

// Unit multipliers applied to decimal text leave binary noise below a penny.
fn round_to_pennies(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

fn parse_number(digits: &str) -> Option<f64> {
    digits.replace(',', "").parse::<f64>().ok()
}

/// Parse a populated field value into a GBP amount.
pub fn parse_value(value: &str) -> ParsedValue {
    if is_missing(value) {
        return ParsedValue::Missing;
    }

    let mut text = value.trim().to_lowercase();
    let mut negative = false;

    if text.starts_with('(') && text.ends_with(')') && text.len() > 2 {
        negative = true;
        text = text[1..text.len() - 1].trim().to_string();
    }
    if let Some(rest) = text.strip_prefix('-') {
        negative = !negative;
        text = rest.trim().to_string();
    }
    if let Some(rest) = text.strip_prefix("gbp") {
        text = rest.trim().to_string();
    }
    if let Some(rest) = text.strip_prefix('£') {
        text = rest.trim().to_string();
    }
    if let Some(rest) = text.strip_prefix('-') {
        negative = !negative;
        text = rest.trim().to_string();
    }

    let Some(caps) = NUMBER_WITH_UNIT.captures(&text) else {
        return ParsedValue::Invalid;
    };
    let (Some(number), Some(multiplier)) = (
        parse_number(&caps[1]),
        unit_multiplier(caps.get(2).map_or("", |m| m.as_str())),
    ) else {
        return ParsedValue::Invalid;
    };

    let amount = round_to_pennies(number * multiplier);
    ParsedValue::Amount(if negative { -amount } else { amount })
}

/// Render a GBP amount in millions, e.g. `£700M`, `-£12.5M` or `£0.002M` for £2,000.
///
/// Precision is kept down to the penny so that `parse_value` reads back the same amount.
pub fn format_amount(amount: f64) -> String {
    let mut digits = format!("{:.8}", round_to_pennies(amount.abs()) / MILLION);
    while digits.ends_with('0') {
        digits.pop();
    }
    if digits.ends_with('.') {
        digits.pop();
    }
    let sign = if amount < 0.0 && digits != "0" { "-" } else { "" };
    format!("{sign}£{digits}M")
}

/// An amount found inside free text.
#[derive(Debug, Clone, PartialEq)]
pub struct AmountMatch {
    pub span: Range<usize>,
    pub amount: f64,
}

/// Find every sterling amount mentioned in `text`, in order of appearance.
pub fn find_amounts(text: &str) -> Vec<AmountMatch> {
    AMOUNT_IN_TEXT
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let (digits, unit) = match (caps.name("a"), caps.name("b")) {
                (Some(a), _) => (a.as_str(), caps.name("ua").map_or("", |u| u.as_str())),
                (None, Some(b)) => (b.as_str(), caps.name("ub").map_or("", |u| u.as_str())),
                (None, None) => return None,
            };
            let amount =
                round_to_pennies(parse_number(digits)? * unit_multiplier(&unit.to_lowercase())?);
            let amount = if caps.name("neg").is_some() {
                -amount
            } else {
                amount
            };
            Some(AmountMatch {
                span: whole.range(),
                amount,
            })
        })
        .collect()
}
