//! Decimal size units: `k`, `m`, `g`, `t` and `b` suffixes, 1000-based.

#![allow(clippy::cast_precision_loss)]

use crate::core::errors::{FitError, Result};

pub const KB: u64 = 1000;
pub const MB: u64 = KB * KB;
pub const GB: u64 = MB * KB;
pub const TB: u64 = GB * KB;

/// Parse a leading base-10 integer with an optional single unit suffix.
///
/// Leading whitespace and a sign are accepted, so `"-5k"` parses to `-5000`;
/// rejecting non-positive capacities is the caller's job. A suffix longer than
/// one character, or one that is not `t`/`g`/`m`/`k`/`b` in either case, is
/// [`FitError::UnknownUnit`].
pub fn parse_size(text: &str) -> Result<i64> {
    let trimmed = text.trim_start();
    let (negative, unsigned) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let digits_end = unsigned
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(unsigned.len());
    if digits_end == 0 {
        return Err(FitError::InvalidSize {
            input: text.to_string(),
            details: "expected a number".to_string(),
        });
    }

    let (digits, unit) = unsigned.split_at(digits_end);
    let magnitude: i64 = digits.parse().map_err(|_| out_of_range(text))?;
    let value = if negative { -magnitude } else { magnitude };

    let mut chars = unit.chars();
    let multiplier = match (chars.next(), chars.next()) {
        (None, _) => return Ok(value),
        (Some(c), None) => unit_multiplier(c).ok_or_else(|| FitError::UnknownUnit {
            unit: unit.to_string(),
        })?,
        (Some(_), Some(_)) => {
            return Err(FitError::UnknownUnit {
                unit: unit.to_string(),
            });
        }
    };

    let multiplier = i64::try_from(multiplier).map_err(|_| out_of_range(text))?;
    value
        .checked_mul(multiplier)
        .ok_or_else(|| out_of_range(text))
}

fn unit_multiplier(unit: char) -> Option<u64> {
    match unit.to_ascii_lowercase() {
        't' => Some(TB),
        'g' => Some(GB),
        'm' => Some(MB),
        'k' => Some(KB),
        'b' => Some(1),
        _ => None,
    }
}

fn out_of_range(text: &str) -> FitError {
    FitError::InvalidSize {
        input: text.to_string(),
        details: "value out of range".to_string(),
    }
}

/// Render a byte count with the largest unit it reaches.
///
/// Scaled units get two decimals (`"1.50G"`); plain bytes get none (`"999B"`).
pub fn format_size(bytes: u64) -> String {
    let value = bytes as f64;
    for (unit, suffix) in [(TB, 'T'), (GB, 'G'), (MB, 'M'), (KB, 'K')] {
        if value >= unit as f64 {
            return format!("{:.2}{suffix}", value / unit as f64);
        }
    }
    format!("{value:.0}B")
}
