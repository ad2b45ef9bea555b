//! Compact duration strings such as `10m` or `2h`.

use crate::error::{Error, Result};

/// Shortest accepted duration (1 second).
pub const MIN_DURATION_MS: i64 = 1_000;

/// Longest accepted duration (28 days, the platform's timeout ceiling).
pub const MAX_DURATION_MS: i64 = 28 * 24 * 60 * 60 * 1_000;

/// Parse `<integer><unit>` into milliseconds.
///
/// `unit` is one of `s`, `m`, `h`, `d` (case-insensitive). Surrounding
/// whitespace is ignored; whitespace between the number and the unit is not
/// accepted. The result must lie within [`MIN_DURATION_MS`, `MAX_DURATION_MS`].
pub fn parse_duration(input: &str) -> Result<i64> {
    let trimmed = input.trim();
    let invalid = || {
        Error::Validation(format!(
            "invalid duration `{}` (use e.g. 30s, 10m, 2h, 1d)",
            trimmed
        ))
    };

    let unit = trimmed.chars().last().ok_or_else(invalid)?;
    let digits = &trimmed[..trimmed.len() - unit.len_utf8()];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let factor: i64 = match unit.to_ascii_lowercase() {
        's' => 1_000,
        'm' => 60 * 1_000,
        'h' => 60 * 60 * 1_000,
        'd' => 24 * 60 * 60 * 1_000,
        _ => return Err(invalid()),
    };

    let millis = digits
        .parse::<i64>()
        .ok()
        .and_then(|n| n.checked_mul(factor))
        .ok_or_else(|| Error::Validation("duration must be between 1s and 28d".to_string()))?;

    if !(MIN_DURATION_MS..=MAX_DURATION_MS).contains(&millis) {
        return Err(Error::Validation(
            "duration must be between 1s and 28d".to_string(),
        ));
    }
    Ok(millis)
}

/// Render milliseconds in the largest unit that divides them evenly.
pub fn format_duration(millis: i64) -> String {
    const UNITS: [(i64, &str); 4] = [
        (24 * 60 * 60 * 1_000, "d"),
        (60 * 60 * 1_000, "h"),
        (60 * 1_000, "m"),
        (1_000, "s"),
    ];
    for (size, suffix) in UNITS {
        if millis >= size && millis % size == 0 {
            return format!("{}{}", millis / size, suffix);
        }
    }
    format!("{}ms", millis)
}
