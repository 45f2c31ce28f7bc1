//! Token Amount Conversion
//!
//! Human-decimal strings ("0.01") <-> smallest-unit integers (wei-style).
//! Pure string arithmetic, no floats: "0.1" at 18 decimals is exactly
//! 100000000000000000.
//!
//! Author: AI-Generated
//! Created: 2026-10-14

use crate::error::{DispatchError, DispatchResult};
use alloy::primitives::U256;
use tracing::warn;

/// Convert a decimal amount string to smallest units.
///
/// The fractional part is right-padded to `decimals` digits. Excess
/// fractional digits are truncated with a warning.
pub fn to_smallest_unit(amount: &str, decimals: u8) -> DispatchResult<U256> {
    let trimmed = amount.trim();
    let invalid = |reason: &str| DispatchError::InvalidAmount {
        amount: amount.to_string(),
        reason: reason.to_string(),
    };

    if trimmed.is_empty() {
        return Err(invalid("empty"));
    }

    let (integer_part, fractional_part) = match trimmed.split_once('.') {
        Some((i, f)) => (i, f),
        None => (trimmed, ""),
    };

    if integer_part.is_empty() && fractional_part.is_empty() {
        return Err(invalid("no digits"));
    }
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(integer_part) || !all_digits(fractional_part) {
        return Err(invalid("not a non-negative decimal number"));
    }

    let decimals = decimals as usize;
    let fraction = if fractional_part.len() > decimals {
        warn!(
            "Amount {} has more than {} fractional digits, truncating",
            amount, decimals
        );
        fractional_part[..decimals].to_string()
    } else {
        format!("{:0<width$}", fractional_part, width = decimals)
    };

    let mut digits = format!("{}{}", integer_part, fraction);
    if digits.is_empty() {
        digits.push('0');
    }

    U256::from_str_radix(&digits, 10).map_err(|_| invalid("does not fit in 256 bits"))
}

/// Convert a smallest-unit integer back to a decimal string.
///
/// Trailing fractional zeros are stripped; the decimal point is omitted
/// when the remainder is zero.
pub fn from_smallest_unit(value: U256, decimals: u8) -> String {
    let digits = value.to_string();
    let decimals = decimals as usize;
    if decimals == 0 {
        return digits;
    }

    let padded = format!("{:0>width$}", digits, width = decimals + 1);
    let (whole, fraction) = padded.split_at(padded.len() - decimals);
    let fraction = fraction.trim_end_matches('0');

    if fraction.is_empty() {
        whole.to_string()
    } else {
        format!("{}.{}", whole, fraction)
    }
}
