// src/units.rs

use thiserror::Error;
use uint::construct_uint;

construct_uint! {
    /// Fixed-width 256-bit integer for token amounts in base units ("wei").
    pub struct U256(4);
}

/// Decimals of the quote asset on the launchpad chain.
pub const QUOTE_DECIMALS: u32 = 18;

// 10^77 is the largest power of ten below 2^256.
const MAX_DECIMALS: u32 = 77;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnitsError {
    #[error("empty amount")]
    Empty,
    #[error("invalid number: {0}")]
    InvalidNumber(String),
    #[error("more than {max} fractional digits")]
    TooManyDecimals { max: u32 },
    #[error("amount does not fit in 256 bits")]
    Overflow,
    #[error("amount must be greater than zero")]
    NotPositive,
}

fn pow10(decimals: u32) -> Result<U256, UnitsError> {
    if decimals > MAX_DECIMALS {
        return Err(UnitsError::Overflow);
    }
    Ok(U256::exp10(decimals as usize))
}

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Lossy conversion; limbs are little-endian.
fn u256_to_f64(value: U256) -> f64 {
    value
        .0
        .iter()
        .rev()
        .fold(0.0, |acc, &limb| acc * 18_446_744_073_709_551_616.0 + limb as f64)
}

/// Parse an unsigned base-unit integer string such as `"1000000000000000000"`.
pub fn parse_wei(text: &str) -> Result<U256, UnitsError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(UnitsError::Empty);
    }
    if !all_digits(text) {
        return Err(UnitsError::InvalidNumber(text.to_string()));
    }
    U256::from_dec_str(text).map_err(|_| UnitsError::Overflow)
}

/// Base units to natural units as a float. Integer part and remainder are
/// converted separately so large balances keep their fractional digits.
pub fn wei_to_units(text: &str, decimals: u32) -> Result<f64, UnitsError> {
    let value = parse_wei(text)?;
    let scale = pow10(decimals)?;
    let (whole, frac) = value.div_mod(scale);
    Ok(u256_to_f64(whole) + u256_to_f64(frac) / u256_to_f64(scale))
}

/// Exact decimal text (`"12.5"`) to base units.
pub fn parse_units(text: &str, decimals: u32) -> Result<U256, UnitsError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(UnitsError::Empty);
    }
    if text == "." {
        return Err(UnitsError::InvalidNumber(text.to_string()));
    }

    let (whole, frac) = match text.split_once('.') {
        Some((w, f)) => (w, f),
        None => (text, ""),
    };
    let whole = if whole.is_empty() { "0" } else { whole };
    if !all_digits(whole) || (!frac.is_empty() && !all_digits(frac)) {
        return Err(UnitsError::InvalidNumber(text.to_string()));
    }

    let frac = frac.trim_end_matches('0');
    if frac.len() > decimals as usize {
        return Err(UnitsError::TooManyDecimals { max: decimals });
    }

    let scale = pow10(decimals)?;
    let whole = U256::from_dec_str(whole).map_err(|_| UnitsError::Overflow)?;
    let (scaled, overflow) = whole.overflowing_mul(scale);
    if overflow {
        return Err(UnitsError::Overflow);
    }

    let frac_value = if frac.is_empty() {
        U256::zero()
    } else {
        let digits = U256::from_dec_str(frac).map_err(|_| UnitsError::Overflow)?;
        digits * pow10(decimals - frac.len() as u32)?
    };

    let (total, overflow) = scaled.overflowing_add(frac_value);
    if overflow {
        return Err(UnitsError::Overflow);
    }
    Ok(total)
}

/// Base units to exact decimal text, trailing zeros trimmed.
pub fn format_units(value: U256, decimals: u32) -> Result<String, UnitsError> {
    let scale = pow10(decimals)?;
    let (whole, frac) = value.div_mod(scale);
    if frac.is_zero() {
        return Ok(whole.to_string());
    }

    let frac = format!("{:0>width$}", frac.to_string(), width = decimals as usize);
    Ok(format!("{}.{}", whole, frac.trim_end_matches('0')))
}

/// Parse the swap form's input field into a positive natural-unit amount.
pub fn parse_amount(text: &str) -> Result<f64, UnitsError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(UnitsError::Empty);
    }
    let value: f64 = text
        .parse()
        .map_err(|_| UnitsError::InvalidNumber(text.to_string()))?;
    if !value.is_finite() {
        return Err(UnitsError::InvalidNumber(text.to_string()));
    }
    if value <= 0.0 {
        return Err(UnitsError::NotPositive);
    }
    Ok(value)
}

/// Fixed number of decimal places for display. Non-finite values render as
/// `"0"`.
pub fn to_fixed(value: f64, places: usize) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    format!("{:.*}", places, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wei_to_units_scales_by_decimals() {
        assert_eq!(wei_to_units("0", 18).unwrap(), 0.0);
        assert_eq!(wei_to_units("1000000000000000000", 18).unwrap(), 1.0);
        assert_eq!(wei_to_units("1500000000000000000", 18).unwrap(), 1.5);
        assert_eq!(wei_to_units("2500000", 6).unwrap(), 2.5);
        assert_eq!(wei_to_units(" 42 ", 0).unwrap(), 42.0);
    }

    #[test]
    fn wei_to_units_keeps_fraction_of_large_values() {
        // 12,345,678.000000000000000001 raised
        let v = wei_to_units("12345678000000000000000001", 18).unwrap();
        assert_eq!(v, 12_345_678.0);
        let v = wei_to_units("12345678250000000000000000", 18).unwrap();
        assert_eq!(v, 12_345_678.25);
    }

    #[test]
    fn parse_wei_rejects_garbage() {
        assert_eq!(parse_wei("").unwrap_err(), UnitsError::Empty);
        assert!(matches!(
            parse_wei("-1").unwrap_err(),
            UnitsError::InvalidNumber(_)
        ));
        assert!(matches!(
            parse_wei("1.5").unwrap_err(),
            UnitsError::InvalidNumber(_)
        ));
        let too_big = "9".repeat(80);
        assert_eq!(parse_wei(&too_big).unwrap_err(), UnitsError::Overflow);
    }

    #[test]
    fn parse_units_is_exact() {
        assert_eq!(
            parse_units("1", 18).unwrap(),
            U256::from(1_000_000_000_000_000_000u128)
        );
        assert_eq!(
            parse_units("0.000000000000000001", 18).unwrap(),
            U256::from(1u64)
        );
        assert_eq!(parse_units("12.50", 2).unwrap(), U256::from(1250u64));
        assert_eq!(parse_units(".5", 1).unwrap(), U256::from(5u64));
        assert_eq!(parse_units("7.", 1).unwrap(), U256::from(70u64));
    }

    #[test]
    fn parse_units_rejects_bad_input() {
        assert_eq!(parse_units("  ", 18).unwrap_err(), UnitsError::Empty);
        assert_eq!(
            parse_units("0.123", 2).unwrap_err(),
            UnitsError::TooManyDecimals { max: 2 }
        );
        assert!(matches!(
            parse_units(".", 18).unwrap_err(),
            UnitsError::InvalidNumber(_)
        ));
        assert!(matches!(
            parse_units("1e5", 18).unwrap_err(),
            UnitsError::InvalidNumber(_)
        ));
        assert!(matches!(
            parse_units("1.2.3", 18).unwrap_err(),
            UnitsError::InvalidNumber(_)
        ));
        assert_eq!(parse_units("1", 78).unwrap_err(), UnitsError::Overflow);
    }

    #[test]
    fn format_units_trims_zeros() {
        assert_eq!(format_units(U256::zero(), 18).unwrap(), "0");
        assert_eq!(
            format_units(U256::from(1_500_000_000_000_000_000u128), 18).unwrap(),
            "1.5"
        );
        assert_eq!(
            format_units(U256::from(1u64), 18).unwrap(),
            "0.000000000000000001"
        );
        assert_eq!(format_units(U256::from(1234u64), 0).unwrap(), "1234");
    }

    #[test]
    fn parse_amount_handles_partial_input() {
        assert_eq!(parse_amount("100").unwrap(), 100.0);
        assert_eq!(parse_amount(" 0.25 ").unwrap(), 0.25);
        assert_eq!(parse_amount("").unwrap_err(), UnitsError::Empty);
        assert_eq!(parse_amount("0").unwrap_err(), UnitsError::NotPositive);
        assert_eq!(parse_amount("-3").unwrap_err(), UnitsError::NotPositive);
        assert!(parse_amount(".").is_err());
        assert!(parse_amount("abc").is_err());
        assert!(parse_amount("NaN").is_err());
        assert!(parse_amount("inf").is_err());
    }

    #[test]
    fn to_fixed_formats_for_display() {
        assert_eq!(to_fixed(17_590_167.065_573_8, 2), "17590167.07");
        assert_eq!(to_fixed(0.000_005_591_797, 8), "0.00000559");
        assert_eq!(to_fixed(f64::NAN, 4), "0");
        assert_eq!(to_fixed(f64::INFINITY, 4), "0");
    }
}
