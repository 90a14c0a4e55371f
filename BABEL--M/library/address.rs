//! Hex address parsing, formatting, and numeric ordering.
//!
//! Addresses are hex strings of unbounded length. Generation only needs the value
//! modulo [`MODULUS`], so parsing folds digits into the modulus as it goes. Ordering
//! and span calculations work on the full value.

use std::cmp::Ordering;

use num_bigint::BigUint;

use crate::error::{LibraryError, LibraryResult};
use crate::generator::MODULUS;

/// Parses a hex address into a recurrence seed reduced modulo [`MODULUS`].
pub fn parse_seed(address: &str) -> LibraryResult<u64> {
    if address.is_empty() {
        return Err(LibraryError::InvalidAddress(address.to_string()));
    }
    let mut state: u64 = 0;
    for ch in address.chars() {
        let digit = ch
            .to_digit(16)
            .ok_or_else(|| LibraryError::InvalidAddress(address.to_string()))?;
        state = (state * 16 + u64::from(digit)) % MODULUS;
    }
    Ok(state)
}

/// Canonical lowercase hex form of a seed (`0` encodes as `"0"`).
#[must_use]
pub fn format_seed(seed: u64) -> String {
    format!("{seed:x}")
}

/// Full-precision numeric value of an address.
pub fn numeric_value(address: &str) -> LibraryResult<BigUint> {
    if address.is_empty() || !address.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return Err(LibraryError::InvalidAddress(address.to_string()));
    }
    BigUint::parse_bytes(address.as_bytes(), 16)
        .ok_or_else(|| LibraryError::InvalidAddress(address.to_string()))
}

/// Difference between the largest and smallest address, as lowercase hex.
pub fn address_span<'a>(addresses: impl IntoIterator<Item = &'a str>) -> LibraryResult<String> {
    let mut min: Option<BigUint> = None;
    let mut max: Option<BigUint> = None;
    for address in addresses {
        let value = numeric_value(address)?;
        if min.as_ref().map_or(true, |m| value < *m) {
            min = Some(value.clone());
        }
        if max.as_ref().map_or(true, |m| value > *m) {
            max = Some(value);
        }
    }
    let span = match (min, max) {
        (Some(min), Some(max)) => max - min,
        _ => BigUint::default(),
    };
    Ok(span.to_str_radix(16))
}

/// Compares two addresses by numeric value without allocating.
///
/// Malformed addresses sort after well-formed ones and compare lexically among themselves.
#[must_use]
pub fn compare_addresses(a: &str, b: &str) -> Ordering {
    match (significant_digits(a), significant_digits(b)) {
        (Some(a), Some(b)) => a.len().cmp(&b.len()).then_with(|| {
            a.bytes()
                .map(|byte| byte.to_ascii_lowercase())
                .cmp(b.bytes().map(|byte| byte.to_ascii_lowercase()))
        }),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

fn significant_digits(address: &str) -> Option<&str> {
    if address.is_empty() || !address.bytes().all(|byte| byte.is_ascii_hexdigit()) {
        return None;
    }
    let trimmed = address.trim_start_matches('0');
    Some(if trimmed.is_empty() { "0" } else { trimmed })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_reduces_long_addresses_modulo() {
        assert_eq!(parse_seed("1a2b3c").unwrap(), 0x001a_2b3c);
        assert_eq!(parse_seed("80000000").unwrap(), 0);
        assert_eq!(parse_seed("80000001").unwrap(), 1);
        let long = parse_seed("ffffffffffffffff1a2b3c").unwrap();
        assert!(long < MODULUS);
        assert_ne!(long, 0x001a_2b3c);
    }

    #[test]
    fn parse_rejects_malformed_input() {
        assert!(matches!(parse_seed(""), Err(LibraryError::InvalidAddress(_))));
        assert!(matches!(parse_seed("xyz"), Err(LibraryError::InvalidAddress(_))));
        assert!(matches!(parse_seed("0x12"), Err(LibraryError::InvalidAddress(_))));
        assert!(parse_seed("ABCdef").is_ok());
    }

    #[test]
    fn format_has_no_padding() {
        assert_eq!(format_seed(0), "0");
        assert_eq!(format_seed(255), "ff");
    }

    #[test]
    fn compare_is_numeric() {
        assert_eq!(compare_addresses("ff", "100"), Ordering::Less);
        assert_eq!(compare_addresses("00ff", "FF"), Ordering::Equal);
        assert_eq!(compare_addresses("0", "000"), Ordering::Equal);
        assert_eq!(compare_addresses("zz", "1"), Ordering::Greater);
    }

    #[test]
    fn span_uses_full_precision() {
        let span = address_span(["ffffffffffffffffffff", "1"]).unwrap();
        assert_eq!(span, "fffffffffffffffffffe");
        assert_eq!(address_span(["a"]).unwrap(), "0");
        assert!(address_span(["g"]).is_err());
    }
}
