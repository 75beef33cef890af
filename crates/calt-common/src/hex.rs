//! Hex string helpers.
//!
//! Field values travel between the format crate and its data providers as
//! uppercase hex strings. Providers are allowed to space-separate octets.

use crate::{Error, Result};

/// Render bytes as an uppercase hex string without separators.
#[inline]
pub fn to_hex(bytes: &[u8]) -> String {
    hex::encode_upper(bytes)
}

/// Parse a hex string, ignoring any whitespace between digits.
pub fn parse_hex(text: &str) -> Result<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    hex::decode(&compact).map_err(|e| Error::InvalidHex(format!("{:?}: {}", text, e)))
}

/// Render packed-decimal (BCD) bytes as their digit string.
///
/// Two decimal digits are stored per byte, so the digit string is exactly
/// the hex rendering of the bytes. Nibbles above 9 are kept as hex digits.
#[inline]
pub fn packed_decimal_digits(bytes: &[u8]) -> String {
    to_hex(bytes)
}

/// Strip leading `'0'` characters from a hex tag rendering (`"005A"` -> `"5A"`).
pub fn trim_tag(tag: &str) -> &str {
    tag.trim_start_matches('0')
}
