//! Display formatting for raw field values.
//!
//! The formatter is a pure function of the raw value and a gap table: after
//! the character at each 1-based gap position it inserts one separator,
//! provided more characters follow. It never emits a trailing separator, so
//! the formatted value always holds exactly the raw characters plus the
//! separators between them.
//!
//! # Format Conventions
//!
//! - **Default** (gaps 4, 8, 12): `XXXX XXXX XXXX XXXX`
//! - **American Express** (gaps 4, 10): `XXXX XXXXXX XXXXX`
//! - **Diners Club** (gaps 4, 10): `XXXX XXXXXX XXXX`
//!
//! Expiry dates use a two-segment formatter instead, see
//! [`expiry::format_expiry`](crate::expiry::format_expiry).
//!
//! # Example
//!
//! ```
//! use checkout_fields::format::{format_card_number, format_with_gaps};
//!
//! assert_eq!(format_card_number("4242424242424242"), "4242 4242 4242 4242");
//! assert_eq!(format_card_number("378282246310005"), "3782 822463 10005");
//! assert_eq!(format_with_gaps("123456", &[2, 4], '-'), "12-34-56");
//! ```

use crate::card::DEFAULT_CARD_GAPS;
use crate::detect::detect_brand;
use crate::CardBrand;

/// Separator inserted between card number groups.
pub const CARD_SEPARATOR: char = ' ';

/// Formats a raw value by inserting `separator` after each gap position.
///
/// `gaps` holds 1-based positions in ascending order. A separator is only
/// emitted when at least one more raw character follows the gap.
///
/// # Example
///
/// ```
/// use checkout_fields::format::format_with_gaps;
///
/// assert_eq!(format_with_gaps("4242", &[4, 8, 12], ' '), "4242");
/// assert_eq!(format_with_gaps("42424", &[4, 8, 12], ' '), "4242 4");
/// ```
pub fn format_with_gaps(raw: &str, gaps: &[usize], separator: char) -> String {
    let mut result = String::with_capacity(raw.len() + gaps.len());
    let mut pending_gaps = gaps.iter().copied().peekable();
    let mut chars = raw.chars().peekable();
    let mut position = 0;

    while let Some(c) = chars.next() {
        result.push(c);
        position += 1;

        while pending_gaps.next_if(|&gap| gap < position).is_some() {}
        if pending_gaps.next_if_eq(&position).is_some() && chars.peek().is_some() {
            result.push(separator);
        }
    }

    result
}

/// Formats a card number using the gaps of its detected network.
///
/// Falls back to groups of four while the network is unknown.
pub fn format_card_number(raw: &str) -> String {
    format_for_brand(raw, detect_brand(raw))
}

/// Formats a card number for a known (or unknown) network.
///
/// # Example
///
/// ```
/// use checkout_fields::format::format_for_brand;
/// use checkout_fields::CardBrand;
///
/// assert_eq!(
///     format_for_brand("30569309025904", Some(CardBrand::DinersClub)),
///     "3056 930902 5904"
/// );
/// assert_eq!(format_for_brand("123456", None), "1234 56");
/// ```
pub fn format_for_brand(raw: &str, brand: Option<CardBrand>) -> String {
    let gaps = brand.map_or(DEFAULT_CARD_GAPS, |b| b.gaps());
    format_with_gaps(raw, gaps, CARD_SEPARATOR)
}

/// Strips all formatting, leaving only ASCII digits.
///
/// # Example
///
/// ```
/// use checkout_fields::format::strip_formatting;
///
/// assert_eq!(strip_formatting("4242 4242 4242 4242"), "4242424242424242");
/// assert_eq!(strip_formatting("12/25"), "1225");
/// ```
pub fn strip_formatting(input: &str) -> String {
    input.chars().filter(|c| c.is_ascii_digit()).collect()
}
