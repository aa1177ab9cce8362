//! Network detection from a partially typed card number.
//!
//! Detection only needs the leading digits, so it runs on every keystroke
//! while the user is still typing. Up to eight digits of the raw value are
//! copied into a fixed buffer and matched against the known prefix ranges.
//!
//! # Example
//!
//! ```
//! use checkout_fields::detect::detect_brand;
//! use checkout_fields::CardBrand;
//!
//! assert_eq!(detect_brand("4"), Some(CardBrand::Visa));
//! assert_eq!(detect_brand("3782"), Some(CardBrand::Amex));
//! assert_eq!(detect_brand(""), None);
//! ```

use crate::CardBrand;

const PREFIX_DIGITS: usize = 8;

/// Detects the card network from the leading digits of a raw value.
///
/// Non-digit characters are ignored, so a formatted value can be passed too.
/// Returns `None` until enough digits are present to identify a network.
pub fn detect_brand(raw: &str) -> Option<CardBrand> {
    let mut prefix = [0u8; PREFIX_DIGITS];
    let mut len = 0;
    for byte in raw.bytes().filter(u8::is_ascii_digit) {
        if len == PREFIX_DIGITS {
            break;
        }
        prefix[len] = byte - b'0';
        len += 1;
    }
    detect_brand_digits(&prefix[..len])
}

/// Detects the card network from a slice of digit values (0-9).
#[inline]
pub fn detect_brand_digits(digits: &[u8]) -> Option<CardBrand> {
    // More specific ranges must come before the general ones they overlap
    match digits {
        // Mir: 2200-2204 (before Mastercard 2221-2720)
        [2, 2, 0, 0..=4, ..] => Some(CardBrand::Mir),

        // Mastercard: 51-55 or 2221-2720
        [5, 1..=5, ..] => Some(CardBrand::Mastercard),
        [2, 2, 2, 1..=9, ..] => Some(CardBrand::Mastercard),
        [2, 2, 3..=9, _, ..] => Some(CardBrand::Mastercard),
        [2, 3..=6, _, _, ..] => Some(CardBrand::Mastercard),
        [2, 7, 0..=1, _, ..] => Some(CardBrand::Mastercard),
        [2, 7, 2, 0, ..] => Some(CardBrand::Mastercard),

        [3, 4, ..] | [3, 7, ..] => Some(CardBrand::Amex),

        // Diners Club: 36, 38, 300-305, 309
        [3, 6, ..] | [3, 8, ..] => Some(CardBrand::DinersClub),
        [3, 0, 0..=5, ..] | [3, 0, 9, ..] => Some(CardBrand::DinersClub),

        // JCB: 3528-3589
        [3, 5, 2, 8..=9, ..] => Some(CardBrand::Jcb),
        [3, 5, 3..=8, _, ..] => Some(CardBrand::Jcb),

        [4, ..] => Some(CardBrand::Visa),

        // Verve and Elo carve out of the Maestro 50 range
        [5, 0, 6..=7, ..] => Some(CardBrand::Verve),
        [5, 0, 9, ..] => Some(CardBrand::Elo),
        [5, 0, _, ..] => Some(CardBrand::Maestro),
        [5, 6..=8, ..] => Some(CardBrand::Maestro),

        // Discover: 6011, 644-649, 65
        [6, 0, 1, 1, ..] => Some(CardBrand::Discover),
        [6, 4, 4..=9, ..] => Some(CardBrand::Discover),
        [6, 5, ..] => Some(CardBrand::Discover),

        [6, 3, 6, 2..=3, ..] => Some(CardBrand::Elo),
        [6, 2, ..] => Some(CardBrand::UnionPay),

        // Remaining 6x ranges are Maestro once a third digit rules out the rest
        [6, 0, _, _, ..] | [6, 1, ..] | [6, 3, _, _, ..] | [6, 6..=9, ..] => {
            Some(CardBrand::Maestro)
        }

        [8, 1, ..] | [8, 2, ..] => Some(CardBrand::RuPay),
        [9, 4, ..] => Some(CardBrand::BcCard),
        [9, 7, 9, 2, ..] => Some(CardBrand::Troy),

        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_from_single_digit() {
        assert_eq!(detect_brand("4"), Some(CardBrand::Visa));
        assert_eq!(detect_brand("5"), None);
        assert_eq!(detect_brand("3"), None);
    }

    #[test]
    fn test_detects_common_prefixes() {
        assert_eq!(detect_brand("51"), Some(CardBrand::Mastercard));
        assert_eq!(detect_brand("2221"), Some(CardBrand::Mastercard));
        assert_eq!(detect_brand("2720"), Some(CardBrand::Mastercard));
        assert_eq!(detect_brand("34"), Some(CardBrand::Amex));
        assert_eq!(detect_brand("37"), Some(CardBrand::Amex));
        assert_eq!(detect_brand("6011"), Some(CardBrand::Discover));
        assert_eq!(detect_brand("65"), Some(CardBrand::Discover));
        assert_eq!(detect_brand("36"), Some(CardBrand::DinersClub));
        assert_eq!(detect_brand("305"), Some(CardBrand::DinersClub));
        assert_eq!(detect_brand("3530"), Some(CardBrand::Jcb));
        assert_eq!(detect_brand("62"), Some(CardBrand::UnionPay));
    }

    #[test]
    fn test_overlapping_ranges() {
        assert_eq!(detect_brand("2200"), Some(CardBrand::Mir));
        assert_eq!(detect_brand("506"), Some(CardBrand::Verve));
        assert_eq!(detect_brand("509"), Some(CardBrand::Elo));
        assert_eq!(detect_brand("500"), Some(CardBrand::Maestro));
        assert_eq!(detect_brand("6362"), Some(CardBrand::Elo));
        assert_eq!(detect_brand("9792"), Some(CardBrand::Troy));
    }

    #[test]
    fn test_ignores_separators() {
        assert_eq!(detect_brand("3782 822463 10005"), Some(CardBrand::Amex));
        assert_eq!(detect_brand(" 4-1"), Some(CardBrand::Visa));
    }

    #[test]
    fn test_unknown_prefix() {
        assert_eq!(detect_brand("1234"), None);
        assert_eq!(detect_brand("abc"), None);
        assert_eq!(detect_brand_digits(&[]), None);
    }
}
