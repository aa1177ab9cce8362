//! Security code (CVV/CVC/CID) rules.
//!
//! American Express prints a 4-digit CID on the front of the card; every
//! other network uses 3 digits on the back. While the network is unknown
//! either length is accepted.
//!
//! # Example
//!
//! ```
//! use checkout_fields::cvv::{validate_cvv, expected_cvv_length};
//! use checkout_fields::CardBrand;
//!
//! assert!(validate_cvv("123", Some(CardBrand::Visa)).is_ok());
//! assert!(validate_cvv("1234", Some(CardBrand::Amex)).is_ok());
//! assert!(validate_cvv("1234", Some(CardBrand::Visa)).is_err());
//! assert_eq!(expected_cvv_length(Some(CardBrand::Amex)), 4);
//! ```

use crate::CardBrand;
use thiserror::Error;

/// Longest security code any network uses.
pub const MAX_CVV_DIGITS: usize = 4;

/// Errors from the security code rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CvvError {
    /// The input is empty.
    #[error("CVV is empty")]
    Empty,
    /// The CVV contains a non-digit character.
    #[error("invalid character '{character}' at position {position} in CVV")]
    InvalidCharacter {
        /// The invalid character found.
        character: char,
        /// Position of the invalid character.
        position: usize,
    },
    /// Length is neither 3 nor 4 and no network is known.
    #[error("CVV must be 3 or 4 digits, got {length}")]
    InvalidLength {
        /// Actual length provided.
        length: usize,
    },
    /// Length does not match the network.
    #[error("{brand} CVV must be {expected} digits, got {length}")]
    WrongLengthForBrand {
        /// The card network.
        brand: CardBrand,
        /// Actual length provided.
        length: usize,
        /// Expected length for this network.
        expected: usize,
    },
}

/// Security code length the field should complete at.
///
/// Unknown networks complete at 3 digits; a fourth digit is still accepted.
#[inline]
pub fn expected_cvv_length(brand: Option<CardBrand>) -> usize {
    brand.map_or(3, |b| b.cvv_length())
}

/// Checks a raw security code against the network's length.
pub fn validate_cvv(raw: &str, brand: Option<CardBrand>) -> Result<(), CvvError> {
    if raw.is_empty() {
        return Err(CvvError::Empty);
    }
    if let Some((position, character)) = raw.chars().enumerate().find(|(_, c)| !c.is_ascii_digit())
    {
        return Err(CvvError::InvalidCharacter {
            character,
            position,
        });
    }

    let length = raw.len();
    match brand {
        Some(brand) if length != brand.cvv_length() => Err(CvvError::WrongLengthForBrand {
            brand,
            length,
            expected: brand.cvv_length(),
        }),
        None if !(3..=MAX_CVV_DIGITS).contains(&length) => Err(CvvError::InvalidLength { length }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brand_lengths() {
        assert!(validate_cvv("123", Some(CardBrand::Mastercard)).is_ok());
        assert!(validate_cvv("1234", Some(CardBrand::Amex)).is_ok());
        assert_eq!(
            validate_cvv("123", Some(CardBrand::Amex)),
            Err(CvvError::WrongLengthForBrand {
                brand: CardBrand::Amex,
                length: 3,
                expected: 4
            })
        );
    }

    #[test]
    fn test_unknown_brand_accepts_three_or_four() {
        assert!(validate_cvv("123", None).is_ok());
        assert!(validate_cvv("1234", None).is_ok());
        assert_eq!(validate_cvv("12", None), Err(CvvError::InvalidLength { length: 2 }));
    }

    #[test]
    fn test_rejects_non_digits() {
        assert_eq!(
            validate_cvv("1a3", None),
            Err(CvvError::InvalidCharacter {
                character: 'a',
                position: 1
            })
        );
        assert_eq!(validate_cvv("", None), Err(CvvError::Empty));
    }

    #[test]
    fn test_error_messages() {
        let err = validate_cvv("12", Some(CardBrand::Visa)).unwrap_err();
        assert_eq!(err.to_string(), "Visa CVV must be 3 digits, got 2");
    }

    #[test]
    fn test_expected_length() {
        assert_eq!(expected_cvv_length(None), 3);
        assert_eq!(expected_cvv_length(Some(CardBrand::Visa)), 3);
        assert_eq!(expected_cvv_length(Some(CardBrand::Amex)), 4);
    }
}
