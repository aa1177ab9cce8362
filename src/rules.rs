//! Authoritative validation rules.
//!
//! The field state machine never decides validity on its own for a
//! non-empty value: it asks a [`FieldValidator`]. [`DefaultValidator`] carries
//! the rules for every [`FieldKind`]; hosts with their own backend rules can
//! inject a different implementation per field.
//!
//! # Example
//!
//! ```
//! use checkout_fields::rules::{DefaultValidator, FieldValidator, RuleContext};
//! use checkout_fields::FieldKind;
//!
//! let validator = DefaultValidator;
//! let ctx = RuleContext::new(FieldKind::CardNumber);
//!
//! assert!(validator.validate("4242424242424242", &ctx).is_valid);
//!
//! let outcome = validator.validate("4242424242424241", &ctx);
//! assert!(!outcome.is_valid);
//! assert_eq!(outcome.code.as_deref(), Some("invalid-card-number"));
//! ```

use crate::card::{MAX_CARD_DIGITS, MIN_CARD_DIGITS};
use crate::cvv::validate_cvv;
use crate::detect::detect_brand;
use crate::expiry::{current_year_month, validate_expiry_at};
use crate::field::FieldKind;
use crate::{luhn, CardBrand};
use thiserror::Error;

/// Default OTP length.
pub const DEFAULT_OTP_LENGTH: usize = 6;

/// Latest expiry year accepted, counted from the current year.
pub const MAX_EXPIRY_YEARS_AHEAD: u16 = 20;

/// Result of running a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    /// Whether the value passed.
    pub is_valid: bool,
    /// User-facing message for a failure.
    pub message: Option<String>,
    /// Machine-readable code, `invalid-<field>`.
    pub code: Option<String>,
}

impl ValidationOutcome {
    /// A passing outcome.
    pub const fn valid() -> Self {
        Self {
            is_valid: true,
            message: None,
            code: None,
        }
    }

    /// A failing outcome for `kind` with a message.
    pub fn invalid(kind: FieldKind, message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            message: Some(message.into()),
            code: Some(kind.error_code().to_string()),
        }
    }
}

/// What a rule needs to know beyond the value itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleContext {
    /// Field being validated.
    pub kind: FieldKind,
    /// Network detected from the card number, if any.
    pub network: Option<CardBrand>,
    /// Whether an empty value fails.
    pub required: bool,
    /// ISO country code used by the postal code rule.
    pub country_code: Option<String>,
    /// Exact OTP digit count.
    pub otp_length: usize,
    /// `(year, month)` to check expiry against; the current month when `None`.
    pub today: Option<(u16, u8)>,
}

impl RuleContext {
    /// Context with the field's default requirement and no extra data.
    pub fn new(kind: FieldKind) -> Self {
        Self {
            kind,
            network: None,
            required: kind.is_required_by_default(),
            country_code: None,
            otp_length: DEFAULT_OTP_LENGTH,
            today: None,
        }
    }

    /// Sets the detected card network.
    pub fn with_network(mut self, network: Option<CardBrand>) -> Self {
        self.network = network;
        self
    }

    /// Overrides whether the field is required.
    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Sets the billing country for postal code rules.
    pub fn with_country_code(mut self, country_code: impl Into<String>) -> Self {
        self.country_code = Some(country_code.into());
        self
    }

    /// Sets the expected OTP length.
    pub fn with_otp_length(mut self, otp_length: usize) -> Self {
        self.otp_length = otp_length;
        self
    }

    /// Pins the date expiry rules compare against.
    pub fn with_today(mut self, year: u16, month: u8) -> Self {
        self.today = Some((year, month));
        self
    }
}

/// Authoritative validation for one field kind.
pub trait FieldValidator: Send + Sync {
    /// Validates a raw value.
    fn validate(&self, value: &str, context: &RuleContext) -> ValidationOutcome;
}

impl<F> FieldValidator for F
where
    F: Fn(&str, &RuleContext) -> ValidationOutcome + Send + Sync,
{
    fn validate(&self, value: &str, context: &RuleContext) -> ValidationOutcome {
        self(value, context)
    }
}

/// Errors from the card number rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CardNumberError {
    /// A non-digit character is present.
    #[error("card number may only contain digits")]
    InvalidCharacter,
    /// Fewer digits than any network issues.
    #[error("card number too short: got {length} digits, minimum is {minimum}")]
    TooShort {
        /// Digits provided.
        length: usize,
        /// Minimum accepted.
        minimum: usize,
    },
    /// More digits than any network issues.
    #[error("card number too long: got {length} digits, maximum is {maximum}")]
    TooLong {
        /// Digits provided.
        length: usize,
        /// Maximum accepted.
        maximum: usize,
    },
    /// Length is not one the network issues.
    #[error("{brand} cards must have {expected} digits, got {length}")]
    InvalidLengthForBrand {
        /// Detected network.
        brand: CardBrand,
        /// Digits provided.
        length: usize,
        /// Accepted lengths, joined for display.
        expected: String,
    },
    /// Luhn checksum failed.
    #[error("invalid card number - please check the digits")]
    InvalidChecksum,
}

/// Checks a raw card number: digits, length for the network, then Luhn.
///
/// Returns the detected network, `None` for a checksum-valid number with an
/// unrecognised prefix.
pub fn validate_card_number(raw: &str) -> Result<Option<CardBrand>, CardNumberError> {
    if !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CardNumberError::InvalidCharacter);
    }
    let length = raw.len();
    if length < MIN_CARD_DIGITS {
        return Err(CardNumberError::TooShort {
            length,
            minimum: MIN_CARD_DIGITS,
        });
    }
    if length > MAX_CARD_DIGITS {
        return Err(CardNumberError::TooLong {
            length,
            maximum: MAX_CARD_DIGITS,
        });
    }

    let brand = detect_brand(raw);
    if let Some(brand) = brand {
        if !brand.is_valid_length(length) {
            let expected: Vec<String> = brand.valid_lengths().iter().map(u8::to_string).collect();
            return Err(CardNumberError::InvalidLengthForBrand {
                brand,
                length,
                expected: expected.join(" or "),
            });
        }
    }
    if !luhn::passes(raw) {
        return Err(CardNumberError::InvalidChecksum);
    }
    Ok(brand)
}

/// Built-in rules for every field kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultValidator;

impl FieldValidator for DefaultValidator {
    fn validate(&self, value: &str, context: &RuleContext) -> ValidationOutcome {
        let kind = context.kind;
        let trimmed = value.trim();

        if trimmed.is_empty() {
            return if context.required {
                ValidationOutcome::invalid(kind, format!("{} is required", kind.label()))
            } else {
                ValidationOutcome::valid()
            };
        }

        let invalid = || ValidationOutcome::invalid(kind, format!("{} is invalid", kind.label()));
        let check = |ok: bool| if ok { ValidationOutcome::valid() } else { invalid() };

        match kind {
            FieldKind::CardNumber => match validate_card_number(value) {
                Ok(_) => ValidationOutcome::valid(),
                Err(err) => ValidationOutcome::invalid(kind, err.to_string()),
            },
            FieldKind::Cvv => match validate_cvv(value, context.network) {
                Ok(()) => ValidationOutcome::valid(),
                Err(err) => ValidationOutcome::invalid(kind, err.to_string()),
            },
            FieldKind::ExpiryDate => {
                let today = context.today.unwrap_or_else(current_year_month);
                match validate_expiry_at(value, today, MAX_EXPIRY_YEARS_AHEAD) {
                    Ok(_) => ValidationOutcome::valid(),
                    Err(err) => ValidationOutcome::invalid(kind, err.to_string()),
                }
            }
            FieldKind::CardholderName | FieldKind::FirstName | FieldKind::LastName => {
                check(is_valid_name(trimmed))
            }
            FieldKind::AddressLine1 => check((3..=100).contains(&trimmed.chars().count())),
            FieldKind::AddressLine2 => check(trimmed.chars().count() <= 100),
            FieldKind::City | FieldKind::State => check(trimmed.chars().count() >= 2),
            FieldKind::PostalCode => {
                check(is_valid_postal_code(trimmed, context.country_code.as_deref()))
            }
            FieldKind::CountryCode => check(
                (2..=3).contains(&trimmed.len()) && trimmed.bytes().all(|b| b.is_ascii_alphabetic()),
            ),
            FieldKind::Email => check(is_valid_email(trimmed)),
            FieldKind::PhoneNumber => check(is_valid_phone(trimmed)),
            FieldKind::Otp => check(
                value.len() == context.otp_length && value.bytes().all(|b| b.is_ascii_digit()),
            ),
        }
    }
}

/// Letters, spaces, hyphens, and apostrophes; at least two characters.
fn is_valid_name(name: &str) -> bool {
    name.chars().count() >= 2
        && name
            .chars()
            .all(|c| c.is_alphabetic() || c.is_whitespace() || c == '-' || c == '\'')
}

fn is_valid_postal_code(code: &str, country: Option<&str>) -> bool {
    let country = country.map(str::to_ascii_uppercase);
    let bytes = code.as_bytes();
    match country.as_deref() {
        Some("US") => {
            let zip5 = |b: &[u8]| b.len() == 5 && b.iter().all(u8::is_ascii_digit);
            match bytes.len() {
                5 => zip5(bytes),
                10 => {
                    zip5(&bytes[..5])
                        && bytes[5] == b'-'
                        && bytes[6..].iter().all(u8::is_ascii_digit)
                }
                _ => false,
            }
        }
        Some("GB") => {
            (5..=8).contains(&bytes.len())
                && bytes.iter().all(|b| b.is_ascii_alphanumeric() || *b == b' ')
        }
        Some("CA") => {
            let compact: Vec<u8> = bytes
                .iter()
                .copied()
                .filter(|b| *b != b' ' && *b != b'-')
                .collect();
            bytes.len() <= 7
                && compact.len() == 6
                && compact.iter().enumerate().all(|(i, b)| {
                    if i % 2 == 0 {
                        b.is_ascii_alphabetic()
                    } else {
                        b.is_ascii_digit()
                    }
                })
        }
        _ => {
            (3..=10).contains(&bytes.len())
                && bytes
                    .iter()
                    .all(|b| b.is_ascii_alphanumeric() || *b == b' ' || *b == b'-')
        }
    }
}

fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    let local_ok = !local.is_empty()
        && local
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"._%+-".contains(&b));
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    let host_ok = !host.is_empty()
        && host
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'-');
    let tld_ok = tld.len() >= 2 && tld.bytes().all(|b| b.is_ascii_alphabetic());
    local_ok && host_ok && tld_ok
}

fn is_valid_phone(phone: &str) -> bool {
    let digits: Vec<char> = phone
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '+'))
        .collect();
    (7..=15).contains(&digits.len()) && digits.iter().all(char::is_ascii_digit)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(kind: FieldKind, value: &str) -> ValidationOutcome {
        DefaultValidator.validate(value, &RuleContext::new(kind))
    }

    #[test]
    fn test_card_number_rule() {
        assert!(run(FieldKind::CardNumber, "4242424242424242").is_valid);
        assert!(run(FieldKind::CardNumber, "378282246310005").is_valid);

        let outcome = run(FieldKind::CardNumber, "4242424242424241");
        assert_eq!(outcome.code.as_deref(), Some("invalid-card-number"));
        assert_eq!(
            outcome.message.as_deref(),
            Some("invalid card number - please check the digits")
        );
    }

    #[test]
    fn test_card_number_errors() {
        assert_eq!(
            validate_card_number("4242"),
            Err(CardNumberError::TooShort {
                length: 4,
                minimum: 12
            })
        );
        assert_eq!(
            validate_card_number("42424242424242424242"),
            Err(CardNumberError::TooLong {
                length: 20,
                maximum: 19
            })
        );
        assert_eq!(
            validate_card_number("4242 4242"),
            Err(CardNumberError::InvalidCharacter)
        );
        let err = validate_card_number("37828224631000").unwrap_err();
        assert_eq!(
            err.to_string(),
            "American Express cards must have 15 digits, got 14"
        );
    }

    #[test]
    fn test_cvv_rule_uses_network() {
        let ctx = RuleContext::new(FieldKind::Cvv).with_network(Some(CardBrand::Amex));
        assert!(DefaultValidator.validate("1234", &ctx).is_valid);
        let outcome = DefaultValidator.validate("123", &ctx);
        assert!(!outcome.is_valid);
        assert_eq!(outcome.code.as_deref(), Some("invalid-cvv"));
    }

    #[test]
    fn test_expiry_rule_uses_pinned_date() {
        let ctx = RuleContext::new(FieldKind::ExpiryDate).with_today(2026, 10);
        assert!(DefaultValidator.validate("1226", &ctx).is_valid);
        let outcome = DefaultValidator.validate("0126", &ctx);
        assert_eq!(outcome.code.as_deref(), Some("invalid-expiry-date"));
        assert!(!DefaultValidator.validate("425", &ctx).is_valid);
    }

    #[test]
    fn test_empty_required_and_optional() {
        let outcome = run(FieldKind::CardholderName, "");
        assert!(!outcome.is_valid);
        assert_eq!(outcome.message.as_deref(), Some("Cardholder name is required"));

        assert!(run(FieldKind::AddressLine2, "").is_valid);
        let ctx = RuleContext::new(FieldKind::City).with_required(false);
        assert!(DefaultValidator.validate("  ", &ctx).is_valid);
    }

    #[test]
    fn test_name_rule() {
        assert!(run(FieldKind::CardholderName, "Jane O'Neil-Smith").is_valid);
        assert!(run(FieldKind::FirstName, "José").is_valid);
        assert!(!run(FieldKind::LastName, "J").is_valid);
        assert!(!run(FieldKind::CardholderName, "R2D2").is_valid);
    }

    #[test]
    fn test_address_rules() {
        assert!(run(FieldKind::AddressLine1, "1 Main St").is_valid);
        assert!(!run(FieldKind::AddressLine1, "No").is_valid);
        assert!(!run(FieldKind::AddressLine1, &"a".repeat(101)).is_valid);
        assert!(run(FieldKind::City, "Oslo").is_valid);
        assert!(!run(FieldKind::State, "X").is_valid);
    }

    #[test]
    fn test_postal_code_by_country() {
        let us = RuleContext::new(FieldKind::PostalCode).with_country_code("us");
        assert!(DefaultValidator.validate("94107", &us).is_valid);
        assert!(DefaultValidator.validate("94107-1234", &us).is_valid);
        assert!(!DefaultValidator.validate("9410", &us).is_valid);

        let gb = RuleContext::new(FieldKind::PostalCode).with_country_code("GB");
        assert!(DefaultValidator.validate("SW1A 1AA", &gb).is_valid);
        assert!(!DefaultValidator.validate("SW1", &gb).is_valid);

        let ca = RuleContext::new(FieldKind::PostalCode).with_country_code("CA");
        assert!(DefaultValidator.validate("K1A 0B1", &ca).is_valid);
        assert!(!DefaultValidator.validate("K1A 0BB", &ca).is_valid);

        assert!(run(FieldKind::PostalCode, "75008").is_valid);
        assert!(!run(FieldKind::PostalCode, "75#08").is_valid);
    }

    #[test]
    fn test_country_email_phone() {
        assert!(run(FieldKind::CountryCode, "NO").is_valid);
        assert!(!run(FieldKind::CountryCode, "N0").is_valid);
        assert!(run(FieldKind::Email, "jane.doe+shop@example.co").is_valid);
        assert!(!run(FieldKind::Email, "jane@example").is_valid);
        assert!(!run(FieldKind::Email, "@example.com").is_valid);
        assert!(run(FieldKind::PhoneNumber, "+1 (415) 555-0100").is_valid);
        assert!(!run(FieldKind::PhoneNumber, "555-01").is_valid);
    }

    #[test]
    fn test_otp_rule() {
        assert!(run(FieldKind::Otp, "123456").is_valid);
        assert!(!run(FieldKind::Otp, "12345").is_valid);
        let ctx = RuleContext::new(FieldKind::Otp).with_otp_length(4);
        assert!(DefaultValidator.validate("1234", &ctx).is_valid);
        assert_eq!(
            DefaultValidator.validate("12a4", &ctx).code.as_deref(),
            Some("invalid-otp-code")
        );
    }

    #[test]
    fn test_closure_validator() {
        let always_valid = |_: &str, _: &RuleContext| ValidationOutcome::valid();
        let ctx = RuleContext::new(FieldKind::Email);
        assert!(always_valid.validate("anything", &ctx).is_valid);
    }
}
