//! Expiry date input and validation.
//!
//! While the user types, an expiry date is held as an [`ExpiryDraft`]: a month
//! segment and a year segment of at most two digits each. Keeping the split
//! explicit is what lets a backspace over the slash in `"42/25"` produce
//! `"4/25"` instead of reflowing the digits into `"42/5"`.
//!
//! Once complete, the digits parse into an [`ExpiryDate`] that is checked
//! against the current month.
//!
//! # Example
//!
//! ```
//! use checkout_fields::edit::TextEdit;
//! use checkout_fields::expiry::{format_expiry, ExpiryDraft};
//!
//! let draft = ExpiryDraft::from_text("42/25");
//! let edited = draft.apply_edit(&TextEdit::delete(2..3));
//! assert_eq!(edited.formatted(), "4/25");
//! assert_eq!(format_expiry("4/25"), "4/25");
//!
//! assert_eq!(format_expiry("1225"), "12/25");
//! assert_eq!(format_expiry("1"), "1");
//! ```

use crate::edit::{self, EditPolicy, TextEdit};
use std::fmt;
use std::ops::Range;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Separator between the month and year segments.
pub const EXPIRY_SEPARATOR: char = '/';

/// Maximum number of raw digits in an expiry date (`MMYY`).
pub const MAX_EXPIRY_DIGITS: usize = 4;

const SEGMENT_DIGITS: usize = 2;

/// Returns true for the expiry separator.
#[inline]
pub fn is_expiry_separator(c: char) -> bool {
    c == EXPIRY_SEPARATOR
}

/// Edit policy for the digits of an expiry date.
pub const EXPIRY_POLICY: EditPolicy = EditPolicy::digits(MAX_EXPIRY_DIGITS, is_expiry_separator);

/// An expiry date as it is being typed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpiryDraft {
    month: String,
    year: String,
}

impl ExpiryDraft {
    /// Splits digits the standard way: the first two are the month.
    pub fn from_digits(digits: &str) -> Self {
        let digits: String = digits
            .chars()
            .filter(char::is_ascii_digit)
            .take(MAX_EXPIRY_DIGITS)
            .collect();
        let split = digits.len().min(SEGMENT_DIGITS);
        Self {
            month: digits[..split].to_string(),
            year: digits[split..].to_string(),
        }
    }

    /// Reads a displayed value, keeping an existing slash split.
    ///
    /// Text without a slash is split the standard way.
    pub fn from_text(text: &str) -> Self {
        let Some((month, year)) = text.split_once(EXPIRY_SEPARATOR) else {
            return Self::from_digits(text);
        };
        let segment = |s: &str| -> String {
            s.chars()
                .filter(char::is_ascii_digit)
                .take(SEGMENT_DIGITS)
                .collect()
        };
        Self {
            month: segment(month),
            year: segment(year),
        }
        .normalized()
    }

    /// Month segment digits.
    #[inline]
    pub fn month(&self) -> &str {
        &self.month
    }

    /// Year segment digits.
    #[inline]
    pub fn year(&self) -> &str {
        &self.year
    }

    /// All digits, month first.
    pub fn digits(&self) -> String {
        format!("{}{}", self.month, self.year)
    }

    /// True when both segments hold two digits.
    pub fn is_complete(&self) -> bool {
        self.month.len() == SEGMENT_DIGITS && self.year.len() == SEGMENT_DIGITS
    }

    /// Display form. The slash appears once the year segment has a digit.
    pub fn formatted(&self) -> String {
        if self.year.is_empty() {
            self.month.clone()
        } else {
            format!("{}{}{}", self.month, EXPIRY_SEPARATOR, self.year)
        }
    }

    /// Applies an edit made against [`formatted`](Self::formatted).
    ///
    /// Insertions reflow every digit into the standard split. Deletions keep
    /// the segments apart: removing the slash drops the last month digit,
    /// and removed digits come out of their own segment. A month left empty
    /// pulls the year forward.
    pub fn apply_edit(&self, edit: &TextEdit) -> Self {
        let formatted = self.formatted();
        if !edit.is_deletion() {
            let digits = edit::apply(&self.digits(), edit, &formatted, &EXPIRY_POLICY);
            return Self::from_digits(&digits);
        }

        let len = formatted.chars().count();
        let Range { start, end } = edit.range;
        if start >= end || start >= len {
            return self.clone();
        }
        let end = end.min(len);

        let month_len = self.month.len();
        let has_slash = !self.year.is_empty();
        let year_start = month_len + usize::from(has_slash);

        let month_cut = overlap(start..end, 0..month_len);
        let year_cut = overlap(start..end, year_start..len);
        let slash_hit = has_slash && start <= month_len && month_len < end;

        let mut next = self.clone();
        if month_cut.is_empty() && year_cut.is_empty() {
            if slash_hit {
                next.month.pop();
            }
        } else {
            next.month.replace_range(month_cut, "");
            next.year
                .replace_range(year_cut.start - year_start..year_cut.end - year_start, "");
        }
        next.normalized()
    }

    fn normalized(self) -> Self {
        if self.month.is_empty() && !self.year.is_empty() {
            Self::from_digits(&self.year)
        } else {
            self
        }
    }
}

/// Intersection of two ranges, empty (`start..start`) when disjoint.
fn overlap(a: Range<usize>, b: Range<usize>) -> Range<usize> {
    let start = a.start.max(b.start);
    let end = a.end.min(b.end);
    if start < end {
        start..end
    } else {
        b.start..b.start
    }
}

/// Formats expiry text as `MM/YY`, honouring an existing slash.
///
/// Formatting an already formatted value returns it unchanged.
pub fn format_expiry(text: &str) -> String {
    ExpiryDraft::from_text(text).formatted()
}

/// A parsed expiry date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryDate {
    /// Month (1-12)
    month: u8,
    /// Four-digit year
    year: u16,
}

impl ExpiryDate {
    /// Creates a new expiry date, `None` if the month is not 1-12.
    pub fn new(month: u8, year: u16) -> Option<Self> {
        if !(1..=12).contains(&month) {
            return None;
        }
        Some(Self { month, year })
    }

    /// Returns the month (1-12).
    #[inline]
    pub const fn month(&self) -> u8 {
        self.month
    }

    /// Returns the four-digit year.
    #[inline]
    pub const fn year(&self) -> u16 {
        self.year
    }

    /// True if the card expired before `(year, month)`.
    ///
    /// A card stays valid through the end of its expiry month.
    pub const fn is_expired_at(&self, year: u16, month: u8) -> bool {
        self.year < year || (self.year == year && self.month < month)
    }

    /// True if the card has expired as of today.
    pub fn is_expired(&self) -> bool {
        let (year, month) = current_year_month();
        self.is_expired_at(year, month)
    }
}

impl fmt::Display for ExpiryDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}/{:02}", self.month, self.year % 100)
    }
}

/// Errors from parsing or checking an expiry date.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpiryError {
    /// The input is empty.
    #[error("expiry date is empty")]
    Empty,
    /// The digits do not form `MM/YY`.
    #[error("invalid expiry format (expected MM/YY)")]
    InvalidFormat,
    /// Month is out of range.
    #[error("invalid month {0}: must be 1-12")]
    InvalidMonth(u8),
    /// The date is in the past.
    #[error("card expired ({month:02}/{year})")]
    Expired {
        /// The expiry month.
        month: u8,
        /// The expiry year.
        year: u16,
    },
    /// The date is further ahead than any issuer would print.
    #[error("expiry year {year} is too far in the future (max: {max_year})")]
    TooFarFuture {
        /// The expiry year.
        year: u16,
        /// Maximum allowed year.
        max_year: u16,
    },
}

/// Parses `MMYY`, `MM/YY`, or `MM/YYYY`.
///
/// # Example
///
/// ```
/// use checkout_fields::expiry::parse_expiry;
///
/// let expiry = parse_expiry("1230").unwrap();
/// assert_eq!((expiry.month(), expiry.year()), (12, 2030));
/// assert!(parse_expiry("425").is_err());
/// ```
pub fn parse_expiry(input: &str) -> Result<ExpiryDate, ExpiryError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ExpiryError::Empty);
    }

    if let Some((month, year)) = input.split_once(EXPIRY_SEPARATOR) {
        return parse_month_year(month.trim(), year.trim());
    }

    if input.len() == MAX_EXPIRY_DIGITS && input.bytes().all(|b| b.is_ascii_digit()) {
        return parse_month_year(&input[..2], &input[2..]);
    }
    Err(ExpiryError::InvalidFormat)
}

fn parse_month_year(month_str: &str, year_str: &str) -> Result<ExpiryDate, ExpiryError> {
    if month_str.len() != 2 || !month_str.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ExpiryError::InvalidFormat);
    }
    let month: u8 = month_str.parse().map_err(|_| ExpiryError::InvalidFormat)?;
    if !(1..=12).contains(&month) {
        return Err(ExpiryError::InvalidMonth(month));
    }

    if !year_str.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ExpiryError::InvalidFormat);
    }
    let year: u16 = match year_str.len() {
        2 => 2000 + year_str.parse::<u16>().map_err(|_| ExpiryError::InvalidFormat)?,
        4 => year_str.parse().map_err(|_| ExpiryError::InvalidFormat)?,
        _ => return Err(ExpiryError::InvalidFormat),
    };

    Ok(ExpiryDate { month, year })
}

/// Parses and checks an expiry date against `today` (`(year, month)`).
///
/// Rejects past dates and dates more than `max_years_future` years ahead.
pub fn validate_expiry_at(
    input: &str,
    today: (u16, u8),
    max_years_future: u16,
) -> Result<ExpiryDate, ExpiryError> {
    let expiry = parse_expiry(input)?;
    let (year, month) = today;

    if expiry.is_expired_at(year, month) {
        return Err(ExpiryError::Expired {
            month: expiry.month,
            year: expiry.year,
        });
    }
    let max_year = year.saturating_add(max_years_future);
    if expiry.year > max_year {
        return Err(ExpiryError::TooFarFuture {
            year: expiry.year,
            max_year,
        });
    }
    Ok(expiry)
}

/// Current UTC `(year, month)`.
pub fn current_year_month() -> (u16, u8) {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    civil_year_month(secs / 86_400)
}

/// Converts days since the Unix epoch to a proleptic Gregorian `(year, month)`.
fn civil_year_month(days: u64) -> (u16, u8) {
    // Shift the epoch to 0000-03-01 so leap days fall at the end of each era year
    let z = days + 719_468;
    let era = z / 146_097;
    let day_of_era = z % 146_097;
    let year_of_era =
        (day_of_era - day_of_era / 1_460 + day_of_era / 36_524 - day_of_era / 146_096) / 365;
    let day_of_year = day_of_era - (365 * year_of_era + year_of_era / 4 - year_of_era / 100);
    let mp = (5 * day_of_year + 2) / 153;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = year_of_era + era * 400 + u64::from(month <= 2);
    (
        u16::try_from(year).unwrap_or(u16::MAX),
        u8::try_from(month).unwrap_or(12),
    )
}
