//! Card network catalogue.
//!
//! [`CardBrand`] describes each supported network as the input layer sees it:
//! which raw lengths complete a number, where the formatter places its
//! separators, how long the security code is, and which identifier the
//! backend uses for the network in configuration payloads.

use std::fmt;
use std::str::FromStr;

/// Supported card networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CardBrand {
    /// Visa - Prefix 4, lengths 13, 16, 19
    Visa,
    /// Mastercard - Prefix 51-55, 2221-2720, length 16
    Mastercard,
    /// American Express - Prefix 34, 37, length 15
    Amex,
    /// Discover - Prefix 6011, 644-649, 65, length 16-19
    Discover,
    /// Diners Club - Prefix 36, 38, 300-305, length 14-19
    DinersClub,
    /// JCB - Prefix 3528-3589, length 16-19
    Jcb,
    /// UnionPay - Prefix 62, length 16-19
    UnionPay,
    /// Maestro - Prefix 50, 56-69, length 12-19
    Maestro,
    /// Mir - Prefix 2200-2204, length 16-19
    Mir,
    /// RuPay - Prefix 81, 82, length 16
    RuPay,
    /// Verve - Prefix 506, 507, length 16-19
    Verve,
    /// Elo - Prefix 509, 6362, 6363, length 16
    Elo,
    /// Troy - Prefix 9792, length 16
    Troy,
    /// BC Card - Prefix 94, length 16
    BcCard,
}

/// Default separator positions for card numbers (groups of four).
pub const DEFAULT_CARD_GAPS: &[usize] = &[4, 8, 12];

/// Maximum number of raw digits a card number field accepts.
pub const MAX_CARD_DIGITS: usize = 19;

/// Minimum number of digits before a card number is worth validating.
pub const MIN_CARD_DIGITS: usize = 12;

impl CardBrand {
    /// Every supported network, in detection priority order.
    pub const ALL: [CardBrand; 14] = [
        Self::Visa,
        Self::Mastercard,
        Self::Amex,
        Self::Discover,
        Self::DinersClub,
        Self::Jcb,
        Self::UnionPay,
        Self::Maestro,
        Self::Mir,
        Self::RuPay,
        Self::Verve,
        Self::Elo,
        Self::Troy,
        Self::BcCard,
    ];

    /// Returns the valid lengths for this card brand.
    #[inline]
    pub const fn valid_lengths(&self) -> &'static [u8] {
        match self {
            Self::Visa => &[13, 16, 19],
            Self::Mastercard => &[16],
            Self::Amex => &[15],
            Self::Discover => &[16, 17, 18, 19],
            Self::DinersClub => &[14, 15, 16, 17, 18, 19],
            Self::Jcb => &[16, 17, 18, 19],
            Self::UnionPay => &[16, 17, 18, 19],
            Self::Maestro => &[12, 13, 14, 15, 16, 17, 18, 19],
            Self::Mir => &[16, 17, 18, 19],
            Self::RuPay => &[16],
            Self::Verve => &[16, 17, 18, 19],
            Self::Elo => &[16],
            Self::Troy => &[16],
            Self::BcCard => &[16],
        }
    }

    /// Returns true if the given length is valid for this brand.
    #[inline]
    pub const fn is_valid_length(&self, length: usize) -> bool {
        let valid = self.valid_lengths();
        let mut i = 0;
        while i < valid.len() {
            if valid[i] as usize == length {
                return true;
            }
            i += 1;
        }
        false
    }

    /// Longest raw length this brand accepts.
    #[inline]
    pub const fn max_length(&self) -> usize {
        let valid = self.valid_lengths();
        valid[valid.len() - 1] as usize
    }

    /// 1-based raw positions after which the formatter inserts a separator.
    ///
    /// American Express and Diners Club group as 4-6-5 and 4-6-4; every
    /// other network uses blocks of four.
    #[inline]
    pub const fn gaps(&self) -> &'static [usize] {
        match self {
            Self::Amex | Self::DinersClub => &[4, 10],
            _ => DEFAULT_CARD_GAPS,
        }
    }

    /// Number of digits in the security code.
    #[inline]
    pub const fn cvv_length(&self) -> usize {
        match self {
            Self::Amex => 4,
            _ => 3,
        }
    }

    /// Returns a human-readable name for the card brand.
    #[inline]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Visa => "Visa",
            Self::Mastercard => "Mastercard",
            Self::Amex => "American Express",
            Self::Discover => "Discover",
            Self::DinersClub => "Diners Club",
            Self::Jcb => "JCB",
            Self::UnionPay => "UnionPay",
            Self::Maestro => "Maestro",
            Self::Mir => "Mir",
            Self::RuPay => "RuPay",
            Self::Verve => "Verve",
            Self::Elo => "Elo",
            Self::Troy => "Troy",
            Self::BcCard => "BC Card",
        }
    }

    /// Identifier the backend uses for this network, e.g. in surcharge tables.
    #[inline]
    pub const fn network_id(&self) -> &'static str {
        match self {
            Self::Visa => "VISA",
            Self::Mastercard => "MASTERCARD",
            Self::Amex => "AMEX",
            Self::Discover => "DISCOVER",
            Self::DinersClub => "DINERS_CLUB",
            Self::Jcb => "JCB",
            Self::UnionPay => "UNIONPAY",
            Self::Maestro => "MAESTRO",
            Self::Mir => "MIR",
            Self::RuPay => "RUPAY",
            Self::Verve => "VERVE",
            Self::Elo => "ELO",
            Self::Troy => "TROY",
            Self::BcCard => "BCCARD",
        }
    }

    /// Looks a network up by its backend identifier (case-insensitive).
    pub fn from_network_id(id: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|brand| brand.network_id().eq_ignore_ascii_case(id))
    }
}

impl fmt::Display for CardBrand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Error returned when a network identifier is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown card network '{0}'")]
pub struct UnknownNetwork(pub String);

impl FromStr for CardBrand {
    type Err = UnknownNetwork;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_network_id(s).ok_or_else(|| UnknownNetwork(s.to_string()))
    }
}
