//! Luhn checksum used by the card-number rule.

/// Doubled digit with 9 subtracted when the result exceeds 9, indexed by digit.
const DOUBLE_TABLE: [u8; 10] = [0, 2, 4, 6, 8, 1, 3, 5, 7, 9];

/// Validates a slice of digit values (0-9) with the Luhn algorithm.
///
/// # Example
///
/// ```
/// use checkout_fields::luhn::validate;
///
/// assert!(validate(&[4, 2, 4, 2, 4, 2, 4, 2, 4, 2, 4, 2, 4, 2, 4, 2]));
/// assert!(!validate(&[4, 2, 4, 2, 4, 2, 4, 2, 4, 2, 4, 2, 4, 2, 4, 1]));
/// ```
#[inline]
pub fn validate(digits: &[u8]) -> bool {
    if digits.is_empty() {
        return false;
    }
    checksum(digits) % 10 == 0
}

/// Checks a raw digit string. Any non-digit character fails the check.
///
/// # Example
///
/// ```
/// use checkout_fields::luhn::passes;
///
/// assert!(passes("4242424242424242"));
/// assert!(!passes("4242 4242 4242 4242"));
/// ```
pub fn passes(raw: &str) -> bool {
    let mut digits = Vec::with_capacity(raw.len());
    for byte in raw.bytes() {
        if !byte.is_ascii_digit() {
            return false;
        }
        digits.push(byte - b'0');
    }
    validate(&digits)
}

/// Luhn sum (not reduced modulo 10), walking from the check digit leftwards.
#[inline]
fn checksum(digits: &[u8]) -> u32 {
    digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &digit)| {
            if i % 2 == 1 {
                DOUBLE_TABLE[digit as usize] as u32
            } else {
                digit as u32
            }
        })
        .sum()
}
