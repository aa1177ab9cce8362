//! Caret placement after an edit has been reformatted.
//!
//! After an insertion the caret should sit right after the inserted raw
//! characters, pushed right by every separator the formatter placed in
//! front of it. After a deletion it stays where the deletion happened,
//! clamped to the new length. The result is always within
//! `0..=formatted.chars().count()`.
//!
//! # Example
//!
//! ```
//! use checkout_fields::cursor::{restore, CursorUpdate};
//!
//! let is_space = |c: char| c == ' ';
//!
//! // Typing the fifth digit of a card number: the caret jumps the new space
//! let caret = restore(CursorUpdate::Insert { raw_offset: 4, inserted: 1 }, "4242 4", is_space);
//! assert_eq!(caret, 6);
//!
//! // Deleting never leaves the caret past the end
//! let caret = restore(CursorUpdate::Delete { offset: 9 }, "4242", is_space);
//! assert_eq!(caret, 4);
//! ```

/// What happened to the raw value, with the caret position before the edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorUpdate {
    /// `inserted` raw characters went in at raw index `raw_offset`.
    Insert {
        /// Raw index where the insertion started.
        raw_offset: usize,
        /// Number of raw characters actually inserted.
        inserted: usize,
    },
    /// Text was removed; `offset` is where the caret was left.
    Delete {
        /// Caret offset in the formatted value.
        offset: usize,
    },
}

/// Computes the caret offset in `formatted` after an edit.
pub fn restore(update: CursorUpdate, formatted: &str, is_separator: fn(char) -> bool) -> usize {
    let len = formatted.chars().count();
    match update {
        CursorUpdate::Insert {
            raw_offset,
            inserted,
        } => formatted_offset(formatted, raw_offset + inserted, is_separator).min(len),
        CursorUpdate::Delete { offset } => offset.min(len),
    }
}

/// Maps a raw index to the formatted offset right after that many raw characters.
///
/// Separators at or before the position shift the offset right. Raw indices
/// past the end map to the end of the formatted value.
///
/// # Example
///
/// ```
/// use checkout_fields::cursor::formatted_offset;
///
/// let is_space = |c: char| c == ' ';
/// assert_eq!(formatted_offset("4242 4242", 4, is_space), 4);
/// assert_eq!(formatted_offset("4242 4242", 5, is_space), 6);
/// assert_eq!(formatted_offset("4242 4242", 50, is_space), 9);
/// ```
pub fn formatted_offset(formatted: &str, raw_offset: usize, is_separator: fn(char) -> bool) -> usize {
    if raw_offset == 0 {
        return 0;
    }
    let mut seen = 0;
    for (index, c) in formatted.chars().enumerate() {
        if !is_separator(c) {
            seen += 1;
            if seen == raw_offset {
                return index + 1;
            }
        }
    }
    formatted.chars().count()
}
