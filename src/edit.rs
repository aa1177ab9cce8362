//! Resolving text edits made against a formatted view.
//!
//! The host reports edits in terms of the formatted string it displays
//! (`"4242 4242"`), while the field owns the raw value (`"42424242"`).
//! [`apply`] translates an edit range on the formatted snapshot back to raw
//! indices by counting the non-separator characters in front of it, then
//! applies the insertion or deletion to the raw value.
//!
//! All offsets are counted in `char`s. Resolving never fails: edits that
//! cannot be mapped leave the raw value unchanged.
//!
//! # Example
//!
//! ```
//! use checkout_fields::edit::{apply, EditPolicy, TextEdit};
//!
//! let policy = EditPolicy::digits(19, |c| c == ' ');
//!
//! // Typing "5" at the end of "4242 4242"
//! let raw = apply("42424242", &TextEdit::insert(9, "5"), "4242 4242", &policy);
//! assert_eq!(raw, "424242425");
//!
//! // Backspacing over the generated space also removes the digit before it
//! let raw = apply("42424", &TextEdit::delete(4..5), "4242 4", &policy);
//! assert_eq!(raw, "4244");
//! ```

use std::ops::Range;

/// A single edit reported by the host against the formatted value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    /// Replaced range in the formatted value, in `char` offsets.
    pub range: Range<usize>,
    /// Replacement text. Empty for deletions.
    pub replacement: String,
}

impl TextEdit {
    /// Inserts `text` at `offset` without replacing anything.
    pub fn insert(offset: usize, text: impl Into<String>) -> Self {
        Self {
            range: offset..offset,
            replacement: text.into(),
        }
    }

    /// Deletes `range` from the formatted value.
    pub fn delete(range: Range<usize>) -> Self {
        Self {
            range,
            replacement: String::new(),
        }
    }

    /// Replaces `range` with `text`.
    pub fn replace(range: Range<usize>, text: impl Into<String>) -> Self {
        Self {
            range,
            replacement: text.into(),
        }
    }

    /// A backspace with the caret at `offset`. At offset 0 this is an empty delete.
    pub fn backspace(offset: usize) -> Self {
        Self::delete(offset.saturating_sub(1)..offset)
    }

    /// True when the edit removes text and inserts nothing.
    #[inline]
    pub fn is_deletion(&self) -> bool {
        self.replacement.is_empty()
    }
}

/// Per-field rules for which characters the raw value may hold.
#[derive(Debug, Clone, Copy)]
pub struct EditPolicy {
    /// Characters kept from inserted text.
    pub accepts: fn(char) -> bool,
    /// Raw length cap applied after insertion.
    pub max_len: Option<usize>,
    /// Characters the formatter adds that are not part of the raw value.
    pub is_separator: fn(char) -> bool,
}

fn any_char(c: char) -> bool {
    !c.is_control()
}

fn no_separator(_: char) -> bool {
    false
}

fn ascii_digit(c: char) -> bool {
    c.is_ascii_digit()
}

impl EditPolicy {
    /// Digits-only field whose formatted view uses `is_separator` characters.
    pub const fn digits(max_len: usize, is_separator: fn(char) -> bool) -> Self {
        Self {
            accepts: ascii_digit,
            max_len: Some(max_len),
            is_separator,
        }
    }

    /// Digits-only field displayed without separators.
    pub const fn plain_digits(max_len: usize) -> Self {
        Self::digits(max_len, no_separator)
    }

    /// Free-text field displayed as typed.
    pub const fn free_text(max_len: Option<usize>) -> Self {
        Self {
            accepts: any_char,
            max_len,
            is_separator: no_separator,
        }
    }
}

/// Counts the raw characters in front of `offset` in a formatted string.
///
/// Offsets past the end count every raw character in the string.
pub fn raw_index(formatted: &str, offset: usize, is_separator: fn(char) -> bool) -> usize {
    formatted
        .chars()
        .take(offset)
        .filter(|&c| !is_separator(c))
        .count()
}

/// Computes the new raw value after `edit` is applied to `formatted`.
///
/// Insertions are filtered through the policy, mapped to a raw index, and
/// appended when that index lies past the end of the raw value. A deletion
/// covering only separators also removes the raw character before it.
/// Ranges that cannot be mapped return `raw` unchanged.
pub fn apply(raw: &str, edit: &TextEdit, formatted: &str, policy: &EditPolicy) -> String {
    let Range { start, end } = edit.range;
    let formatted_len = formatted.chars().count();
    if start > end || start > formatted_len {
        return raw.to_string();
    }
    let end = end.min(formatted_len);

    let mut chars: Vec<char> = raw.chars().collect();
    let raw_start = raw_index(formatted, start, policy.is_separator).min(chars.len());
    let raw_len = formatted
        .chars()
        .skip(start)
        .take(end - start)
        .filter(|&c| !(policy.is_separator)(c))
        .count();

    if edit.is_deletion() {
        if start == end {
            return raw.to_string();
        }
        if raw_len > 0 {
            let raw_end = (raw_start + raw_len).min(chars.len());
            if raw_start >= raw_end {
                return raw.to_string();
            }
            chars.drain(raw_start..raw_end);
        } else {
            // Separator only: take the raw character in front of it with it
            if raw_start == 0 {
                return raw.to_string();
            }
            chars.remove(raw_start - 1);
        }
        return chars.into_iter().collect();
    }

    let inserted: Vec<char> = edit
        .replacement
        .chars()
        .filter(|&c| (policy.accepts)(c))
        .collect();
    if inserted.is_empty() {
        return raw.to_string();
    }

    let raw_end = (raw_start + raw_len).min(chars.len());
    chars.splice(raw_start..raw_end, inserted);
    if let Some(max_len) = policy.max_len {
        chars.truncate(max_len);
    }
    chars.into_iter().collect()
}
