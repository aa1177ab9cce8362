//! Fuzz target for expiry drafts and parsing.
//!
//! Tests that expiry handling never panics on arbitrary input.

#![no_main]

use checkout_fields::edit::TextEdit;
use checkout_fields::expiry::{self, ExpiryDraft};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|input: (&str, u8, u8, &str)| {
    let (text, start, end, replacement) = input;

    // These should never panic
    let _ = expiry::parse_expiry(text);
    let _ = expiry::validate_expiry_at(text, (2026, 10), 20);

    let formatted = expiry::format_expiry(text);
    assert_eq!(expiry::format_expiry(&formatted), formatted);

    let draft = ExpiryDraft::from_text(text);
    let range = usize::from(start.min(end))..usize::from(start.max(end));
    let edited = draft.apply_edit(&TextEdit::replace(range, replacement));
    assert!(edited.digits().len() <= expiry::MAX_EXPIRY_DIGITS);
});
