//! Fuzz target for edit resolution on a card number field.
//!
//! Applies arbitrary edits and checks the raw value stays digits within
//! the limit and the caret stays inside the formatted value.

#![no_main]

use arbitrary::Arbitrary;
use checkout_fields::cursor::{restore, CursorUpdate};
use checkout_fields::edit::{apply, EditPolicy, TextEdit};
use checkout_fields::format::format_card_number;
use checkout_fields::MAX_CARD_DIGITS;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Keystroke {
    start: u8,
    end: u8,
    text: String,
}

fn space(c: char) -> bool {
    c == ' '
}

fuzz_target!(|keystrokes: Vec<Keystroke>| {
    let policy = EditPolicy::digits(MAX_CARD_DIGITS, space);
    let mut raw = String::new();
    let mut formatted = String::new();

    for keystroke in keystrokes.iter().take(64) {
        let start = usize::from(keystroke.start.min(keystroke.end));
        let end = usize::from(keystroke.start.max(keystroke.end));
        let edit = TextEdit::replace(start..end, keystroke.text.clone());

        raw = apply(&raw, &edit, &formatted, &policy);
        assert!(raw.len() <= MAX_CARD_DIGITS);
        assert!(raw.chars().all(|c| c.is_ascii_digit()));

        formatted = format_card_number(&raw);
        let caret = restore(
            CursorUpdate::Insert {
                raw_offset: start,
                inserted: keystroke.text.len(),
            },
            &formatted,
            space,
        );
        assert!(caret <= formatted.chars().count());
    }
});
