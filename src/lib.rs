//! # checkout_fields
//!
//! Card input handling and checkout configuration core. Work in progress.
//!
//! ## Features
//!
//! - Edit resolution against formatted text, with caret restoration
//! - Card number formatting by network gaps, expiry `MM/YY` drafts
//! - Per-field validation state machine with debounced background checks
//! - Configuration cache with TTL, eviction, and deduplicated fetches
//! - Per-network surcharge extraction from configuration payloads
//!
//! ## Typing Into a Field
//!
//! ```rust
//! use checkout_fields::edit::{apply, EditPolicy, TextEdit};
//! use checkout_fields::format::format_card_number;
//! use checkout_fields::cursor::{restore, CursorUpdate};
//!
//! let policy = EditPolicy::digits(19, |c| c == ' ');
//!
//! // The user types "5" after "4242 4242"
//! let raw = apply("42424242", &TextEdit::insert(9, "5"), "4242 4242", &policy);
//! let formatted = format_card_number(&raw);
//! let caret = restore(CursorUpdate::Insert { raw_offset: 8, inserted: 1 }, &formatted, |c| c == ' ');
//!
//! assert_eq!(formatted, "4242 4242 5");
//! assert_eq!(caret, 11);
//! ```
//!
//! ## Expiry Dates
//!
//! ```rust
//! use checkout_fields::edit::TextEdit;
//! use checkout_fields::expiry::ExpiryDraft;
//!
//! // Backspacing over the slash takes the month digit before it
//! let draft = ExpiryDraft::from_text("42/25").apply_edit(&TextEdit::delete(2..3));
//! assert_eq!(draft.formatted(), "4/25");
//! ```
//!
//! ## Validation
//!
//! ```rust
//! use std::sync::Arc;
//! use checkout_fields::field::{FieldMachine, RecordingHost};
//! use checkout_fields::rules::DefaultValidator;
//! use checkout_fields::FieldKind;
//!
//! let host = Arc::new(RecordingHost::default());
//! let mut cvv = FieldMachine::new(FieldKind::Cvv, host.clone(), Arc::new(DefaultValidator));
//!
//! // Empty required fields are invalid but show nothing
//! cvv.on_blur();
//! assert_eq!(cvv.state().message(), None);
//!
//! cvv.on_edit("12".to_string());
//! cvv.on_blur();
//! assert_eq!(host.error(FieldKind::Cvv).and_then(|e| e.1).as_deref(), Some("invalid-cvv"));
//! ```
//!
//! ## Surcharges
//!
//! ```rust
//! use checkout_fields::surcharge::extract_network_surcharges;
//!
//! let networks = serde_json::json!({"VISA": {"surcharge": {"amount": 100}}, "JCB": {"surcharge": 0}});
//! let table = extract_network_surcharges(&networks).unwrap();
//! assert_eq!(table.get("VISA"), Some(&100));
//! assert_eq!(table.get("JCB"), None);
//! ```
//!
//! ## Card Formatting
//!
//! | Network | Gaps | Example |
//! |---------|------|---------|
//! | Most networks | 4, 8, 12 | `4242 4242 4242 4242` |
//! | American Express | 4, 10 | `3782 822463 10005` |
//! | Diners Club | 4, 10 | `3056 930902 5904` |
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `cli` | `checkoutfield` command-line tool |
//!
//! ## Security
//!
//! - Card number, CVV, and OTP values are zeroized when replaced or dropped
//! - `Debug` output masks those values
//! - Logs carry field kinds and lengths, never values
//! - No unsafe code (`#![deny(unsafe_code)]`)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod cache;
pub mod card;
pub mod config;
pub mod cursor;
pub mod cvv;
pub mod debounce;
pub mod detect;
pub mod edit;
pub mod error;
pub mod expiry;
pub mod field;
pub mod format;
pub mod input;
pub mod luhn;
pub mod persist;
pub mod rules;
pub mod settings;
pub mod surcharge;

// Re-export main types at crate root
pub use cache::ConfigCache;
pub use card::{CardBrand, MAX_CARD_DIGITS, MIN_CARD_DIGITS};
pub use config::{Configuration, ConfigurationService, Environment, LoadOptions};
pub use edit::TextEdit;
pub use error::{CheckoutError, Result};
pub use field::{FieldHost, FieldKind, FieldMachine, ValidationState};
pub use input::{EditOutcome, TextInput};
pub use rules::{DefaultValidator, FieldValidator, RuleContext};
pub use settings::CheckoutSettings;
pub use surcharge::extract_network_surcharges;
