//! Keystroke pipeline for a single text field.
//!
//! [`TextInput`] is what a host view talks to. For every edit it:
//!
//! 1. resolves the edit against the displayed value into a new raw value,
//! 2. re-formats the raw value for display,
//! 3. restores the caret,
//! 4. feeds the raw value to the field's [`FieldMachine`],
//! 5. schedules the debounced network-detection and validation lanes.
//!
//! The host renders [`EditOutcome::formatted`] and places the caret at
//! [`EditOutcome::cursor`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use checkout_fields::edit::TextEdit;
//! use checkout_fields::field::{FieldKind, RecordingHost};
//! use checkout_fields::input::TextInput;
//! use checkout_fields::rules::{DefaultValidator, RuleContext};
//! use checkout_fields::settings::DebounceSettings;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let host = Arc::new(RecordingHost::default());
//! let mut input = TextInput::new(
//!     RuleContext::new(FieldKind::CardNumber),
//!     host.clone(),
//!     Arc::new(DefaultValidator),
//!     DebounceSettings::default(),
//!     tokio::runtime::Handle::current(),
//! );
//!
//! let outcome = input.handle_edit(&TextEdit::insert(0, "42424"));
//! assert_eq!(outcome.formatted, "4242 4");
//! assert_eq!(outcome.cursor, 6);
//! # }
//! ```

use crate::card::MAX_CARD_DIGITS;
use crate::cursor::{self, CursorUpdate};
use crate::debounce::Debouncer;
use crate::detect::detect_brand;
use crate::edit::{self, EditPolicy, TextEdit};
use crate::expiry::{ExpiryDraft, EXPIRY_POLICY};
use crate::field::{FieldHost, FieldKind, FieldMachine, FieldPhase, ValidationState};
use crate::format::{format_for_brand, CARD_SEPARATOR};
use crate::rules::{FieldValidator, RuleContext};
use crate::settings::DebounceSettings;
use crate::CardBrand;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tracing::trace;
use zeroize::Zeroize;

/// Card digits at which background validation starts.
pub const BACKGROUND_VALIDATION_MIN_DIGITS: usize = 13;

/// Card digits from which background validation runs without a matching network length.
pub const FULL_LENGTH_RECHECK_DIGITS: usize = 16;

/// The two debounce lanes of a text field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lane {
    /// Reports the detected card network.
    NetworkDetection,
    /// Validates silently while the user types.
    Validation,
}

/// What the host should render after an edit.
#[derive(Clone, PartialEq, Eq)]
pub struct EditOutcome {
    /// New raw value.
    pub raw: String,
    /// New display value.
    pub formatted: String,
    /// Caret offset in `formatted`, in `char`s.
    pub cursor: usize,
    /// False when the edit was rejected and nothing changed.
    pub changed: bool,
}

impl fmt::Debug for EditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditOutcome")
            .field("len", &self.raw.chars().count())
            .field("cursor", &self.cursor)
            .field("changed", &self.changed)
            .finish()
    }
}

fn is_card_separator(c: char) -> bool {
    c == CARD_SEPARATOR
}

/// Edit policy for a field kind.
pub fn edit_policy(context: &RuleContext) -> EditPolicy {
    match context.kind {
        FieldKind::CardNumber => EditPolicy::digits(MAX_CARD_DIGITS, is_card_separator),
        FieldKind::Cvv => EditPolicy::plain_digits(crate::cvv::MAX_CVV_DIGITS),
        FieldKind::ExpiryDate => EXPIRY_POLICY,
        FieldKind::Otp => EditPolicy::plain_digits(context.otp_length),
        FieldKind::CountryCode => EditPolicy::free_text(Some(3)),
        FieldKind::PostalCode => EditPolicy::free_text(Some(10)),
        FieldKind::PhoneNumber => EditPolicy::free_text(Some(20)),
        FieldKind::Email => EditPolicy::free_text(Some(254)),
        _ => EditPolicy::free_text(Some(100)),
    }
}

fn lock(machine: &Mutex<FieldMachine>) -> MutexGuard<'_, FieldMachine> {
    machine.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One text field: edit resolution, formatting, caret, validation, debouncing.
pub struct TextInput {
    kind: FieldKind,
    policy: EditPolicy,
    machine: Arc<Mutex<FieldMachine>>,
    host: Arc<dyn FieldHost>,
    debouncer: Debouncer<Lane>,
    settings: DebounceSettings,
    formatted: String,
    expiry: ExpiryDraft,
    network: Option<CardBrand>,
    reported_network: Option<CardBrand>,
}

impl TextInput {
    /// Creates an input for `context.kind`.
    ///
    /// Debounced lanes are spawned on `handle`.
    pub fn new(
        context: RuleContext,
        host: Arc<dyn FieldHost>,
        validator: Arc<dyn FieldValidator>,
        settings: DebounceSettings,
        handle: Handle,
    ) -> Self {
        let kind = context.kind;
        let policy = edit_policy(&context);
        let network = context.network;
        let machine = FieldMachine::with_context(context, Arc::clone(&host), validator);
        Self {
            kind,
            policy,
            machine: Arc::new(Mutex::new(machine)),
            host,
            debouncer: Debouncer::new(handle),
            settings,
            formatted: String::new(),
            expiry: ExpiryDraft::default(),
            network,
            reported_network: network,
        }
    }

    /// The field kind.
    #[inline]
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Current display value.
    #[inline]
    pub fn formatted(&self) -> &str {
        &self.formatted
    }

    /// Current raw value.
    pub fn raw(&self) -> String {
        lock(&self.machine).value().to_string()
    }

    /// Current validation state.
    pub fn state(&self) -> ValidationState {
        lock(&self.machine).state().clone()
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> FieldPhase {
        lock(&self.machine).phase()
    }

    /// Network detected from the card number, or set by the host.
    #[inline]
    pub fn network(&self) -> Option<CardBrand> {
        self.network
    }

    /// True if a debounced action is pending on `lane`.
    pub fn is_pending(&self, lane: Lane) -> bool {
        self.debouncer.is_pending(&lane)
    }

    /// Sets the network for fields that depend on it, such as the CVV.
    pub fn set_network(&mut self, network: Option<CardBrand>) {
        self.network = network;
        lock(&self.machine).set_network(network);
    }

    /// Replaces the whole value, as a paste over everything would.
    pub fn set_text(&mut self, text: &str) -> EditOutcome {
        let len = self.formatted.chars().count();
        if text.is_empty() {
            return self.handle_edit(&TextEdit::delete(0..len));
        }
        self.handle_edit(&TextEdit::replace(0..len, text))
    }

    /// Focus gained.
    pub fn on_focus(&mut self) {
        lock(&self.machine).on_focus();
    }

    /// Focus lost: cancel pending background validation and validate now.
    pub fn on_blur(&mut self) -> ValidationState {
        self.debouncer.cancel(&Lane::Validation);
        lock(&self.machine).on_blur().clone()
    }

    /// Applies an edit made against [`formatted`](Self::formatted).
    pub fn handle_edit(&mut self, edit: &TextEdit) -> EditOutcome {
        let is_separator = self.policy.is_separator;
        let old_formatted = std::mem::take(&mut self.formatted);
        let mut machine = lock(&self.machine);
        let old_len = machine.value().chars().count();

        let (raw, draft) = match self.kind {
            FieldKind::ExpiryDate => {
                let draft = self.expiry.apply_edit(edit);
                (draft.digits(), Some(draft))
            }
            _ => (
                edit::apply(machine.value(), edit, &old_formatted, &self.policy),
                None,
            ),
        };

        let unchanged = match &draft {
            Some(draft) => *draft == self.expiry,
            None => raw == machine.value(),
        };
        if unchanged {
            trace!(field = %self.kind, "edit rejected");
            let cursor = edit.range.start.min(old_formatted.chars().count());
            let outcome = EditOutcome {
                raw,
                formatted: old_formatted.clone(),
                cursor,
                changed: false,
            };
            self.formatted = old_formatted;
            return outcome;
        }

        let range_start = edit.range.start.min(old_formatted.chars().count());
        let raw_start = edit::raw_index(&old_formatted, range_start, is_separator);
        let selected = old_formatted
            .chars()
            .skip(range_start)
            .take(edit.range.end.saturating_sub(range_start))
            .filter(|&c| !is_separator(c))
            .count();
        let new_len = raw.chars().count();

        if let Some(draft) = draft {
            self.expiry = draft;
        }
        if self.kind == FieldKind::CardNumber {
            let detected = detect_brand(&raw);
            if detected != self.network {
                self.network = detected;
                machine.set_network(detected);
            }
        }

        let formatted = match self.kind {
            FieldKind::CardNumber => format_for_brand(&raw, self.network),
            FieldKind::ExpiryDate => self.expiry.formatted(),
            _ => raw.clone(),
        };

        let update = if edit.is_deletion() {
            let removed_at = if selected == 0 {
                raw_start.saturating_sub(1)
            } else {
                raw_start
            };
            CursorUpdate::Delete {
                offset: cursor::formatted_offset(&formatted, removed_at, is_separator),
            }
        } else {
            CursorUpdate::Insert {
                raw_offset: raw_start,
                inserted: (new_len + selected).saturating_sub(old_len),
            }
        };
        let cursor = cursor::restore(update, &formatted, is_separator);

        machine.on_edit(raw.clone());
        drop(machine);

        let mut stale = old_formatted;
        if self.kind.is_sensitive() {
            stale.zeroize();
        }
        self.formatted = formatted.clone();
        self.schedule_lanes(new_len);

        EditOutcome {
            raw,
            formatted,
            cursor,
            changed: true,
        }
    }

    fn schedule_lanes(&mut self, len: usize) {
        if self.kind == FieldKind::CardNumber && self.network != self.reported_network {
            self.reported_network = self.network;
            let host = Arc::clone(&self.host);
            let network = self.network;
            self.debouncer.schedule(
                Lane::NetworkDetection,
                self.settings.network_detection,
                move || host.update_network(network),
            );
        }

        if len == 0 {
            self.debouncer.cancel(&Lane::Validation);
            return;
        }

        let mut machine = lock(&self.machine);
        match self.kind {
            FieldKind::CardNumber => {
                if len < BACKGROUND_VALIDATION_MIN_DIGITS {
                    self.debouncer.cancel(&Lane::Validation);
                    return;
                }
                machine.mark_pending();
                let shared = Arc::clone(&self.machine);
                self.debouncer
                    .schedule(Lane::Validation, self.settings.validation, move || {
                        let mut machine = lock(&shared);
                        let len = machine.value().len();
                        let matches_network = machine
                            .context()
                            .network
                            .is_some_and(|n| n.is_valid_length(len));
                        if matches_network || len >= FULL_LENGTH_RECHECK_DIGITS {
                            machine.validate_silently();
                        }
                    });
            }
            FieldKind::Cvv | FieldKind::ExpiryDate | FieldKind::Otp => {
                self.debouncer.cancel(&Lane::Validation);
                if Self::is_complete(self.kind, &machine, &self.expiry, len) {
                    machine.validate();
                }
            }
            _ => {
                machine.mark_pending();
                let shared = Arc::clone(&self.machine);
                self.debouncer
                    .schedule(Lane::Validation, self.settings.validation, move || {
                        lock(&shared).validate_silently();
                    });
            }
        }
    }

    fn is_complete(kind: FieldKind, machine: &FieldMachine, expiry: &ExpiryDraft, len: usize) -> bool {
        match kind {
            FieldKind::Cvv => len == crate::cvv::expected_cvv_length(machine.context().network),
            FieldKind::ExpiryDate => expiry.is_complete(),
            FieldKind::Otp => len == machine.context().otp_length,
            _ => false,
        }
    }
}

impl fmt::Debug for TextInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextInput")
            .field("kind", &self.kind)
            .field("network", &self.network)
            .field("machine", &*lock(&self.machine))
            .field("debouncer", &self.debouncer)
            .finish()
    }
}

impl Drop for TextInput {
    fn drop(&mut self) {
        self.debouncer.cancel_all();
        if self.kind.is_sensitive() {
            self.formatted.zeroize();
        }
    }
}
