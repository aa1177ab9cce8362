//! Per-field validation state machine and the host capability it reports to.
//!
//! A [`FieldMachine`] owns one field's raw value and [`ValidationState`].
//! It moves through `Empty -> Typing -> ValidatingDebounced -> Validated`:
//!
//! - every edit recomputes a cheap local heuristic that never carries a
//!   user-visible message, so errors do not flicker while typing;
//! - blur, or reaching the field's complete length, runs the injected
//!   [`FieldValidator`] and reports the result through the [`FieldHost`];
//! - focus clears any displayed error without asserting the field invalid.
//!
//! An empty field never carries a message: required-empty is `Invalid`
//! without one, optional-empty is `Valid`.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use checkout_fields::field::{FieldKind, FieldMachine, RecordingHost, ValidationState};
//! use checkout_fields::rules::DefaultValidator;
//!
//! let host = Arc::new(RecordingHost::default());
//! let mut field = FieldMachine::new(FieldKind::CardholderName, host.clone(), Arc::new(DefaultValidator));
//!
//! field.on_edit("J".to_string());
//! assert_eq!(field.state(), &ValidationState::Invalid { message: None, code: None });
//!
//! field.on_edit("J4ne".to_string());
//! field.on_blur();
//! assert_eq!(host.error(FieldKind::CardholderName).map(|e| e.0), Some("Cardholder name is invalid".to_string()));
//! ```

use crate::rules::{FieldValidator, RuleContext, ValidationOutcome};
use crate::CardBrand;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, trace};
use zeroize::Zeroize;

/// Every input field the checkout core drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Primary account number.
    CardNumber,
    /// Security code.
    Cvv,
    /// Expiry date, `MM/YY`.
    ExpiryDate,
    /// Name printed on the card.
    CardholderName,
    /// Billing first name.
    FirstName,
    /// Billing last name.
    LastName,
    /// Billing street address.
    AddressLine1,
    /// Second address line, optional.
    AddressLine2,
    /// Billing city.
    City,
    /// Billing state or region.
    State,
    /// Billing postal code.
    PostalCode,
    /// Billing country, ISO code.
    CountryCode,
    /// Contact email.
    Email,
    /// Contact phone number.
    PhoneNumber,
    /// One-time passcode.
    Otp,
}

impl FieldKind {
    /// Stable identifier, also used as the error-code suffix.
    pub const fn id(&self) -> &'static str {
        match self {
            Self::CardNumber => "card-number",
            Self::Cvv => "cvv",
            Self::ExpiryDate => "expiry-date",
            Self::CardholderName => "cardholder-name",
            Self::FirstName => "first-name",
            Self::LastName => "last-name",
            Self::AddressLine1 => "address-line-1",
            Self::AddressLine2 => "address-line-2",
            Self::City => "city",
            Self::State => "state",
            Self::PostalCode => "postal-code",
            Self::CountryCode => "country-code",
            Self::Email => "email",
            Self::PhoneNumber => "phone-number",
            Self::Otp => "otp-code",
        }
    }

    /// Machine-readable code reported with a failed validation.
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::CardNumber => "invalid-card-number",
            Self::Cvv => "invalid-cvv",
            Self::ExpiryDate => "invalid-expiry-date",
            Self::CardholderName => "invalid-cardholder-name",
            Self::FirstName => "invalid-first-name",
            Self::LastName => "invalid-last-name",
            Self::AddressLine1 => "invalid-address-line-1",
            Self::AddressLine2 => "invalid-address-line-2",
            Self::City => "invalid-city",
            Self::State => "invalid-state",
            Self::PostalCode => "invalid-postal-code",
            Self::CountryCode => "invalid-country-code",
            Self::Email => "invalid-email",
            Self::PhoneNumber => "invalid-phone-number",
            Self::Otp => "invalid-otp-code",
        }
    }

    /// Human-readable label used in default messages.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::CardNumber => "Card number",
            Self::Cvv => "CVV",
            Self::ExpiryDate => "Expiry date",
            Self::CardholderName => "Cardholder name",
            Self::FirstName => "First name",
            Self::LastName => "Last name",
            Self::AddressLine1 => "Address",
            Self::AddressLine2 => "Address line 2",
            Self::City => "City",
            Self::State => "State",
            Self::PostalCode => "Postal code",
            Self::CountryCode => "Country",
            Self::Email => "Email",
            Self::PhoneNumber => "Phone number",
            Self::Otp => "Code",
        }
    }

    /// Whether the field is required unless configured otherwise.
    #[inline]
    pub const fn is_required_by_default(&self) -> bool {
        !matches!(self, Self::AddressLine2)
    }

    /// Values that must be zeroized and never logged.
    #[inline]
    pub const fn is_sensitive(&self) -> bool {
        matches!(self, Self::CardNumber | Self::Cvv | Self::Otp)
    }

    /// Length below which the typing heuristic reports invalid.
    ///
    /// OTP fields use the expected length from their rule context instead.
    pub const fn min_typing_len(&self) -> usize {
        match self {
            Self::CardNumber => crate::card::MIN_CARD_DIGITS,
            Self::Cvv => 3,
            Self::ExpiryDate => crate::expiry::MAX_EXPIRY_DIGITS,
            Self::AddressLine1 | Self::PostalCode => 3,
            Self::AddressLine2 => 0,
            Self::PhoneNumber => 7,
            Self::Email => 3,
            Self::Otp => crate::rules::DEFAULT_OTP_LENGTH,
            _ => 2,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// Validity of a field as last computed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ValidationState {
    /// Not decided yet.
    #[default]
    Unknown,
    /// Passed.
    Valid,
    /// Failed. Typing heuristics and empty fields leave both parts `None`.
    Invalid {
        /// Message to show.
        message: Option<String>,
        /// Machine-readable code.
        code: Option<String>,
    },
}

impl ValidationState {
    /// Invalid without anything to show.
    pub const fn silent_invalid() -> Self {
        Self::Invalid {
            message: None,
            code: None,
        }
    }

    /// True only for [`ValidationState::Valid`].
    #[inline]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// The displayed message, if any.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Invalid { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    /// The error code, if any.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Invalid { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    fn from_outcome(outcome: ValidationOutcome) -> Self {
        if outcome.is_valid {
            Self::Valid
        } else {
            Self::Invalid {
                message: outcome.message,
                code: outcome.code,
            }
        }
    }
}

/// Where a field is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldPhase {
    /// No value.
    #[default]
    Empty,
    /// Value changed since the last authoritative check.
    Typing,
    /// A debounced background validation is scheduled.
    ValidatingDebounced,
    /// Validated, valid or not.
    Validated,
}

/// What the field reports back to the surrounding checkout shell.
///
/// Shells backed by shared state implement this directly; shells that wire
/// discrete callbacks use [`ClosureHost`].
pub trait FieldHost: Send + Sync {
    /// The raw value changed.
    fn update_value(&self, kind: FieldKind, raw: &str);

    /// Show `message` for the field and track it under `code`.
    fn set_error(&self, kind: FieldKind, message: &str, code: Option<&str>);

    /// Drop the field's displayed and tracked error.
    fn clear_error(&self, kind: FieldKind);

    /// The field's validity changed.
    fn set_validity(&self, kind: FieldKind, is_valid: bool);

    /// The detected card network changed.
    fn update_network(&self, _network: Option<CardBrand>) {}
}

type ValueFn = Box<dyn Fn(FieldKind, &str) + Send + Sync>;
type ErrorFn = Box<dyn Fn(FieldKind, &str, Option<&str>) + Send + Sync>;
type ClearFn = Box<dyn Fn(FieldKind) + Send + Sync>;
type ValidityFn = Box<dyn Fn(FieldKind, bool) + Send + Sync>;
type NetworkFn = Box<dyn Fn(Option<CardBrand>) + Send + Sync>;

/// A [`FieldHost`] assembled from optional callbacks.
///
/// Callbacks left unset are ignored.
#[derive(Default)]
pub struct ClosureHost {
    on_value: Option<ValueFn>,
    on_error: Option<ErrorFn>,
    on_clear: Option<ClearFn>,
    on_validity: Option<ValidityFn>,
    on_network: Option<NetworkFn>,
}

impl ClosureHost {
    /// A host with no callbacks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Called on every raw value change.
    pub fn on_value(mut self, f: impl Fn(FieldKind, &str) + Send + Sync + 'static) -> Self {
        self.on_value = Some(Box::new(f));
        self
    }

    /// Called when a validation error should be shown.
    pub fn on_error(
        mut self,
        f: impl Fn(FieldKind, &str, Option<&str>) + Send + Sync + 'static,
    ) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    /// Called when the field's error should be cleared.
    pub fn on_clear(mut self, f: impl Fn(FieldKind) + Send + Sync + 'static) -> Self {
        self.on_clear = Some(Box::new(f));
        self
    }

    /// Called when validity changes.
    pub fn on_validity(mut self, f: impl Fn(FieldKind, bool) + Send + Sync + 'static) -> Self {
        self.on_validity = Some(Box::new(f));
        self
    }

    /// Called when the detected network changes.
    pub fn on_network(mut self, f: impl Fn(Option<CardBrand>) + Send + Sync + 'static) -> Self {
        self.on_network = Some(Box::new(f));
        self
    }
}

impl fmt::Debug for ClosureHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClosureHost")
            .field("on_value", &self.on_value.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_clear", &self.on_clear.is_some())
            .field("on_validity", &self.on_validity.is_some())
            .field("on_network", &self.on_network.is_some())
            .finish()
    }
}

impl FieldHost for ClosureHost {
    fn update_value(&self, kind: FieldKind, raw: &str) {
        if let Some(f) = &self.on_value {
            f(kind, raw);
        }
    }

    fn set_error(&self, kind: FieldKind, message: &str, code: Option<&str>) {
        if let Some(f) = &self.on_error {
            f(kind, message, code);
        }
    }

    fn clear_error(&self, kind: FieldKind) {
        if let Some(f) = &self.on_clear {
            f(kind);
        }
    }

    fn set_validity(&self, kind: FieldKind, is_valid: bool) {
        if let Some(f) = &self.on_validity {
            f(kind, is_valid);
        }
    }

    fn update_network(&self, network: Option<CardBrand>) {
        if let Some(f) = &self.on_network {
            f(network);
        }
    }
}

#[derive(Debug, Default)]
struct HostState {
    values: HashMap<FieldKind, String>,
    errors: HashMap<FieldKind, (String, Option<String>)>,
    validity: HashMap<FieldKind, bool>,
    network: Option<CardBrand>,
    network_updates: usize,
}

/// A [`FieldHost`] that keeps the latest reported state per field.
///
/// Serves simple shells that read state back when rendering, and tests.
#[derive(Debug, Default)]
pub struct RecordingHost {
    state: Mutex<HostState>,
}

impl RecordingHost {
    fn with_state<R>(&self, f: impl FnOnce(&mut HostState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    /// Last reported raw value.
    pub fn value(&self, kind: FieldKind) -> Option<String> {
        self.with_state(|s| s.values.get(&kind).cloned())
    }

    /// Current error message and code.
    pub fn error(&self, kind: FieldKind) -> Option<(String, Option<String>)> {
        self.with_state(|s| s.errors.get(&kind).cloned())
    }

    /// Last reported validity.
    pub fn validity(&self, kind: FieldKind) -> Option<bool> {
        self.with_state(|s| s.validity.get(&kind).copied())
    }

    /// Last reported card network.
    pub fn network(&self) -> Option<CardBrand> {
        self.with_state(|s| s.network)
    }

    /// How many times the network was reported.
    pub fn network_updates(&self) -> usize {
        self.with_state(|s| s.network_updates)
    }
}

impl FieldHost for RecordingHost {
    fn update_value(&self, kind: FieldKind, raw: &str) {
        self.with_state(|s| {
            s.values.insert(kind, raw.to_string());
        });
    }

    fn set_error(&self, kind: FieldKind, message: &str, code: Option<&str>) {
        self.with_state(|s| {
            s.errors
                .insert(kind, (message.to_string(), code.map(str::to_string)));
        });
    }

    fn clear_error(&self, kind: FieldKind) {
        self.with_state(|s| {
            s.errors.remove(&kind);
        });
    }

    fn set_validity(&self, kind: FieldKind, is_valid: bool) {
        self.with_state(|s| {
            s.validity.insert(kind, is_valid);
        });
    }

    fn update_network(&self, network: Option<CardBrand>) {
        self.with_state(|s| {
            s.network = network;
            s.network_updates += 1;
        });
    }
}

/// Validation state machine for a single field.
///
/// Single writer: the host delivers one event at a time.
pub struct FieldMachine {
    kind: FieldKind,
    value: String,
    state: ValidationState,
    phase: FieldPhase,
    context: RuleContext,
    host: Arc<dyn FieldHost>,
    validator: Arc<dyn FieldValidator>,
}

impl FieldMachine {
    /// Creates a machine for `kind` reporting to `host`.
    pub fn new(kind: FieldKind, host: Arc<dyn FieldHost>, validator: Arc<dyn FieldValidator>) -> Self {
        Self::with_context(RuleContext::new(kind), host, validator)
    }

    /// Creates a machine with an explicit rule context.
    pub fn with_context(
        context: RuleContext,
        host: Arc<dyn FieldHost>,
        validator: Arc<dyn FieldValidator>,
    ) -> Self {
        Self {
            kind: context.kind,
            value: String::new(),
            state: ValidationState::Unknown,
            phase: FieldPhase::Empty,
            context,
            host,
            validator,
        }
    }

    /// The field kind.
    #[inline]
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Current raw value.
    #[inline]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Current validation state.
    #[inline]
    pub fn state(&self) -> &ValidationState {
        &self.state
    }

    /// Current lifecycle phase.
    #[inline]
    pub fn phase(&self) -> FieldPhase {
        self.phase
    }

    /// Rule context passed to the validator.
    #[inline]
    pub fn context(&self) -> &RuleContext {
        &self.context
    }

    /// Updates the network used by network-dependent rules.
    pub fn set_network(&mut self, network: Option<CardBrand>) {
        self.context.network = network;
    }

    /// Focus gained: clear the displayed error, keep validity as is.
    pub fn on_focus(&mut self) {
        trace!(field = %self.kind, "focus gained");
        if let ValidationState::Invalid { message, .. } = &mut self.state {
            *message = None;
        }
        self.host.clear_error(self.kind);
    }

    /// Stores a new raw value and recomputes the typing heuristic.
    pub fn on_edit(&mut self, raw: String) -> &ValidationState {
        let mut previous = std::mem::replace(&mut self.value, raw);
        if self.kind.is_sensitive() {
            previous.zeroize();
        }
        self.host.update_value(self.kind, &self.value);

        let state = if self.value.trim().is_empty() {
            self.phase = FieldPhase::Empty;
            self.host.clear_error(self.kind);
            self.empty_state()
        } else {
            self.phase = FieldPhase::Typing;
            if self.value.chars().count() < self.min_typing_len() {
                ValidationState::silent_invalid()
            } else {
                ValidationState::Unknown
            }
        };
        self.set_state(state);
        &self.state
    }

    /// Marks a background validation as scheduled.
    pub fn mark_pending(&mut self) {
        if !self.value.is_empty() {
            self.phase = FieldPhase::ValidatingDebounced;
        }
    }

    /// Background validation while the user is still typing.
    ///
    /// Updates validity but never shows a message.
    pub fn validate_silently(&mut self) -> &ValidationState {
        if self.value.trim().is_empty() {
            let state = self.empty_state();
            self.set_state(state);
            return &self.state;
        }
        let outcome = self.validator.validate(&self.value, &self.context);
        let state = if outcome.is_valid {
            ValidationState::Valid
        } else {
            ValidationState::silent_invalid()
        };
        self.phase = FieldPhase::Validated;
        self.set_state(state);
        &self.state
    }

    /// Authoritative validation; reports errors to the host.
    pub fn validate(&mut self) -> &ValidationState {
        if self.value.trim().is_empty() {
            self.phase = FieldPhase::Empty;
            self.host.clear_error(self.kind);
            let state = self.empty_state();
            self.set_state(state);
            return &self.state;
        }

        let state = ValidationState::from_outcome(self.validator.validate(&self.value, &self.context));
        match &state {
            ValidationState::Invalid {
                message: Some(message),
                code,
            } => self.host.set_error(self.kind, message, code.as_deref()),
            _ => self.host.clear_error(self.kind),
        }
        self.phase = FieldPhase::Validated;
        self.set_state(state);
        &self.state
    }

    /// Focus lost: run authoritative validation.
    pub fn on_blur(&mut self) -> &ValidationState {
        trace!(field = %self.kind, "focus lost");
        self.validate()
    }

    fn min_typing_len(&self) -> usize {
        match self.kind {
            FieldKind::Otp => self.context.otp_length,
            FieldKind::Cvv => crate::cvv::expected_cvv_length(self.context.network),
            kind => kind.min_typing_len(),
        }
    }

    fn empty_state(&self) -> ValidationState {
        if self.context.required {
            ValidationState::silent_invalid()
        } else {
            ValidationState::Valid
        }
    }

    fn set_state(&mut self, state: ValidationState) {
        if state != self.state {
            debug!(
                field = %self.kind,
                len = self.value.chars().count(),
                valid = state.is_valid(),
                code = state.code(),
                "validation state changed"
            );
        }
        self.host.set_validity(self.kind, state.is_valid());
        self.state = state;
    }
}

impl fmt::Debug for FieldMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value: &dyn fmt::Debug = if self.kind.is_sensitive() {
            &"***"
        } else {
            &self.value
        };
        f.debug_struct("FieldMachine")
            .field("kind", &self.kind)
            .field("value", value)
            .field("state", &self.state)
            .field("phase", &self.phase)
            .finish()
    }
}

impl Drop for FieldMachine {
    fn drop(&mut self) {
        if self.kind.is_sensitive() {
            self.value.zeroize();
        }
    }
}
