//! Error types for configuration loading and persistence.
//!
//! Keystroke-path operations (resolving edits, formatting, cursor mapping)
//! never fail and have no error type. Field rule failures are reported as
//! [`ValidationOutcome`](crate::rules::ValidationOutcome) values, not errors.
//! What remains are the failures of the configuration and persistence
//! layers, collected in [`CheckoutError`].

use thiserror::Error;

/// Errors produced by the configuration cache, loader, and persistence layer.
///
/// The type is `Clone` so one settled fetch can be delivered to every caller
/// that joined the same in-flight request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckoutError {
    /// The configuration payload could not be decoded.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// A field the configuration must carry is absent.
    #[error("missing required field: {0}")]
    MissingRequiredField(&'static str),

    /// The environment is neither `production` nor `sandbox`.
    #[error("invalid environment '{0}' (expected production or sandbox)")]
    InvalidEnvironment(String),

    /// The encoded value exceeds the persistence size guard.
    #[error("data too large: {size} bytes exceeds limit of {limit} bytes")]
    DataTooLarge {
        /// Encoded size in bytes.
        size: usize,
        /// Configured limit in bytes.
        limit: usize,
    },

    /// Persisted bytes exist but do not decode.
    #[error("failed to decode persisted data: {0}")]
    DecodingFailed(String),

    /// A value could not be serialised for persistence.
    #[error("failed to encode data: {0}")]
    EncodingFailed(String),

    /// Transport-level fetch failure, opaque to this crate.
    #[error("fetch failed: {0}")]
    FetchFailed(String),

    /// No persisted value exists for the key.
    #[error("no persisted value for key '{0}'")]
    NotFound(String),
}

/// Result alias used across the configuration and persistence layers.
pub type Result<T> = std::result::Result<T, CheckoutError>;
