//! Tunable settings, passed explicitly to the components that use them.
//!
//! Durations are written in milliseconds when loaded from JSON.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use checkout_fields::settings::CheckoutSettings;
//!
//! let settings = CheckoutSettings::from_json(r#"{"cache": {"ttlMs": 60000, "maxEntries": 8}}"#).unwrap();
//! assert_eq!(settings.cache.ttl, Duration::from_secs(60));
//! assert_eq!(settings.cache.max_entries, Some(8));
//! assert_eq!(settings.debounce.validation, Duration::from_millis(1500));
//! ```

use crate::error::{CheckoutError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default configuration cache TTL.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Default quiet period before network detection runs.
pub const DEFAULT_NETWORK_DETECTION_DELAY: Duration = Duration::from_millis(300);

/// Default quiet period before validation-while-typing runs.
pub const DEFAULT_VALIDATION_DELAY: Duration = Duration::from_millis(1500);

/// Default persistence size guard in bytes.
pub const DEFAULT_MAX_PERSISTED_BYTES: usize = 5_000_000;

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
pub(crate) fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(super::saturating_millis(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Configuration cache settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheSettings {
    /// Age at which an entry is treated as expired.
    #[serde(rename = "ttlMs", with = "millis")]
    pub ttl: Duration,
    /// Bound on stored entries; unbounded when `None`, nothing is stored at `Some(0)`.
    pub max_entries: Option<usize>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_CACHE_TTL,
            max_entries: None,
        }
    }
}

/// Quiet periods for the two debounce lanes of a text field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebounceSettings {
    /// Short lane: network detection.
    #[serde(rename = "networkDetectionMs", with = "millis")]
    pub network_detection: Duration,
    /// Long lane: validation while typing.
    #[serde(rename = "validationMs", with = "millis")]
    pub validation: Duration,
}

impl Default for DebounceSettings {
    fn default() -> Self {
        Self {
            network_detection: DEFAULT_NETWORK_DETECTION_DELAY,
            validation: DEFAULT_VALIDATION_DELAY,
        }
    }
}

/// Persistence settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PersistenceSettings {
    /// Largest encoded value accepted by `save`.
    pub max_bytes: usize,
}

impl Default for PersistenceSettings {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_PERSISTED_BYTES,
        }
    }
}

/// All settings for the checkout core.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckoutSettings {
    /// Configuration cache.
    pub cache: CacheSettings,
    /// Field debounce lanes.
    pub debounce: DebounceSettings,
    /// Persisted configuration copies.
    pub persistence: PersistenceSettings,
}

impl CheckoutSettings {
    /// Parses settings from JSON. Missing sections and keys take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| CheckoutError::ParseError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = CheckoutSettings::default();
        assert_eq!(settings.cache.ttl, Duration::from_secs(300));
        assert_eq!(settings.cache.max_entries, None);
        assert_eq!(settings.debounce.network_detection, Duration::from_millis(300));
        assert_eq!(settings.debounce.validation, Duration::from_millis(1500));
        assert_eq!(settings.persistence.max_bytes, 5_000_000);
    }

    #[test]
    fn test_empty_json_is_default() {
        assert_eq!(
            CheckoutSettings::from_json("{}").unwrap(),
            CheckoutSettings::default()
        );
    }

    #[test]
    fn test_partial_json() {
        let settings =
            CheckoutSettings::from_json(r#"{"debounce": {"validationMs": 800}}"#).unwrap();
        assert_eq!(settings.debounce.validation, Duration::from_millis(800));
        assert_eq!(settings.debounce.network_detection, Duration::from_millis(300));
    }

    #[test]
    fn test_serialises_durations_as_millis() {
        let json = serde_json::to_value(CacheSettings::default()).unwrap();
        assert_eq!(json["ttlMs"], 300_000);
    }

    #[test]
    fn test_bad_json_is_parse_error() {
        let err = CheckoutSettings::from_json("{").unwrap_err();
        assert!(matches!(err, CheckoutError::ParseError(_)));
    }
}
