//! Size-guarded JSON persistence over a key-value store.
//!
//! Values are stored as JSON with an optional absolute expiry. Loading a
//! value that no longer decodes is an error, never a silent miss, so a
//! corrupted copy is noticed.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use checkout_fields::persist::{MemoryStorage, PersistenceManager};
//! use checkout_fields::settings::PersistenceSettings;
//!
//! let persistence = PersistenceManager::new(Arc::new(MemoryStorage::default()), PersistenceSettings::default());
//! persistence.save("theme", &"dark", None).unwrap();
//! assert_eq!(persistence.load::<String>("theme").unwrap().as_deref(), Some("dark"));
//! ```

use crate::cache::{Clock, UnixClock};
use crate::error::{CheckoutError, Result};
use crate::settings::{saturating_millis, PersistenceSettings};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};

/// Byte storage the persistence manager writes through.
pub trait KeyValueStorage: Send + Sync {
    /// Bytes stored under `key`.
    fn get(&self, key: &str) -> Option<Vec<u8>>;
    /// Stores `bytes` under `key`, replacing any previous value.
    fn set(&self, key: &str, bytes: Vec<u8>);
    /// Removes `key`. Returns whether it was present.
    fn remove(&self, key: &str) -> bool;
    /// Every stored key.
    fn keys(&self) -> Vec<String>;
}

/// In-process storage.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    fn values(&self) -> MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.values().get(key).cloned()
    }

    fn set(&self, key: &str, bytes: Vec<u8>) {
        self.values().insert(key.to_string(), bytes);
    }

    fn remove(&self, key: &str) -> bool {
        self.values().remove(key).is_some()
    }

    fn keys(&self) -> Vec<String> {
        self.values().keys().cloned().collect()
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Stored<T> {
    value: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at_ms: Option<u64>,
}

/// Saves and loads JSON values through a [`KeyValueStorage`].
pub struct PersistenceManager {
    storage: Arc<dyn KeyValueStorage>,
    settings: PersistenceSettings,
    clock: Arc<dyn Clock>,
}

impl PersistenceManager {
    /// Creates a manager on the wall clock.
    pub fn new(storage: Arc<dyn KeyValueStorage>, settings: PersistenceSettings) -> Self {
        Self::with_clock(storage, settings, Arc::new(UnixClock))
    }

    /// Creates a manager that reads expiry against `clock`.
    pub fn with_clock(
        storage: Arc<dyn KeyValueStorage>,
        settings: PersistenceSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            storage,
            settings,
            clock,
        }
    }

    fn now_ms(&self) -> u64 {
        saturating_millis(self.clock.now())
    }

    /// Stores `value` under `key`, expiring after `ttl` when given.
    ///
    /// Fails with [`CheckoutError::DataTooLarge`] when the encoded value is
    /// larger than the configured limit; nothing is written in that case.
    pub fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Option<Duration>) -> Result<()> {
        let stored = Stored {
            value,
            expires_at_ms: ttl.map(|ttl| self.now_ms().saturating_add(saturating_millis(ttl))),
        };
        let bytes =
            serde_json::to_vec(&stored).map_err(|e| CheckoutError::EncodingFailed(e.to_string()))?;

        let limit = self.settings.max_bytes;
        if bytes.len() > limit {
            warn!(key, size = bytes.len(), limit, "refusing to persist oversized value");
            return Err(CheckoutError::DataTooLarge {
                size: bytes.len(),
                limit,
            });
        }

        debug!(key, size = bytes.len(), "persisted value");
        self.storage.set(key, bytes);
        Ok(())
    }

    /// Loads the value under `key`.
    ///
    /// Missing and expired values are `Ok(None)`; expired ones are removed.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(bytes) = self.storage.get(key) else {
            return Ok(None);
        };
        let stored: Stored<T> = serde_json::from_slice(&bytes).map_err(|e| {
            warn!(key, error = %e, "persisted value is corrupt");
            CheckoutError::DecodingFailed(e.to_string())
        })?;

        match stored.expires_at_ms {
            Some(expires_at) if self.now_ms() >= expires_at => {
                debug!(key, "persisted value expired");
                self.storage.remove(key);
                Ok(None)
            }
            _ => Ok(Some(stored.value)),
        }
    }

    /// Like [`load`](Self::load), but a missing value is [`CheckoutError::NotFound`].
    pub fn require<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        self.load(key)?
            .ok_or_else(|| CheckoutError::NotFound(key.to_string()))
    }

    /// Removes `key`. Returns whether it was present.
    pub fn delete(&self, key: &str) -> bool {
        self.storage.remove(key)
    }

    /// Removes every stored key.
    pub fn delete_all(&self) {
        for key in self.storage.keys() {
            self.storage.remove(&key);
        }
    }

    /// Every stored key, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys = self.storage.keys();
        keys.sort();
        keys
    }
}

impl fmt::Debug for PersistenceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistenceManager")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;

    fn manager(max_bytes: usize) -> (PersistenceManager, Arc<MemoryStorage>, Arc<ManualClock>) {
        let storage = Arc::new(MemoryStorage::default());
        let clock = Arc::new(ManualClock::default());
        let manager = PersistenceManager::with_clock(
            storage.clone(),
            PersistenceSettings { max_bytes },
            clock.clone(),
        );
        (manager, storage, clock)
    }

    #[test]
    fn test_save_and_load() {
        let (persistence, _, _) = manager(1024);
        persistence.save("numbers", &vec![1, 2, 3], None).unwrap();
        assert_eq!(persistence.load::<Vec<i32>>("numbers").unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(persistence.load::<Vec<i32>>("missing").unwrap(), None);
    }

    #[test]
    fn test_too_large_is_rejected() {
        let (persistence, storage, _) = manager(16);
        let err = persistence.save("big", &"x".repeat(64), None).unwrap_err();
        assert!(matches!(err, CheckoutError::DataTooLarge { limit: 16, .. }));
        assert!(storage.get("big").is_none());
    }

    #[test]
    fn test_corrupt_bytes_fail_to_decode() {
        let (persistence, storage, _) = manager(1024);
        storage.set("config", b"{not json".to_vec());
        let err = persistence.load::<String>("config").unwrap_err();
        assert!(matches!(err, CheckoutError::DecodingFailed(_)));
    }

    #[test]
    fn test_wrong_shape_fails_to_decode() {
        let (persistence, _, _) = manager(1024);
        persistence.save("n", &5, None).unwrap();
        assert!(matches!(
            persistence.load::<String>("n"),
            Err(CheckoutError::DecodingFailed(_))
        ));
    }

    #[test]
    fn test_expiry() {
        let (persistence, storage, clock) = manager(1024);
        persistence
            .save("session", &"abc", Some(Duration::from_secs(60)))
            .unwrap();
        clock.advance(Duration::from_secs(59));
        assert!(persistence.load::<String>("session").unwrap().is_some());
        clock.advance(Duration::from_secs(1));
        assert_eq!(persistence.load::<String>("session").unwrap(), None);
        assert!(storage.get("session").is_none());
    }

    #[test]
    fn test_require_missing_is_not_found() {
        let (persistence, _, _) = manager(1024);
        assert_eq!(
            persistence.require::<String>("nope").unwrap_err(),
            CheckoutError::NotFound("nope".to_string())
        );
    }

    #[test]
    fn test_delete_and_keys() {
        let (persistence, _, _) = manager(1024);
        persistence.save("b", &1, None).unwrap();
        persistence.save("a", &2, None).unwrap();
        assert_eq!(persistence.keys(), vec!["a".to_string(), "b".to_string()]);

        assert!(persistence.delete("a"));
        assert!(!persistence.delete("a"));
        persistence.delete_all();
        assert!(persistence.keys().is_empty());
    }
}
