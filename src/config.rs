//! Checkout configuration: model, validation, and the loading service.
//!
//! [`ConfigurationService`] loads the configuration for a client token and
//! environment through a [`ConfigFetcher`]. Requests are keyed as
//! `"<clientToken>_<environment>"` and resolved through a [`ConfigCache`],
//! so concurrent loads for one key share a single fetch.
//!
//! Each successful fetch is also persisted. When a fetch fails the caller
//! can ask for that persisted copy ([`LoadOptions::use_stale`]) or for the
//! built-in default ([`LoadOptions::use_default`]) instead of the error.
//!
//! # Example
//!
//! ```
//! use checkout_fields::config::{parse_configuration, Configuration};
//!
//! let remote = parse_configuration(br#"{"merchantId": "m-1", "environment": "production", "analyticsEnabled": true}"#).unwrap();
//! let local = Configuration { analytics_enabled: Some(false), ..Configuration::empty() };
//!
//! let merged = remote.merge(&local);
//! assert_eq!(merged.merchant_id.as_deref(), Some("m-1"));
//! assert_eq!(merged.analytics_enabled, Some(false));
//! assert!(merged.validate().is_ok());
//! ```

use crate::cache::ConfigCache;
use crate::error::{CheckoutError, Result};
use crate::persist::PersistenceManager;
use crate::surcharge::{extract_network_surcharges, SurchargeTable};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Storage key of the persisted configuration copy.
pub const PERSISTED_CONFIGURATION_KEY: &str = "configuration";

/// Payment method type that carries card network options.
pub const PAYMENT_CARD: &str = "PAYMENT_CARD";

/// API environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Live traffic.
    Production,
    /// Test traffic.
    #[default]
    Sandbox,
}

impl Environment {
    /// Wire name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Sandbox => "sandbox",
        }
    }

    /// Base URL of the API for this environment.
    pub const fn api_base_url(&self) -> &'static str {
        match self {
            Self::Production => "https://api.primer.io",
            Self::Sandbox => "https://api.sandbox.primer.io",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = CheckoutError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "production" => Ok(Self::Production),
            "sandbox" => Ok(Self::Sandbox),
            other => Err(CheckoutError::InvalidEnvironment(other.to_string())),
        }
    }
}

/// Options of a payment method.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethodOptions {
    /// Card networks, as a list of records or a map keyed by network.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub networks: Option<serde_json::Value>,
}

/// A payment method offered by the merchant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethod {
    /// Payment method type, such as `PAYMENT_CARD`.
    #[serde(rename = "type")]
    pub method_type: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Type-specific options.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<PaymentMethodOptions>,
}

/// Merchant configuration.
///
/// Every field is optional so a partial configuration can be merged over
/// another one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    /// Merchant identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant_id: Option<String>,
    /// `production` or `sandbox`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    /// Whether analytics events are sent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analytics_enabled: Option<bool>,
    /// Theme name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    /// Offered payment methods.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub payment_methods: Vec<PaymentMethod>,
}

impl Configuration {
    /// A configuration with nothing set.
    pub const fn empty() -> Self {
        Self {
            merchant_id: None,
            environment: None,
            analytics_enabled: None,
            theme: None,
            payment_methods: Vec::new(),
        }
    }

    /// The configuration used when nothing could be loaded.
    pub fn fallback() -> Self {
        Self {
            merchant_id: Some("default".to_string()),
            environment: Some(Environment::Sandbox.to_string()),
            analytics_enabled: Some(false),
            theme: Some("default".to_string()),
            payment_methods: Vec::new(),
        }
    }

    /// Checks the merchant id is present and the environment is known.
    pub fn validate(&self) -> Result<()> {
        if self.merchant_id.is_none() {
            return Err(CheckoutError::MissingRequiredField("merchantId"));
        }
        if let Some(environment) = &self.environment {
            environment.parse::<Environment>()?;
        }
        Ok(())
    }

    /// Overlays `local` on `self`: every value set in `local` wins.
    pub fn merge(&self, local: &Configuration) -> Configuration {
        Configuration {
            merchant_id: local.merchant_id.clone().or_else(|| self.merchant_id.clone()),
            environment: local.environment.clone().or_else(|| self.environment.clone()),
            analytics_enabled: local.analytics_enabled.or(self.analytics_enabled),
            theme: local.theme.clone().or_else(|| self.theme.clone()),
            payment_methods: if local.payment_methods.is_empty() {
                self.payment_methods.clone()
            } else {
                local.payment_methods.clone()
            },
        }
    }

    /// Surcharges of the card payment method's networks.
    pub fn network_surcharges(&self) -> Option<SurchargeTable> {
        self.payment_methods
            .iter()
            .filter(|method| method.method_type == PAYMENT_CARD)
            .find_map(|method| extract_network_surcharges(method.options.as_ref()?.networks.as_ref()?))
    }
}

/// Decodes a configuration payload.
///
/// Malformed JSON and a missing `merchantId` are both [`CheckoutError::ParseError`].
pub fn parse_configuration(bytes: &[u8]) -> Result<Configuration> {
    let configuration: Configuration =
        serde_json::from_slice(bytes).map_err(|e| CheckoutError::ParseError(e.to_string()))?;
    if configuration.merchant_id.is_none() {
        return Err(CheckoutError::ParseError("merchantId is missing".to_string()));
    }
    Ok(configuration)
}

/// What to fetch.
#[derive(Clone, PartialEq, Eq)]
pub struct ConfigRequest {
    /// Client session token.
    pub client_token: String,
    /// Target environment.
    pub environment: Environment,
}

impl ConfigRequest {
    /// Creates a request.
    pub fn new(client_token: impl Into<String>, environment: Environment) -> Self {
        Self {
            client_token: client_token.into(),
            environment,
        }
    }

    /// Deduplication key, `"<clientToken>_<environment>"`.
    pub fn key(&self) -> String {
        format!("{}_{}", self.client_token, self.environment)
    }

    /// Configuration endpoint for the environment.
    pub fn url(&self) -> String {
        format!("{}/client-sdk/configuration", self.environment.api_base_url())
    }
}

impl fmt::Debug for ConfigRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigRequest")
            .field("client_token", &"***")
            .field("environment", &self.environment)
            .finish()
    }
}

/// Transport that retrieves raw configuration payloads.
pub trait ConfigFetcher: Send + Sync + 'static {
    /// Fetches the payload for `request`.
    fn fetch(&self, request: &ConfigRequest) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

/// How a load may recover from a failed fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Return [`Configuration::fallback`] instead of the error.
    pub use_default: bool,
    /// Return the persisted copy, if one exists, instead of the error.
    pub use_stale: bool,
}

impl LoadOptions {
    /// Fall back to the default configuration on failure.
    pub const fn with_default() -> Self {
        Self {
            use_default: true,
            use_stale: false,
        }
    }

    /// Fall back to the persisted copy on failure.
    pub const fn with_stale() -> Self {
        Self {
            use_default: false,
            use_stale: true,
        }
    }
}

/// Loads, caches, and persists merchant configuration.
pub struct ConfigurationService<F> {
    fetcher: Arc<F>,
    cache: ConfigCache<Configuration>,
    persistence: Arc<PersistenceManager>,
}

impl<F: ConfigFetcher> ConfigurationService<F> {
    /// Creates a service from its collaborators.
    pub fn new(
        fetcher: Arc<F>,
        cache: ConfigCache<Configuration>,
        persistence: Arc<PersistenceManager>,
    ) -> Self {
        Self {
            fetcher,
            cache,
            persistence,
        }
    }

    /// The in-memory cache.
    #[inline]
    pub fn cache(&self) -> &ConfigCache<Configuration> {
        &self.cache
    }

    /// Loads the configuration for a client token and environment.
    #[instrument(skip_all, fields(environment = %environment))]
    pub async fn load_configuration(
        &self,
        client_token: &str,
        environment: Environment,
        options: LoadOptions,
    ) -> Result<Configuration> {
        let request = ConfigRequest::new(client_token, environment);
        let key = request.key();

        let fetcher = Arc::clone(&self.fetcher);
        let persistence = Arc::clone(&self.persistence);
        let loaded = self
            .cache
            .get_or_fetch(&key, move || async move {
                let bytes = fetcher.fetch(&request).await?;
                let configuration = parse_configuration(&bytes)?;
                configuration.validate()?;
                if let Err(err) = persistence.save(PERSISTED_CONFIGURATION_KEY, &configuration, None) {
                    warn!(error = %err, "could not persist configuration");
                }
                Ok(configuration)
            })
            .await;

        let err = match loaded {
            Ok(configuration) => return Ok(configuration),
            Err(err) => err,
        };

        if options.use_stale {
            if let Some(stale) = self.persistence.load::<Configuration>(PERSISTED_CONFIGURATION_KEY)? {
                warn!(error = %err, "using persisted configuration");
                return Ok(stale);
            }
        }
        if options.use_default {
            warn!(error = %err, "using default configuration");
            return Ok(Configuration::fallback());
        }
        Err(err)
    }

    /// Merges `updates` over the persisted configuration and saves the result.
    ///
    /// Without a persisted configuration the default one is the base.
    pub fn update_configuration(&self, updates: &Configuration) -> Result<Configuration> {
        let current = self
            .persistence
            .load::<Configuration>(PERSISTED_CONFIGURATION_KEY)?
            .unwrap_or_else(Configuration::fallback);
        let merged = current.merge(updates);
        self.persistence
            .save(PERSISTED_CONFIGURATION_KEY, &merged, None)?;
        debug!("configuration updated");
        Ok(merged)
    }

    /// Drops the cached and persisted configuration.
    pub fn clear_cache(&self) {
        self.cache.invalidate_all();
        self.persistence.delete(PERSISTED_CONFIGURATION_KEY);
        debug!("configuration cache cleared");
    }
}

impl<F> fmt::Debug for ConfigurationService<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigurationService")
            .field("cache", &self.cache)
            .field("persistence", &self.persistence)
            .finish_non_exhaustive()
    }
}
