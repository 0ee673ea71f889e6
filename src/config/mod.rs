//! Dispatcher configuration and caller-misuse errors.
//!
//! [`DispatcherConfig`] can be built in code or deserialized from any serde
//! format; [`ConfigError`] covers every mistake that is detected before a
//! cache or transport interaction takes place.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Cache capacity used when none is configured.
pub const DEFAULT_CACHE_CAPACITY: usize = 100;

/// Caller misuse, reported before any cache or transport interaction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("cache capacity must be at least 1")]
    ZeroCapacity,

    #[error("unsupported method {method:?}: expected one of POST, PUT, PATCH, DELETE")]
    UnsupportedMethod { method: String },

    #[error("unknown auth scheme {scheme:?}: expected Bearer, Basic or Custom")]
    UnknownAuthScheme { scheme: String },

    #[error("missing path parameter {name:?} for template {template}")]
    MissingParam { name: String, template: String },

    #[error("no route registered under {name:?}")]
    UnknownRoute { name: String },
}

/// Settings for a [`Dispatcher`](crate::dispatch::Dispatcher).
///
/// Missing fields fall back to their defaults when deserializing.
///
/// # Examples
///
/// ```
/// use apiweave::config::DispatcherConfig;
///
/// let config: DispatcherConfig = serde_json::from_str(r#"{"cache_capacity": 16}"#).unwrap();
/// assert_eq!(config.cache_capacity, 16);
/// assert!(config.validate().is_ok());
///
/// let defaults: DispatcherConfig = serde_json::from_str("{}").unwrap();
/// assert_eq!(defaults, DispatcherConfig::default());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Maximum number of cached `GET` results.
    pub cache_capacity: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl DispatcherConfig {
    /// Sets the cache capacity.
    #[must_use]
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Checks the configuration without building anything.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroCapacity`] when `cache_capacity` is 0.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(())
    }
}
