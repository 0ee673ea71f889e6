//! Dispatcher — turns logical operations into cache lookups, transport calls
//! and pipeline runs.
//!
//! ## Read path (`fetch`)
//!
//! 1. Derive the key `"GET:<path>"`.
//! 2. On a live cache hit, return the stored payload. It was transformed when
//!    it was stored, so the pipeline is not run again.
//! 3. On a miss, read from the transport, decode, run the pipeline.
//! 4. Store the result only when the caller passed a TTL. Caching is opt-in per
//!    call.
//!
//! ## Write path (`send`)
//!
//! The method is validated first, then the outbound payload runs through the
//! pipeline, is encoded and written. The decoded response is returned as-is
//! and never cached.
//!
//! ## Concurrency
//!
//! All methods take `&self`; share a dispatcher behind an [`Arc`](std::sync::Arc).
//! The cache sits behind one mutex that is held only for a single cache
//! operation and never across an `.await`. Transport calls and pipeline runs
//! happen outside the lock, so concurrent misses on the same key may all reach
//! the transport.
//!
//! ## Cache keys
//!
//! The key is the verb and the path only. Query strings embedded in the path
//! are part of it; request bodies are not.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::Payload;
use crate::cache::{CacheStats, ExpiringCache};
use crate::config::{ConfigError, DispatcherConfig};
use crate::http::Method;
use crate::middleware::{Pipeline, PipelineError, TransformHandler};
use crate::transport::{Auth, Transport, TransportError};

/// Every way a dispatcher operation can fail.
///
/// The three kinds stay distinguishable; match on the variant rather than the
/// message.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// Derives the cache key for `method` and `path`.
///
/// # Examples
///
/// ```
/// use apiweave::dispatch::cache_key;
/// use apiweave::http::Method;
///
/// assert_eq!(cache_key(&Method::Get, "/users/1"), "GET:/users/1");
/// ```
pub fn cache_key(method: &Method, path: &str) -> String {
    format!("{method}:{path}")
}

/// Caching request dispatcher over an owned [`Transport`].
///
/// # Examples
///
/// ```rust,no_run
/// use std::time::Duration;
/// use apiweave::dispatch::Dispatcher;
/// use apiweave::middleware::InjectFields;
/// use apiweave::transport::Transport;
///
/// # async fn example(transport: impl Transport) -> Result<(), apiweave::dispatch::Error> {
/// let mut dispatcher = Dispatcher::builder(transport).cache_capacity(256).build()?;
/// dispatcher.pipeline_mut().add_transform(InjectFields::new().field("cached", true));
///
/// let user = dispatcher.fetch("/users/1", Some(Duration::from_secs(60))).await?;
/// let again = dispatcher.fetch("/users/1", None).await?; // served from cache
/// assert_eq!(user, again);
/// # Ok(())
/// # }
/// ```
pub struct Dispatcher<T> {
    transport: T,
    cache: Mutex<ExpiringCache<Payload>>,
    pipeline: Pipeline,
}

impl<T: Transport> Dispatcher<T> {
    /// Creates a dispatcher with an empty pipeline and a cache of `capacity`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroCapacity`] when `capacity` is 0.
    pub fn new(transport: T, capacity: usize) -> Result<Self, ConfigError> {
        Self::builder(transport).cache_capacity(capacity).build()
    }

    /// Creates a dispatcher from a [`DispatcherConfig`].
    ///
    /// # Errors
    ///
    /// Returns the first validation failure of `config`.
    pub fn with_config(transport: T, config: &DispatcherConfig) -> Result<Self, ConfigError> {
        Self::builder(transport).config(config.clone()).build()
    }

    /// Starts a [`DispatcherBuilder`] with default configuration.
    pub fn builder(transport: T) -> DispatcherBuilder<T> {
        DispatcherBuilder {
            transport,
            config: DispatcherConfig::default(),
            pipeline: Pipeline::new(),
        }
    }

    /// Appends a transform to the pipeline.
    pub fn add_middleware(&mut self, handler: TransformHandler) {
        self.pipeline.add(handler);
    }

    /// Returns the pipeline for in-place extension.
    pub fn pipeline_mut(&mut self) -> &mut Pipeline {
        &mut self.pipeline
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Validates the credential triple and hands it to the transport.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownAuthScheme`] (wrapped in
    /// [`Error::Configuration`]) without touching the transport when the
    /// scheme is not recognised.
    pub fn configure_auth(&mut self, scheme: &str, key: &str, value: &str) -> Result<(), Error> {
        let auth = Auth::from_parts(scheme, key, value)?;
        debug!(scheme = auth.scheme(), "configuring transport auth");
        self.transport.configure_auth(auth);
        Ok(())
    }

    /// Reads `path`, serving from and optionally populating the cache.
    ///
    /// With `ttl = None` the result is never stored; it can still be served
    /// from an entry an earlier call stored with a TTL. A zero `ttl` still
    /// stores an already-expired entry, which takes a slot and can evict the
    /// least-recently-used live entry in a full cache.
    ///
    /// # Errors
    ///
    /// - [`Error::Transport`] when the read fails or its body does not decode to
    ///   an object.
    /// - [`Error::Pipeline`] when a transform fails.
    ///
    /// Nothing is cached on failure.
    pub async fn fetch(&self, path: &str, ttl: Option<Duration>) -> Result<Payload, Error> {
        let key = cache_key(&Method::Get, path);

        let cached = self.lock_cache().get(&key);
        if let Some(payload) = cached {
            return Ok(payload);
        }

        debug!(path, "reading from transport");
        let body = self.transport.read(path).await.inspect_err(|e| {
            warn!(path, error = %e, "transport read failed");
        })?;

        let payload = decode(path, &body)?;
        let payload = self.pipeline.apply(payload).inspect_err(|e| {
            warn!(path, stage = e.stage, error = %e.source, "pipeline rejected response");
        })?;

        if let Some(ttl) = ttl {
            self.lock_cache().put(key, payload.clone(), Some(ttl));
        }

        Ok(payload)
    }

    /// Runs `payload` through the pipeline and writes it to `path` with `method`.
    ///
    /// Accepted methods are `POST`, `PUT`, `PATCH` and `DELETE`. The decoded
    /// response is returned without running the pipeline and is never cached.
    ///
    /// # Errors
    ///
    /// - [`Error::Configuration`] for any other method, before anything runs.
    /// - [`Error::Pipeline`] when a transform fails; nothing is sent.
    /// - [`Error::Transport`] when encoding, the write, or decoding fails.
    pub async fn send(&self, path: &str, method: &str, payload: Payload) -> Result<Payload, Error> {
        let Ok(method) = method.parse::<Method>();
        if !method.is_write() {
            return Err(ConfigError::UnsupportedMethod {
                method: method.to_string(),
            }
            .into());
        }

        let payload = self.pipeline.apply(payload).inspect_err(|e| {
            warn!(path, %method, stage = e.stage, error = %e.source, "pipeline rejected request");
        })?;

        let body = serde_json::to_vec(&payload).map_err(|source| TransportError::Encode {
            path: path.to_owned(),
            source,
        })?;

        debug!(path, %method, bytes = body.len(), "writing to transport");
        let response = self
            .transport
            .write(path, &method, Bytes::from(body))
            .await
            .inspect_err(|e| {
                warn!(path, %method, error = %e, "transport write failed");
            })?;

        Ok(decode(path, &response)?)
    }

    /// Drops the cached `GET` result for `path`, or the whole cache for `None`.
    ///
    /// In-flight operations are unaffected; a fetch that is already past its
    /// cache lookup may still store its result afterwards.
    pub fn invalidate(&self, path: Option<&str>) {
        let mut cache = self.lock_cache();
        match path {
            Some(path) => {
                let removed = cache.invalidate(&cache_key(&Method::Get, path));
                debug!(path, removed, "invalidated cache entry");
            }
            None => {
                cache.clear();
                debug!("cleared cache");
            }
        }
    }

    /// Returns a snapshot of the cache counters.
    pub fn cache_stats(&self) -> CacheStats {
        self.lock_cache().stats()
    }

    /// Returns `true` if a live `GET` result for `path` is cached.
    pub fn is_cached(&self, path: &str) -> bool {
        self.lock_cache().contains_key(&cache_key(&Method::Get, path))
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Consumes the dispatcher, dropping its cache and returning the transport.
    pub fn into_transport(self) -> T {
        self.transport
    }

    // Cache methods never panic mid-update, so a poisoned lock still guards a
    // consistent structure.
    fn lock_cache(&self) -> MutexGuard<'_, ExpiringCache<Payload>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Builder for [`Dispatcher`], obtained from [`Dispatcher::builder`].
pub struct DispatcherBuilder<T> {
    transport: T,
    config: DispatcherConfig,
    pipeline: Pipeline,
}

impl<T: Transport> DispatcherBuilder<T> {
    /// Sets the maximum number of cached results.
    #[must_use]
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.config.cache_capacity = capacity;
        self
    }

    /// Replaces the whole configuration.
    #[must_use]
    pub fn config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Appends a transform to the pipeline.
    #[must_use]
    pub fn transform(mut self, handler: TransformHandler) -> Self {
        self.pipeline.add(handler);
        self
    }

    /// Configures credentials on the transport before it is handed over.
    #[must_use]
    pub fn auth(mut self, auth: Auth) -> Self {
        self.transport.configure_auth(auth);
        self
    }

    /// Validates the configuration and builds the dispatcher.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroCapacity`] when the cache capacity is 0.
    pub fn build(self) -> Result<Dispatcher<T>, ConfigError> {
        self.config.validate()?;
        Ok(Dispatcher {
            transport: self.transport,
            cache: Mutex::new(ExpiringCache::new(self.config.cache_capacity)?),
            pipeline: self.pipeline,
        })
    }
}

// An empty body decodes to an empty payload; anything else must be a JSON object.
fn decode(path: &str, body: &[u8]) -> Result<Payload, TransportError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Payload::new());
    }

    match serde_json::from_slice(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(TransportError::NotAnObject {
            path: path.to_owned(),
            found: kind(&other),
        }),
        Err(source) => Err(TransportError::Decode {
            path: path.to_owned(),
            source,
        }),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
