//! Expiring LRU cache — bounded storage for transformed `GET` results.
//!
//! [`ExpiringCache`] keeps at most `capacity` entries, each with an optional
//! absolute expiry. Recency is a total order: every hit and every `put` moves
//! the key to the most-recently-used end, and a `put` of a new key into a full
//! cache evicts the single least-recently-used entry first.
//!
//! Expiry is lazy. Nothing runs in the background; an entry whose expiry is at
//! or before the current instant is removed the next time it is looked up.
//!
//! ## Layout
//!
//! Recency ordering and eviction come from [`lru::LruCache`]; this type layers
//! per-entry expiry and hit/miss counters on top of it.
//!
//! The cache itself is not synchronized; the
//! [`Dispatcher`](crate::dispatch::Dispatcher) wraps it in a single mutex.

use std::num::NonZeroUsize;
use std::time::Duration;

use lru::LruCache;
use serde::Serialize;
use tokio::time::Instant;
use tracing::debug;

use crate::config::ConfigError;

/// A cached value together with its optional absolute expiry.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    value: V,
    expiry: Option<Instant>,
}

impl<V> CacheEntry<V> {
    /// Returns the stored value.
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Returns the instant at which this entry stops being served, if any.
    pub fn expiry(&self) -> Option<Instant> {
        self.expiry
    }

    /// Returns `true` once `now` has reached the expiry.
    pub fn is_expired(&self, now: Instant) -> bool {
        self.expiry.is_some_and(|expiry| expiry <= now)
    }
}

/// Counters describing cache behaviour since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Lookups that found an entry past its expiry (also counted as misses).
    pub expirations: u64,
    pub evictions: u64,
    pub entries: usize,
    pub capacity: usize,
}

impl CacheStats {
    /// Fraction of lookups that were hits, or `0.0` before the first lookup.
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}

/// A bounded key/value store with per-entry expiry and LRU eviction.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use apiweave::cache::ExpiringCache;
///
/// let mut cache = ExpiringCache::new(2).unwrap();
/// cache.put("a", 1, None);
/// cache.put("b", 2, Some(Duration::from_secs(60)));
/// assert_eq!(cache.get("a"), Some(1));
///
/// // "b" is now least recently used and makes room for "c".
/// cache.put("c", 3, None);
/// assert_eq!(cache.get("b"), None);
/// assert_eq!(cache.len(), 2);
/// ```
#[derive(Debug)]
pub struct ExpiringCache<V> {
    entries: LruCache<String, CacheEntry<V>>,
    stats: CacheStats,
}

impl<V: Clone> ExpiringCache<V> {
    /// Creates an empty cache holding at most `capacity` entries.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroCapacity`] when `capacity` is 0.
    pub fn new(capacity: usize) -> Result<Self, ConfigError> {
        let cap = NonZeroUsize::new(capacity).ok_or(ConfigError::ZeroCapacity)?;
        Ok(Self {
            entries: LruCache::new(cap),
            stats: CacheStats {
                capacity,
                ..CacheStats::default()
            },
        })
    }

    /// Looks up `key`, returning a clone of its value on a live hit.
    ///
    /// A hit marks the key most-recently-used. An expired entry is removed and
    /// reported as absent. Absence is a normal outcome, never an error.
    pub fn get(&mut self, key: &str) -> Option<V> {
        let expired = match self.entries.peek(key) {
            Some(entry) => entry.is_expired(Instant::now()),
            None => {
                self.stats.misses += 1;
                debug!(key, "cache miss");
                return None;
            }
        };

        if expired {
            self.entries.pop(key);
            self.stats.expirations += 1;
            self.stats.misses += 1;
            debug!(key, "cache entry expired");
            return None;
        }

        self.stats.hits += 1;
        debug!(key, "cache hit");
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    /// Stores `value` under `key`, expiring after `ttl` if one is given.
    ///
    /// Replacing an existing key never evicts. Inserting a new key into a full
    /// cache evicts the least-recently-used entry first. Either way `key`
    /// becomes most-recently-used. A `ttl` too large to represent is treated
    /// as no expiry.
    pub fn put(&mut self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
        let key = key.into();
        let entry = CacheEntry {
            value,
            expiry: ttl.and_then(|ttl| Instant::now().checked_add(ttl)),
        };

        // `push` hands back the old entry on replacement too; only a
        // different key means something was evicted.
        if let Some((evicted, _)) = self.entries.push(key.clone(), entry) {
            if evicted != key {
                self.stats.evictions += 1;
                debug!(key = %evicted, "evicted least recently used entry");
            }
        }
    }

    /// Removes `key` if present. Returns `true` when an entry was removed.
    pub fn invalidate(&mut self, key: &str) -> bool {
        self.entries.pop(key).is_some()
    }

    /// Removes every entry. Counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Returns `true` if `key` holds a live entry.
    ///
    /// Unlike [`get`](Self::get) this neither touches recency nor removes an
    /// expired entry.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries
            .peek(key)
            .is_some_and(|entry| !entry.is_expired(Instant::now()))
    }

    /// Returns the entry for `key` without touching recency, expired or not.
    pub fn peek(&self, key: &str) -> Option<&CacheEntry<V>> {
        self.entries.peek(key)
    }

    /// Number of stored entries, including expired ones not yet looked up.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    /// Keys ordered from least to most recently used.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().rev().map(|(key, _)| key.as_str())
    }

    /// Returns a snapshot of the cache counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            ..self.stats
        }
    }
}
