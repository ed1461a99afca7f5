//! Time-boxed result cache
//!
//! Entries are servable while `now - stored_at < ttl`. Expiry is lazy: a
//! stale entry is dropped by the lookup that finds it. A disabled cache
//! misses every lookup and ignores every store.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Default time-to-live (1 hour)
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Deterministic key for `(operation, parameters)`
///
/// Parameter order never matters: object keys are sorted at every depth
/// before serialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new<'a, I>(operation: &str, params: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a Value)>,
    {
        let mut sorted: Vec<(&String, &Value)> = params.into_iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(b.0));

        let mut key = String::with_capacity(operation.len() + 2);
        key.push_str(operation);
        key.push(':');
        key.push('{');
        for (i, (name, value)) in sorted.into_iter().enumerate() {
            if i > 0 {
                key.push(',');
            }
            write_canonical(&Value::String(name.clone()), &mut key);
            key.push(':');
            write_canonical(value, &mut key);
        }
        key.push('}');
        CacheKey(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut fields: Vec<_> = map.iter().collect();
            fields.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (name, item)) in fields.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(&Value::String(name.clone()), out);
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        // scalars serialize without any ordering concerns
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Stored value plus the instant it was written
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub stored_at: Instant,
}

/// Cache occupancy summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub size_bytes: usize,
}

/// Process-wide result cache shared by every envelope
#[derive(Debug)]
pub struct ResultCache<V = Value> {
    entries: Mutex<HashMap<CacheKey, CacheEntry<V>>>,
    ttl: Duration,
    enabled: bool,
}

impl<V: Clone> Default for ResultCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl<V: Clone> ResultCache<V> {
    /// Enabled cache with the given TTL
    pub fn new(ttl: Duration) -> Self {
        Self::with_enabled(ttl, true)
    }

    /// Cache that never stores anything
    pub fn disabled() -> Self {
        Self::with_enabled(DEFAULT_TTL, false)
    }

    pub fn with_enabled(ttl: Duration, enabled: bool) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            enabled,
        }
    }

    /// Fetch a live entry; evicts it if it has expired
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        if !self.enabled {
            return None;
        }

        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let expired = match entries.get(key) {
            None => return None,
            Some(entry) => entry.stored_at.elapsed() >= self.ttl,
        };

        if expired {
            entries.remove(key);
            tracing::debug!(key = %key, "cache expired");
            None
        } else {
            tracing::debug!(key = %key, "cache hit");
            entries.get(key).map(|entry| entry.value.clone())
        }
    }

    /// Store (or replace) an entry stamped with the current time
    pub fn put(&self, key: CacheKey, value: V) {
        if !self.enabled {
            return;
        }

        tracing::debug!(key = %key, "cached result");
        let entry = CacheEntry {
            value,
            stored_at: Instant::now(),
        };
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, entry);
    }

    /// When the entry for `key` was stored, expired or not
    pub fn stored_at(&self, key: &CacheKey) -> Option<Instant> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .map(|entry| entry.stored_at)
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        let ttl = self.ttl;
        entries.retain(|_, entry| entry.stored_at.elapsed() < ttl);
        before - entries.len()
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        tracing::info!("cache cleared");
    }

    /// Number of stored entries, including expired ones not yet evicted
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl<V: Clone + Serialize> ResultCache<V> {
    /// Entry count and approximate payload size (serialized JSON length)
    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let size_bytes = entries
            .values()
            .map(|entry| serde_json::to_vec(&entry.value).map_or(0, |bytes| bytes.len()))
            .sum();
        CacheStats {
            entries: entries.len(),
            size_bytes,
        }
    }
}
