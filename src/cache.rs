//! Record-level caching.
//!
//! The engine only depends on the [`CacheStore`] contract. Keys are derived as
//! `"<serializer>:<id>"`. When a fieldset is active the namespace is extended
//! with `-fieldset:<fieldset>`, and a non-default [`CacheVariant`] adds its
//! own suffix, so differently-shaped hashes of the same record never collide.
//! Fieldset strings longer than [`FIELDSET_KEY_LIMIT`] are replaced by their
//! SHA-1 hex digest.

use crate::error::Result;
use crate::fieldset::Fieldset;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha1::{Digest, Sha1};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};
use tracing::debug;

/// Longest fieldset string embedded verbatim in a namespace.
pub const FIELDSET_KEY_LIMIT: usize = 40;

/// Options passed to every store call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheOptions {
    /// Key namespace.
    pub namespace: Option<String>,
    /// Entry lifetime in seconds.
    pub expires_in_secs: Option<u64>,
}

impl CacheOptions {
    /// Options with a namespace.
    pub fn namespaced(namespace: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            expires_in_secs: None,
        }
    }

    /// Set an entry lifetime.
    pub fn expires_in(mut self, ttl: Duration) -> Self {
        self.expires_in_secs = Some(ttl.as_secs());
        self
    }

    /// Key as stored, namespace applied.
    pub fn normalize_key(&self, key: &str) -> String {
        match &self.namespace {
            Some(namespace) => format!("{namespace}:{key}"),
            None => key.to_string(),
        }
    }
}

/// Cache collaborator contract.
///
/// Implementations own their concurrency discipline. Racing misses may both
/// compute; the last write wins.
pub trait CacheStore: Send + Sync {
    /// Read an entry.
    fn read(&self, key: &str, options: &CacheOptions) -> Option<Value>;

    /// Write an entry.
    fn write(&self, key: &str, value: Value, options: &CacheOptions);

    /// Remove an entry. Returns true if one was removed.
    fn delete(&self, key: &str, options: &CacheOptions) -> bool;

    /// True if an entry is present.
    fn exist(&self, key: &str, options: &CacheOptions) -> bool {
        self.read(key, options).is_some()
    }

    /// Read-through: return the stored value or compute, store and return it.
    fn fetch(
        &self,
        key: &str,
        options: &CacheOptions,
        compute: &mut dyn FnMut() -> Result<Value>,
    ) -> Result<Value> {
        if let Some(hit) = self.read(key, options) {
            debug!(key, namespace = ?options.namespace, "record cache hit");
            return Ok(hit);
        }

        debug!(key, namespace = ?options.namespace, "record cache miss");
        let value = compute()?;
        self.write(key, value.clone(), options);
        Ok(value)
    }
}

struct CacheEntry {
    value: Value,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// In-memory CacheStore.
pub struct MemoryCacheStore {
    inner: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// True if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStore for MemoryCacheStore {
    fn read(&self, key: &str, options: &CacheOptions) -> Option<Value> {
        let store = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        store
            .get(&options.normalize_key(key))
            .filter(|entry| entry.is_live(Instant::now()))
            .map(|entry| entry.value.clone())
    }

    fn write(&self, key: &str, value: Value, options: &CacheOptions) {
        let expires_at = options
            .expires_in_secs
            .map(|secs| Instant::now() + Duration::from_secs(secs));
        let mut store = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        store.insert(options.normalize_key(key), CacheEntry { value, expires_at });
    }

    fn delete(&self, key: &str, options: &CacheOptions) -> bool {
        let mut store = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        store
            .remove(&options.normalize_key(key))
            .is_some_and(|entry| entry.is_live(Instant::now()))
    }
}

/// Cache key for a record whose id is already resolved.
pub fn record_cache_key(serializer: &str, id: &Value) -> String {
    match id {
        Value::String(s) => format!("{serializer}:{s}"),
        Value::Null => format!("{serializer}:"),
        other => format!("{serializer}:{other}"),
    }
}

/// Render inputs besides the fieldset that change a record's hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheVariant {
    /// Nest level the record is rendered at. Only relevant for descriptors
    /// with relationships.
    pub nest_level: u32,
    pub no_links: bool,
    pub no_auto_links: bool,
}

impl Default for CacheVariant {
    fn default() -> Self {
        Self {
            nest_level: 1,
            no_links: false,
            no_auto_links: false,
        }
    }
}

impl CacheVariant {
    /// Variant for a record rendered at `nest_level`.
    pub fn at_level(nest_level: u32) -> Self {
        Self {
            nest_level,
            ..Self::default()
        }
    }

    pub fn no_links(mut self, no_links: bool) -> Self {
        self.no_links = no_links;
        self
    }

    pub fn no_auto_links(mut self, no_auto_links: bool) -> Self {
        self.no_auto_links = no_auto_links;
        self
    }

    /// Namespace suffix; empty for the default variant.
    pub fn suffix(&self) -> String {
        let mut suffix = String::new();
        if self.nest_level > 1 {
            suffix.push_str(&format!("-nest:{}", self.nest_level));
        }
        if self.no_links {
            suffix.push_str("-no_links");
        }
        if self.no_auto_links {
            suffix.push_str("-no_auto_links");
        }
        suffix
    }
}

/// Options for one record, the namespace varied by the active fieldset and
/// the render variant.
///
/// Without a fieldset and with the default variant the base options are
/// returned unchanged.
pub fn record_cache_options(
    base: &CacheOptions,
    fields: Option<&Fieldset>,
    variant: &CacheVariant,
    default_namespace: &str,
) -> CacheOptions {
    let suffix = variant.suffix();
    if fields.is_none() && suffix.is_empty() {
        return base.clone();
    }

    let mut namespace = base
        .namespace
        .as_deref()
        .unwrap_or(default_namespace)
        .to_string();
    if let Some(fields) = fields {
        namespace.push_str("-fieldset:");
        namespace.push_str(&fieldset_key(fields));
    }
    namespace.push_str(&suffix);

    CacheOptions {
        namespace: Some(namespace),
        expires_in_secs: base.expires_in_secs,
    }
}

/// Namespace suffix for a fieldset: its literal string, or a digest of it
/// once it grows past [`FIELDSET_KEY_LIMIT`].
pub fn fieldset_key(fields: &Fieldset) -> String {
    let literal = fields.cache_string();
    if literal.len() > FIELDSET_KEY_LIMIT {
        fieldset_digest(&literal)
    } else {
        literal
    }
}

/// SHA-1 hex digest, [`FIELDSET_KEY_LIMIT`] characters long.
pub fn fieldset_digest(literal: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(literal.as_bytes());
    hex::encode(hasher.finalize())
}
