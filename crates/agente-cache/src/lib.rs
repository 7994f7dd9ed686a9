//! # Agente Cache
//!
//! Named, versioned request/response stores for the Mi Agente Viajes PWA
//! shell. These are the service worker's only persistent state.
//!
//! ## Architecture
//!
//! ```text
//! CacheStorage
//!     ├── static-<version>   (shell, scripts, images, manifest)
//!     │       └── "GET /offline" → CacheEntry
//!     └── data-<version>     (API JSON responses)
//!             └── "GET /api/viajes" → CacheEntry
//! ```
//!
//! At most one generation pair is active at a time; every other named cache
//! is stale and gets swept wholesale at worker activation. Bumping the
//! version token is the only invalidation mechanism.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::debug;

// ==================== Errors ====================

/// Cache store errors.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    #[error("Invalid version token: {0}")]
    InvalidVersion(String),

    #[error("Cache not found: {0}")]
    NotFound(String),
}

// ==================== Generation Names ====================

/// Names of the active cache generation pair, derived from a version token.
///
/// Derivation is a pure function of the token, so the names can be
/// re-derived anywhere without touching a live cache store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheNames {
    version: String,
    static_cache: String,
    data_cache: String,
}

impl CacheNames {
    /// Derive the generation names for a version token.
    pub fn for_version(version: &str) -> Result<Self, CacheError> {
        let version = version.trim();
        if version.is_empty() || version.contains(char::is_whitespace) {
            return Err(CacheError::InvalidVersion(version.to_string()));
        }
        Ok(Self {
            version: version.to_string(),
            static_cache: format!("static-{version}"),
            data_cache: format!("data-{version}"),
        })
    }

    /// The version token the names embed.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Name of the static generation (shell, scripts, images, manifest).
    pub fn static_cache(&self) -> &str {
        &self.static_cache
    }

    /// Name of the data generation (API JSON responses).
    pub fn data_cache(&self) -> &str {
        &self.data_cache
    }

    /// Check whether a cache name belongs to the current pair.
    pub fn is_current(&self, name: &str) -> bool {
        name == self.static_cache || name == self.data_cache
    }
}

// ==================== Cache Entry ====================

/// A cached request/response pair.
///
/// The response snapshot is an immutable byte-for-byte copy, including
/// status, headers and body. Entries are only ever written from successful
/// (2xx) network responses or locally synthesized responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Request URL.
    pub url: String,

    /// Request method (always GET for stored entries).
    pub method: String,

    /// Response status.
    pub status: u16,

    /// Response headers.
    pub headers: HashMap<String, String>,

    /// Response body.
    pub body: Vec<u8>,

    /// Cached at timestamp (ms since epoch).
    pub cached_at: u64,
}

impl CacheEntry {
    /// Create an entry snapshotting the given response parts.
    pub fn new(
        url: impl Into<String>,
        method: impl Into<String>,
        status: u16,
        headers: HashMap<String, String>,
        body: Vec<u8>,
    ) -> Self {
        Self {
            url: url.into(),
            method: method.into(),
            status,
            headers,
            body,
            cached_at: now_millis(),
        }
    }

    /// Get a header value, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Check if the snapshot is a success (2xx) response.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Cache key: normalized request identity (method + URL).
fn entry_key(method: &str, url: &str) -> String {
    format!("{} {}", method.to_ascii_uppercase(), url)
}

// ==================== Cache ====================

/// A single named cache generation.
#[derive(Debug, Default)]
pub struct Cache {
    /// Cache name (e.g. `static-v2`).
    pub name: String,

    /// Cached entries, keyed by method + URL.
    entries: HashMap<String, CacheEntry>,
}

impl Cache {
    /// Create a new, empty cache generation.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: HashMap::new(),
        }
    }

    /// Match a GET request against this generation.
    pub fn match_request(&self, url: &str) -> Option<&CacheEntry> {
        self.entries.get(&entry_key("GET", url))
    }

    /// Store an entry. Only GET entries are cacheable; anything else is
    /// dropped with a log line. Overwrites by key (atomic per-entry put).
    pub fn put(&mut self, entry: CacheEntry) -> bool {
        if !entry.method.eq_ignore_ascii_case("GET") {
            debug!(cache = %self.name, url = %entry.url, method = %entry.method,
                "refusing to cache side-effecting request");
            return false;
        }
        let key = entry_key(&entry.method, &entry.url);
        self.entries.insert(key, entry);
        true
    }

    /// Delete an entry by URL.
    pub fn delete(&mut self, url: &str) -> bool {
        self.entries.remove(&entry_key("GET", url)).is_some()
    }

    /// Get all cached URLs.
    pub fn keys(&self) -> Vec<&str> {
        self.entries.values().map(|e| e.url.as_str()).collect()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ==================== Cache Storage ====================

/// Cache storage: every named generation that currently exists.
#[derive(Debug, Default)]
pub struct CacheStorage {
    caches: HashMap<String, Cache>,
}

impl CacheStorage {
    /// Create new, empty cache storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a cache generation (creates it if absent).
    pub fn open(&mut self, name: &str) -> &mut Cache {
        self.caches
            .entry(name.to_string())
            .or_insert_with(|| Cache::new(name))
    }

    /// Get a generation without creating it.
    pub fn get(&self, name: &str) -> Option<&Cache> {
        self.caches.get(name)
    }

    /// Check if a generation exists.
    pub fn has(&self, name: &str) -> bool {
        self.caches.contains_key(name)
    }

    /// Delete a generation wholesale.
    pub fn delete(&mut self, name: &str) -> bool {
        self.caches.remove(name).is_some()
    }

    /// Get all generation names.
    pub fn keys(&self) -> Vec<&str> {
        self.caches.keys().map(|s| s.as_str()).collect()
    }

    /// Match a GET request across all generations.
    pub fn match_request(&self, url: &str) -> Option<&CacheEntry> {
        self.caches.values().find_map(|c| c.match_request(url))
    }

    /// Delete every generation not in the current pair.
    ///
    /// Returns the deleted names. Activating with an unchanged version token
    /// deletes nothing.
    pub fn delete_stale(&mut self, current: &CacheNames) -> Vec<String> {
        let stale: Vec<String> = self
            .caches
            .keys()
            .filter(|name| !current.is_current(name))
            .cloned()
            .collect();
        for name in &stale {
            debug!(cache = %name, "deleting stale cache generation");
            self.caches.remove(name);
        }
        stale
    }

    /// Delete every generation unconditionally (diagnostic reset).
    pub fn clear(&mut self) -> usize {
        let n = self.caches.len();
        self.caches.clear();
        n
    }
}
