//! Fetch boundary types and the network seam.
//!
//! The strategy executor never talks to a socket directly; it goes through
//! the [`Fetch`] trait so the router can be exercised against a scripted
//! backend.

use agente_cache::CacheEntry;
use futures::future::BoxFuture;
use hashbrown::HashMap;
use thiserror::Error;
use url::Url;

/// Header set on API responses served from cache or synthesized locally.
pub const HEADER_FROM_CACHE: &str = "X-From-Cache";

/// Header set on the fully-empty synthetic API fallback.
pub const HEADER_CACHE_EMPTY: &str = "X-Cache-Empty";

/// Errors surfaced by the network backend.
#[derive(Error, Debug, Clone)]
pub enum FetchError {
    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Request mode, mirroring the platform's fetch modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    /// Document navigation (full page load).
    Navigate,
    /// Same-origin subresource fetch.
    SameOrigin,
    /// Cross-origin-capable fetch.
    #[default]
    Cors,
    /// No-CORS subresource fetch.
    NoCors,
}

/// A request intercepted by the worker.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Request URL (absolute).
    pub url: Url,

    /// HTTP method.
    pub method: String,

    /// Request mode.
    pub mode: RequestMode,

    /// Request headers.
    pub headers: HashMap<String, String>,

    /// Issuing client, when known.
    pub client_id: Option<String>,
}

impl FetchRequest {
    /// Create a plain GET request.
    pub fn get(url: Url) -> Self {
        Self {
            url,
            method: "GET".to_string(),
            mode: RequestMode::default(),
            headers: HashMap::new(),
            client_id: None,
        }
    }

    /// Create a navigation request.
    pub fn navigate(url: Url) -> Self {
        Self {
            mode: RequestMode::Navigate,
            ..Self::get(url)
        }
    }

    /// Create a request with an explicit method.
    pub fn with_method(url: Url, method: &str) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            ..Self::get(url)
        }
    }

    /// Check if this is a GET request.
    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }
}

/// A response resolved from network, cache, or synthesized locally.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// Status code.
    pub status: u16,

    /// Response headers.
    pub headers: HashMap<String, String>,

    /// Response body.
    pub body: Vec<u8>,

    /// Whether this response came out of a cache generation.
    pub from_cache: bool,
}

impl FetchResponse {
    /// Create a 200 response with the given body.
    pub fn ok(body: Vec<u8>) -> Self {
        Self {
            status: 200,
            headers: HashMap::new(),
            body,
            from_cache: false,
        }
    }

    /// Create a response with an arbitrary status.
    pub fn with_status(status: u16, body: Vec<u8>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body,
            from_cache: false,
        }
    }

    /// Create a JSON response (200, `Content-Type: application/json`).
    pub fn json(value: &serde_json::Value) -> Self {
        let mut response = Self::ok(value.to_string().into_bytes());
        response
            .headers
            .insert("Content-Type".to_string(), "application/json".to_string());
        response
    }

    /// Rehydrate a response from a cache entry.
    pub fn from_entry(entry: &CacheEntry) -> Self {
        Self {
            status: entry.status,
            headers: entry.headers.clone(),
            body: entry.body.clone(),
            from_cache: true,
        }
    }

    /// Snapshot this response into a cache entry for the given request.
    ///
    /// The entry owns independent copies of the headers and body, so the
    /// response handed back to the page and the stored snapshot never share
    /// mutable state.
    pub fn to_entry(&self, request: &FetchRequest) -> CacheEntry {
        CacheEntry::new(
            request.url.as_str(),
            &request.method,
            self.status,
            self.headers.clone(),
            self.body.clone(),
        )
    }

    /// Get a header value, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add a header, consuming and returning self.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    /// Check if this is a success (2xx) response.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The worker's only path to the real network.
///
/// Implementations must not retry or cache; both concerns belong to the
/// strategy executor.
pub trait Fetch: Send + Sync {
    /// Resolve a request against the network.
    fn fetch(&self, request: FetchRequest) -> BoxFuture<'static, Result<FetchResponse, FetchError>>;
}
