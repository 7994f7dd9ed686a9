//! Route classification.
//!
//! A pure function of (origin, pathname, method, mode): nothing here is
//! persisted, and the result only ever selects a strategy.

use url::Url;

use crate::fetch::{FetchRequest, RequestMode};

/// Data-route prefixes served by the API.
pub const API_PREFIXES: [&str; 2] = ["/api/viajes", "/api/viajes/count"];

/// Root of the static asset tree.
pub const STATIC_ROOT: &str = "/static/";

/// Script-file suffixes.
const SCRIPT_SUFFIXES: [&str; 2] = [".js", ".mjs"];

/// Recognized asset suffixes (style, image, icon, font).
const ASSET_SUFFIXES: [&str; 6] = [".css", ".png", ".svg", ".ico", ".webp", ".woff2"];

/// Strategy-selecting category for an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// Data route (`/api/viajes`, `/api/viajes/count`).
    Api,
    /// Script file.
    Script,
    /// Static asset.
    Static,
    /// Document navigation.
    Navigation,
    /// Anything else on our origin.
    Other,
}

/// Route classifier bound to the app's origin.
#[derive(Debug, Clone)]
pub struct RouteTable {
    origin: Url,
    api_prefixes: Vec<String>,
    static_root: String,
}

impl RouteTable {
    /// Create a classifier for the given origin and route surface.
    pub fn new(origin: Url, api_prefixes: Vec<String>, static_root: String) -> Self {
        Self {
            origin,
            api_prefixes,
            static_root,
        }
    }

    /// Classify a request, or return `None` when it must pass through
    /// untouched (side-effecting methods, cross-origin resources).
    ///
    /// Precedence: Api > Script > Static > Navigation > Other, since a path
    /// can satisfy several predicates.
    pub fn classify(&self, request: &FetchRequest) -> Option<RouteClass> {
        // Side-effecting requests are never cached or replayed.
        if !request.is_get() {
            return None;
        }

        // Third-party resources stay out of our caches.
        if request.url.origin() != self.origin.origin() {
            return None;
        }

        let path = request.url.path();

        if self.api_prefixes.iter().any(|p| path.starts_with(p.as_str())) {
            return Some(RouteClass::Api);
        }

        if SCRIPT_SUFFIXES.iter().any(|s| path.ends_with(s)) {
            return Some(RouteClass::Script);
        }

        if path.starts_with(&self.static_root) || ASSET_SUFFIXES.iter().any(|s| path.ends_with(s))
        {
            return Some(RouteClass::Static);
        }

        if request.mode == RequestMode::Navigate {
            return Some(RouteClass::Navigation);
        }

        Some(RouteClass::Other)
    }
}
