//! # Agente SW
//!
//! Service worker cache router for the Mi Agente Viajes PWA: fetch
//! interception, per-route caching strategies, cache generation lifecycle,
//! and the message-based control channel.
//!
//! ## Architecture
//!
//! ```text
//! CacheRouter
//!     ├── RouteTable          classify(url, method, mode) → RouteClass
//!     ├── StrategyExecutor    cache-first / network-first / fallbacks
//!     ├── Lifecycle           install → installed → activating → active
//!     ├── CacheStorage        static-<version> / data-<version>
//!     └── Clients             claim, SYNC_VIAJES broadcast
//!
//! Strategies per route:
//!     Api        → network first, cached copy, synthetic empty JSON
//!     Script     → network first, static generation fallback
//!     Static     → cache first
//!     Navigation → network first, offline document fallback
//!     Other      → network, any cached copy, no writes
//! ```
//!
//! Each `handle_*` method is the async task for one host event; the host
//! keeps the worker alive until the returned future settles.

use std::sync::Arc;

use agente_cache::{CacheNames, CacheStorage};
use agente_common::{AgenteError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::{debug, info, warn};
use url::Url;

pub mod channel;
pub mod clients;
pub mod fetch;
pub mod lifecycle;
pub mod push;
pub mod routes;
pub mod strategy;

pub use channel::{ControlMessage, VersionReply};
pub use clients::{ClientMessage, Clients};
pub use fetch::{
    Fetch, FetchError, FetchRequest, FetchResponse, RequestMode, HEADER_CACHE_EMPTY,
    HEADER_FROM_CACHE,
};
pub use lifecycle::{Lifecycle, WorkerState};
pub use push::{click_action, ClickAction, Notification, PushPayload};
pub use routes::{RouteClass, RouteTable};
pub use strategy::StrategyExecutor;

/// Background-sync tag that triggers a trip-mirror reconciliation.
pub const SYNC_VIAJES_TAG: &str = "sync-viajes";

// ==================== Configuration ====================

/// Worker configuration. Generation names, the precache manifest, and the
/// route surface all derive from this one record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwConfig {
    /// The app's own origin; anything else passes through untouched.
    pub origin: Url,

    /// Version token embedded in the generation names. Bumping it is the
    /// only mechanism that invalidates old caches.
    pub version: String,

    /// Critical assets fetched into the static generation at install.
    pub precache: Vec<String>,

    /// Data-route prefixes.
    pub api_prefixes: Vec<String>,

    /// Root of the static asset tree.
    pub static_root: String,

    /// Offline fallback document.
    pub offline_path: String,

    /// App shell document.
    pub shell_path: String,

    /// Activate straight out of install, without waiting for the foreground
    /// to send SKIP_WAITING.
    pub skip_waiting_on_install: bool,
}

impl SwConfig {
    /// Configuration for the served route surface, with the standard
    /// precache manifest.
    pub fn new(origin: Url, version: impl Into<String>) -> Self {
        Self {
            origin,
            version: version.into(),
            precache: [
                "/",
                "/offline",
                "/static/manifest.json",
                "/static/favicon.svg",
                "/static/icons/icon-192x192.png",
                "/static/icons/icon-512x512.png",
                "/static/js/pwa.js",
                "/static/js/offline-storage.js",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            api_prefixes: routes::API_PREFIXES.into_iter().map(String::from).collect(),
            static_root: routes::STATIC_ROOT.to_string(),
            offline_path: "/offline".to_string(),
            shell_path: "/".to_string(),
            skip_waiting_on_install: false,
        }
    }
}

// ==================== Cache Router ====================

/// The service worker: intercepts every request the app's pages issue and
/// resolves it from network and/or the active cache generation pair.
pub struct CacheRouter {
    config: SwConfig,
    names: CacheNames,
    routes: RouteTable,
    executor: StrategyExecutor,
    lifecycle: RwLock<Lifecycle>,

    /// Cache storage, the worker's only persistent state.
    pub caches: Arc<RwLock<CacheStorage>>,

    /// Connected pages.
    pub clients: Arc<RwLock<Clients>>,

    fetcher: Arc<dyn Fetch>,
}

impl CacheRouter {
    /// Create a router for the given configuration and network backend,
    /// with fresh cache storage.
    pub fn new(config: SwConfig, fetcher: Arc<dyn Fetch>) -> Result<Self> {
        Self::with_caches(config, fetcher, Arc::new(RwLock::new(CacheStorage::new())))
    }

    /// Create a router over existing cache storage. Cache storage outlives
    /// any one worker instance; a new worker version opens the same store
    /// its predecessor populated.
    pub fn with_caches(
        config: SwConfig,
        fetcher: Arc<dyn Fetch>,
        caches: Arc<RwLock<CacheStorage>>,
    ) -> Result<Self> {
        let names = CacheNames::for_version(&config.version)
            .map_err(|e| AgenteError::config(e.to_string()))?;

        let offline_url = config
            .origin
            .join(&config.offline_path)
            .map_err(|e| AgenteError::config(format!("bad offline path: {e}")))?;

        let clients = Arc::new(RwLock::new(Clients::new()));

        let routes = RouteTable::new(
            config.origin.clone(),
            config.api_prefixes.clone(),
            config.static_root.clone(),
        );
        let executor = StrategyExecutor::new(
            caches.clone(),
            fetcher.clone(),
            names.clone(),
            offline_url.to_string(),
        );

        Ok(Self {
            config,
            names,
            routes,
            executor,
            lifecycle: RwLock::new(Lifecycle::new()),
            caches,
            clients,
            fetcher,
        })
    }

    /// The version token of the active generation pair.
    pub fn version(&self) -> &str {
        self.names.version()
    }

    /// The active generation names.
    pub fn cache_names(&self) -> &CacheNames {
        &self.names
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> WorkerState {
        self.lifecycle.read().await.state()
    }

    // ==================== Lifecycle events ====================

    /// Install: open the static generation and best-effort-populate it from
    /// the precache manifest. One failing asset never aborts the batch.
    pub async fn handle_install(&self) -> Result<()> {
        self.lifecycle.write().await.begin_install()?;
        info!(version = %self.names.version(), "installing");

        // The generation must exist even if every precache fetch fails.
        self.caches
            .write()
            .await
            .open(self.names.static_cache());

        for path in &self.config.precache {
            let url = match self.config.origin.join(path) {
                Ok(url) => url,
                Err(err) => {
                    warn!(path = %path, error = %err, "bad precache path, skipping");
                    continue;
                }
            };
            let request = FetchRequest::get(url);
            match self.fetcher.fetch(request.clone()).await {
                Ok(response) if response.is_success() => {
                    let mut caches = self.caches.write().await;
                    caches
                        .open(self.names.static_cache())
                        .put(response.to_entry(&request));
                }
                Ok(response) => {
                    warn!(path = %path, status = response.status, "precache asset skipped");
                }
                Err(err) => {
                    warn!(path = %path, error = %err, "precache asset failed, skipping");
                }
            }
        }

        let skip_waiting = {
            let mut lifecycle = self.lifecycle.write().await;
            lifecycle.finish_install();
            if self.config.skip_waiting_on_install {
                lifecycle.request_skip_waiting();
            }
            lifecycle.skip_waiting_requested()
        };
        info!(version = %self.names.version(), "installed");

        if skip_waiting {
            self.handle_activate().await?;
        }
        Ok(())
    }

    /// Activate: sweep every generation outside the current pair, then claim
    /// all open pages. The sweep completes before claiming starts, so no
    /// request is ever served against a generation mid-deletion.
    pub async fn handle_activate(&self) -> Result<()> {
        self.lifecycle.write().await.begin_activate()?;
        info!(version = %self.names.version(), "activating");

        let deleted = self.caches.write().await.delete_stale(&self.names);
        if !deleted.is_empty() {
            info!(?deleted, "deleted stale cache generations");
        }

        let claimed = self.clients.write().await.claim();
        debug!(claimed, "claimed open pages");

        self.lifecycle.write().await.finish_activate();
        info!(version = %self.names.version(), "active");
        Ok(())
    }

    // ==================== Fetch events ====================

    /// Intercept one request. `None` means pass through untouched (non-GET,
    /// cross-origin); otherwise the classified strategy resolves it.
    pub async fn handle_fetch(&self, request: FetchRequest) -> Option<Result<FetchResponse>> {
        let class = self.routes.classify(&request)?;
        debug!(url = %request.url, ?class, "intercepted");

        let result = match class {
            RouteClass::Api => self.executor.network_first_api(&request).await,
            RouteClass::Script => self.executor.network_first(&request).await,
            RouteClass::Static => self.executor.cache_first(&request).await,
            RouteClass::Navigation => {
                self.executor
                    .network_first_with_page_fallback(&request)
                    .await
            }
            RouteClass::Other => self.executor.network_with_cache_fallback(&request).await,
        };
        Some(result)
    }

    // ==================== Control channel ====================

    /// Handle one foreground message. Unknown types are ignored; failures
    /// are logged, never returned to the sender. A reply is only sent where
    /// the command expects one and a reply channel was provided.
    pub async fn handle_message(
        &self,
        message: &JsonValue,
        reply: Option<oneshot::Sender<VersionReply>>,
    ) {
        let Some(command) = ControlMessage::decode(message) else {
            return;
        };

        match command {
            ControlMessage::SkipWaiting => {
                let waiting = {
                    let mut lifecycle = self.lifecycle.write().await;
                    lifecycle.request_skip_waiting();
                    lifecycle.state() == WorkerState::Installed
                };
                if waiting {
                    if let Err(err) = self.handle_activate().await {
                        warn!(error = %err, "skip-waiting activation failed");
                    }
                }
            }
            ControlMessage::GetVersion => {
                if let Some(reply) = reply {
                    let _ = reply.send(VersionReply {
                        version: self.names.version().to_string(),
                    });
                }
            }
            ControlMessage::ClearCache => {
                let dropped = self.caches.write().await.clear();
                info!(dropped, "cleared all cache generations");
            }
            ControlMessage::CacheViajes { viajes } => {
                if let Err(err) = self.cache_viajes(viajes).await {
                    warn!(error = %err, "CACHE_VIAJES failed");
                }
            }
        }
    }

    /// Pre-warm the data generation with the trips route, either from an
    /// inline payload or a forced fetch.
    async fn cache_viajes(&self, viajes: Option<JsonValue>) -> Result<()> {
        let trips_path = self
            .config
            .api_prefixes
            .first()
            .ok_or_else(|| AgenteError::config("no API prefixes configured"))?;
        let url = self
            .config
            .origin
            .join(trips_path)
            .map_err(|e| AgenteError::config(format!("bad trips path: {e}")))?;
        let request = FetchRequest::get(url);

        let response = match viajes {
            Some(viajes) => FetchResponse::json(&serde_json::json!({ "viajes": viajes })),
            None => {
                let response = self
                    .fetcher
                    .fetch(request.clone())
                    .await
                    .map_err(|e| AgenteError::network_with_source("trips prefetch failed", e))?;
                if !response.is_success() {
                    return Err(AgenteError::network(format!(
                        "trips prefetch returned {}",
                        response.status
                    )));
                }
                response
            }
        };

        let mut caches = self.caches.write().await;
        caches
            .open(self.names.data_cache())
            .put(response.to_entry(&request));
        info!(url = %request.url, "pre-warmed trips cache");
        Ok(())
    }

    // ==================== Push / sync events ====================

    /// Decode a push event into a displayable notification, or nothing when
    /// the event carried no decodable payload.
    pub fn handle_push(&self, data: Option<&[u8]>) -> Option<Notification> {
        let payload = PushPayload::decode(data?)?;
        Some(payload.resolve())
    }

    /// Decide what a notification click does.
    pub async fn handle_notification_click(&self, action: &str, url: &str) -> ClickAction {
        let clients = self.clients.read().await;
        click_action(action, url, &clients, &self.config.origin)
    }

    /// Background sync fired: tell every open page to reconcile its local
    /// trip mirror. Returns the number of pages notified.
    pub async fn handle_sync(&self, tag: &str) -> usize {
        if tag != SYNC_VIAJES_TAG {
            debug!(tag, "ignoring unknown sync tag");
            return 0;
        }
        let notified = self
            .clients
            .write()
            .await
            .broadcast(&ClientMessage::SyncViajes);
        info!(notified, "broadcast SYNC_VIAJES");
        notified
    }

    // ==================== Host integration ====================

    /// Register an open page with the worker.
    pub async fn connect_client(
        &self,
        url: Url,
    ) -> (String, mpsc::UnboundedReceiver<ClientMessage>) {
        self.clients.write().await.connect(url)
    }

    /// Drop a closed page.
    pub async fn disconnect_client(&self, id: &str) -> bool {
        self.clients.write().await.remove(id)
    }
}
