//! End-to-end tests for the cache router: lifecycle, interception,
//! fallback chains, and the control channel, against a scripted network.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use agente_cache::CacheStorage;
use agente_sw::{
    CacheRouter, ClickAction, ClientMessage, Fetch, FetchError, FetchRequest, FetchResponse,
    SwConfig, VersionReply, WorkerState, HEADER_CACHE_EMPTY, HEADER_FROM_CACHE, SYNC_VIAJES_TAG,
};
use futures::future::BoxFuture;
use hashbrown::HashMap;
use tokio::sync::{oneshot, RwLock};
use url::Url;

const ORIGIN: &str = "https://miagenteviajes.app";

/// Scripted network backend: serves a fixed route map, 404s anything
/// unknown, and refuses everything while "offline".
struct FakeNet {
    routes: Mutex<HashMap<String, FetchResponse>>,
    offline: AtomicBool,
}

impl FakeNet {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            routes: Mutex::new(HashMap::new()),
            offline: AtomicBool::new(false),
        })
    }

    fn serve(&self, path: &str, response: FetchResponse) {
        let url = Url::parse(ORIGIN).unwrap().join(path).unwrap();
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), response);
    }

    fn serve_shell(&self) {
        self.serve("/", FetchResponse::ok(b"<html>shell</html>".to_vec()));
        self.serve(
            "/offline",
            FetchResponse::ok(b"<html>sin conexion</html>".to_vec()),
        );
        self.serve("/static/manifest.json", FetchResponse::ok(b"{}".to_vec()));
        self.serve("/static/favicon.svg", FetchResponse::ok(b"<svg/>".to_vec()));
        self.serve(
            "/static/icons/icon-192x192.png",
            FetchResponse::ok(b"png192".to_vec()),
        );
        self.serve(
            "/static/icons/icon-512x512.png",
            FetchResponse::ok(b"png512".to_vec()),
        );
        self.serve("/static/js/pwa.js", FetchResponse::ok(b"pwa()".to_vec()));
        self.serve(
            "/static/js/offline-storage.js",
            FetchResponse::ok(b"storage()".to_vec()),
        );
    }

    fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }
}

impl Fetch for FakeNet {
    fn fetch(
        &self,
        request: FetchRequest,
    ) -> BoxFuture<'static, Result<FetchResponse, FetchError>> {
        let result = if self.offline.load(Ordering::SeqCst) {
            Err(FetchError::NetworkUnavailable(request.url.to_string()))
        } else {
            Ok(self
                .routes
                .lock()
                .unwrap()
                .get(request.url.as_str())
                .cloned()
                .unwrap_or_else(|| FetchResponse::with_status(404, b"not found".to_vec())))
        };
        Box::pin(async move { result })
    }
}

fn config(version: &str) -> SwConfig {
    SwConfig::new(Url::parse(ORIGIN).unwrap(), version)
}

fn get(path: &str) -> FetchRequest {
    FetchRequest::get(Url::parse(ORIGIN).unwrap().join(path).unwrap())
}

fn navigate(path: &str) -> FetchRequest {
    FetchRequest::navigate(Url::parse(ORIGIN).unwrap().join(path).unwrap())
}

async fn installed_router(net: Arc<FakeNet>, version: &str) -> CacheRouter {
    let router = CacheRouter::new(config(version), net).unwrap();
    router.handle_install().await.unwrap();
    router.handle_activate().await.unwrap();
    router
}

#[tokio::test]
async fn install_precaches_and_activates() {
    let net = FakeNet::new();
    net.serve_shell();

    let router = CacheRouter::new(config("v1"), net).unwrap();
    assert_eq!(router.state().await, WorkerState::Parsed);

    router.handle_install().await.unwrap();
    assert_eq!(router.state().await, WorkerState::Installed);

    router.handle_activate().await.unwrap();
    assert_eq!(router.state().await, WorkerState::Active);

    let caches = router.caches.read().await;
    let cache = caches.get("static-v1").unwrap();
    assert_eq!(cache.len(), 8);
}

#[tokio::test]
async fn install_survives_missing_precache_asset() {
    let net = FakeNet::new();
    net.serve("/", FetchResponse::ok(b"<html>shell</html>".to_vec()));
    net.serve(
        "/offline",
        FetchResponse::ok(b"<html>sin conexion</html>".to_vec()),
    );
    // Everything else, including /missing.png, 404s.

    let mut cfg = config("v1");
    cfg.precache = vec!["/".into(), "/offline".into(), "/missing.png".into()];
    let router = CacheRouter::new(cfg, net).unwrap();

    router.handle_install().await.unwrap();
    assert_eq!(router.state().await, WorkerState::Installed);

    let caches = router.caches.read().await;
    let cache = caches.get("static-v1").unwrap();
    assert!(cache
        .match_request(&format!("{ORIGIN}/"))
        .is_some());
    assert!(cache
        .match_request(&format!("{ORIGIN}/offline"))
        .is_some());
    assert!(cache
        .match_request(&format!("{ORIGIN}/missing.png"))
        .is_none());
}

#[tokio::test]
async fn activate_requires_install_first() {
    let net = FakeNet::new();
    let router = CacheRouter::new(config("v1"), net).unwrap();
    assert!(router.handle_activate().await.is_err());
}

#[tokio::test]
async fn stale_generations_swept_on_upgrade() {
    let net = FakeNet::new();
    net.serve_shell();
    let caches = Arc::new(RwLock::new(CacheStorage::new()));

    let v1 = CacheRouter::with_caches(config("v1"), net.clone(), caches.clone()).unwrap();
    v1.handle_install().await.unwrap();
    v1.handle_activate().await.unwrap();
    caches.write().await.open("data-v1");

    let v2 = CacheRouter::with_caches(config("v2"), net, caches.clone()).unwrap();
    v2.handle_install().await.unwrap();
    caches.write().await.open("data-v2");
    {
        // Old generations survive until the new worker activates.
        let caches = caches.read().await;
        assert!(caches.has("static-v1"));
        assert!(caches.has("data-v1"));
    }

    v2.handle_activate().await.unwrap();
    let caches = caches.read().await;
    let mut names = caches.keys();
    names.sort();
    assert_eq!(names, vec!["data-v2", "static-v2"]);
}

#[tokio::test]
async fn same_version_activation_is_idempotent() {
    let net = FakeNet::new();
    net.serve_shell();
    let caches = Arc::new(RwLock::new(CacheStorage::new()));

    let first = CacheRouter::with_caches(config("v1"), net.clone(), caches.clone()).unwrap();
    first.handle_install().await.unwrap();
    first.handle_activate().await.unwrap();
    caches.write().await.open("data-v1");
    let entries_before = caches.read().await.get("static-v1").unwrap().len();

    let second = CacheRouter::with_caches(config("v1"), net, caches.clone()).unwrap();
    second.handle_install().await.unwrap();
    second.handle_activate().await.unwrap();

    let caches = caches.read().await;
    assert!(caches.has("static-v1"));
    assert!(caches.has("data-v1"));
    assert_eq!(caches.get("static-v1").unwrap().len(), entries_before);
}

#[tokio::test]
async fn non_get_and_cross_origin_pass_through() {
    let net = FakeNet::new();
    let router = installed_router(net, "v1").await;

    let post = FetchRequest::with_method(
        Url::parse(ORIGIN).unwrap().join("/api/viajes").unwrap(),
        "POST",
    );
    assert!(router.handle_fetch(post).await.is_none());

    let foreign = FetchRequest::get(Url::parse("https://cdn.example.com/lib.js").unwrap());
    assert!(router.handle_fetch(foreign).await.is_none());

    // Neither touched the data generation.
    let caches = router.caches.read().await;
    assert!(caches.get("data-v1").map(|c| c.is_empty()).unwrap_or(true));
}

#[tokio::test]
async fn offline_navigation_serves_offline_document() {
    let net = FakeNet::new();
    net.serve_shell();
    let router = installed_router(net.clone(), "v1").await;

    net.go_offline();
    let response = router
        .handle_fetch(navigate("/viajes/7"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.body, b"<html>sin conexion</html>");
}

#[tokio::test]
async fn api_serves_cached_copy_then_synthetic_empty() {
    let net = FakeNet::new();
    net.serve_shell();
    net.serve(
        "/api/viajes",
        FetchResponse::json(&serde_json::json!({"viajes": [{"id": 1, "destino": "EZE"}]})),
    );
    let router = installed_router(net.clone(), "v1").await;

    // First fetch succeeds and caches response A.
    let live = router.handle_fetch(get("/api/viajes")).await.unwrap().unwrap();
    assert!(live.header(HEADER_FROM_CACHE).is_none());

    // Second fetch fails; response A comes back marked from-cache.
    net.go_offline();
    let stale = router.handle_fetch(get("/api/viajes")).await.unwrap().unwrap();
    assert_eq!(stale.header(HEADER_FROM_CACHE), Some("true"));
    assert_eq!(stale.body, live.body);

    // A route never fetched while online synthesizes an empty shape.
    let empty = router
        .handle_fetch(get("/api/viajes/count"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(empty.status, 200);
    assert_eq!(empty.header(HEADER_CACHE_EMPTY), Some("true"));
    let body: serde_json::Value = serde_json::from_slice(&empty.body).unwrap();
    assert_eq!(body, serde_json::json!({"count": 0}));
}

#[tokio::test]
async fn static_asset_served_from_precache_when_offline() {
    let net = FakeNet::new();
    net.serve_shell();
    let router = installed_router(net.clone(), "v1").await;

    net.go_offline();
    let response = router
        .handle_fetch(get("/static/favicon.svg"))
        .await
        .unwrap()
        .unwrap();
    assert!(response.from_cache);
    assert_eq!(response.body, b"<svg/>");
}

#[tokio::test]
async fn get_version_replies_on_channel() {
    let net = FakeNet::new();
    let router = installed_router(net, "v3").await;

    let (tx, rx) = oneshot::channel();
    router
        .handle_message(&serde_json::json!({"type": "GET_VERSION"}), Some(tx))
        .await;
    assert_eq!(
        rx.await.unwrap(),
        VersionReply {
            version: "v3".to_string()
        }
    );
}

#[tokio::test]
async fn skip_waiting_activates_installed_worker() {
    let net = FakeNet::new();
    net.serve_shell();
    let router = CacheRouter::new(config("v1"), net).unwrap();
    router.handle_install().await.unwrap();
    assert_eq!(router.state().await, WorkerState::Installed);

    router
        .handle_message(&serde_json::json!({"type": "SKIP_WAITING"}), None)
        .await;
    assert_eq!(router.state().await, WorkerState::Active);
}

#[tokio::test]
async fn clear_cache_drops_every_generation() {
    let net = FakeNet::new();
    net.serve_shell();
    let router = installed_router(net, "v1").await;

    router
        .handle_message(&serde_json::json!({"type": "CLEAR_CACHE"}), None)
        .await;
    assert!(router.caches.read().await.keys().is_empty());
}

#[tokio::test]
async fn cache_viajes_inline_pre_warms_data_generation() {
    let net = FakeNet::new();
    net.serve_shell();
    let router = installed_router(net.clone(), "v1").await;

    router
        .handle_message(
            &serde_json::json!({"type": "CACHE_VIAJES", "viajes": [{"id": 9}]}),
            None,
        )
        .await;

    // The pre-warmed entry serves the API route while offline.
    net.go_offline();
    let response = router.handle_fetch(get("/api/viajes")).await.unwrap().unwrap();
    assert_eq!(response.header(HEADER_FROM_CACHE), Some("true"));
    assert!(response.header(HEADER_CACHE_EMPTY).is_none());
    let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(body["viajes"][0]["id"], 9);
}

#[tokio::test]
async fn cache_viajes_without_payload_fetches_trips_route() {
    let net = FakeNet::new();
    net.serve_shell();
    net.serve(
        "/api/viajes",
        FetchResponse::json(&serde_json::json!({"viajes": [{"id": 2}]})),
    );
    let router = installed_router(net.clone(), "v1").await;

    router
        .handle_message(&serde_json::json!({"type": "CACHE_VIAJES"}), None)
        .await;

    net.go_offline();
    let response = router.handle_fetch(get("/api/viajes")).await.unwrap().unwrap();
    let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(body["viajes"][0]["id"], 2);
}

#[tokio::test]
async fn unknown_messages_are_ignored() {
    let net = FakeNet::new();
    net.serve_shell();
    let router = installed_router(net, "v1").await;

    router
        .handle_message(&serde_json::json!({"type": "REFRESH_UI", "x": 1}), None)
        .await;
    router.handle_message(&serde_json::json!(42), None).await;
    assert_eq!(router.state().await, WorkerState::Active);
}

#[tokio::test]
async fn sync_broadcasts_to_open_pages() {
    let net = FakeNet::new();
    let router = installed_router(net, "v1").await;

    let (_id1, mut rx1) = router
        .connect_client(Url::parse(ORIGIN).unwrap())
        .await;
    let (_id2, mut rx2) = router
        .connect_client(Url::parse(ORIGIN).unwrap().join("/viajes/1").unwrap())
        .await;

    assert_eq!(router.handle_sync(SYNC_VIAJES_TAG).await, 2);
    assert_eq!(rx1.try_recv().unwrap(), ClientMessage::SyncViajes);
    assert_eq!(rx2.try_recv().unwrap(), ClientMessage::SyncViajes);

    assert_eq!(router.handle_sync("sync-otra-cosa").await, 0);
}

#[tokio::test]
async fn push_and_notification_click_flow() {
    let net = FakeNet::new();
    let router = installed_router(net, "v1").await;

    assert!(router.handle_push(None).is_none());

    let notification = router
        .handle_push(Some(br#"{"title": "Vuelo AR1140", "url": "/viajes/7"}"#))
        .unwrap();
    assert_eq!(notification.title, "Vuelo AR1140");

    // No open pages: click opens a new window.
    assert_eq!(
        router.handle_notification_click("open", &notification.url).await,
        ClickAction::OpenWindow {
            url: "/viajes/7".to_string()
        }
    );

    // With an open page, the click reuses it.
    let (id, _rx) = router.connect_client(Url::parse(ORIGIN).unwrap()).await;
    assert_eq!(
        router.handle_notification_click("open", &notification.url).await,
        ClickAction::FocusAndNavigate {
            client_id: id,
            url: "/viajes/7".to_string()
        }
    );

    assert_eq!(
        router.handle_notification_click("close", &notification.url).await,
        ClickAction::Dismiss
    );
}
