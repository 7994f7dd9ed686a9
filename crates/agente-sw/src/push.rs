//! Push payload decoding and notification building.
//!
//! The push service delivers loosely-shaped JSON (FCM wraps fields in
//! `notification`/`webpush` blocks, direct web push puts them at the top
//! level, and some senders tuck them into the `data` bag). The payload is
//! decoded once here into an explicit record; every field then resolves
//! through a documented precedence with bundled defaults, so a notification
//! can always be shown.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, warn};
use url::Url;

use crate::clients::Clients;

/// Fallback notification title (the app name).
pub const DEFAULT_TITLE: &str = "Mi Agente Viajes";

/// Fallback notification body.
pub const DEFAULT_BODY: &str = "Tienes una actualización";

/// Bundled notification icon.
pub const DEFAULT_ICON: &str = "/static/icons/icon-192x192.png";

/// Bundled badge icon.
pub const DEFAULT_BADGE: &str = "/static/icons/icon-72x72.png";

/// Collapse tag grouping successive notifications.
pub const DEFAULT_TAG: &str = "mi-agente-viajes";

/// Where a click lands when the payload names no URL.
pub const DEFAULT_URL: &str = "/";

const VIBRATE_PATTERN: [u32; 3] = [100, 50, 100];

/// Notification fields as they appear inside an FCM `notification` or
/// `webpush.notification` block.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationFields {
    pub title: Option<String>,
    pub body: Option<String>,
    pub icon: Option<String>,
    pub badge: Option<String>,
}

/// FCM `webpush` block.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebpushBlock {
    pub notification: Option<NotificationFields>,
}

/// Raw push payload, any subset of fields may be absent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PushPayload {
    pub title: Option<String>,
    pub body: Option<String>,
    pub icon: Option<String>,
    pub badge: Option<String>,
    pub tag: Option<String>,
    pub url: Option<String>,
    pub notification: Option<NotificationFields>,
    pub webpush: Option<WebpushBlock>,
    pub data: Option<JsonValue>,
}

impl PushPayload {
    /// Decode a push event body. Invalid JSON yields `None`; a push with no
    /// decodable payload shows nothing, it is not an error.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        match serde_json::from_slice(bytes) {
            Ok(payload) => Some(payload),
            Err(err) => {
                warn!(error = %err, "undecodable push payload, dropping");
                None
            }
        }
    }

    /// Resolve into a displayable notification.
    ///
    /// Per-field precedence: `webpush.notification` > `notification` >
    /// top level > `data` bag > bundled default.
    pub fn resolve(&self) -> Notification {
        fn none(_: &NotificationFields) -> Option<&str> {
            None
        }

        Notification {
            title: self.pick(|n| n.title.as_deref(), self.title.as_deref(), "title", DEFAULT_TITLE),
            body: self.pick(|n| n.body.as_deref(), self.body.as_deref(), "body", DEFAULT_BODY),
            icon: self.pick(|n| n.icon.as_deref(), self.icon.as_deref(), "icon", DEFAULT_ICON),
            badge: self.pick(|n| n.badge.as_deref(), self.badge.as_deref(), "badge", DEFAULT_BADGE),
            tag: self.pick(none, self.tag.as_deref(), "tag", DEFAULT_TAG),
            url: self.pick(none, self.url.as_deref(), "url", DEFAULT_URL),
            vibrate: VIBRATE_PATTERN.to_vec(),
            actions: vec![
                NotificationAction {
                    action: "open".to_string(),
                    title: "Ver".to_string(),
                },
                NotificationAction {
                    action: "close".to_string(),
                    title: "Cerrar".to_string(),
                },
            ],
        }
    }

    fn pick<'a>(
        &'a self,
        field: fn(&'a NotificationFields) -> Option<&'a str>,
        top_level: Option<&'a str>,
        data_key: &str,
        default: &'a str,
    ) -> String {
        self.webpush
            .as_ref()
            .and_then(|w| w.notification.as_ref())
            .and_then(field)
            .or_else(|| self.notification.as_ref().and_then(field))
            .or(top_level)
            .or_else(|| self.data_str(data_key))
            .unwrap_or(default)
            .to_string()
    }

    fn data_str(&self, key: &str) -> Option<&str> {
        self.data.as_ref()?.get(key)?.as_str()
    }
}

/// A fully-resolved, displayable notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub tag: String,
    /// Where a click on the notification navigates.
    pub url: String,
    pub vibrate: Vec<u32>,
    pub actions: Vec<NotificationAction>,
}

/// A notification action button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
}

/// Routing decision for a notification click.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickAction {
    /// Close the notification, nothing else.
    Dismiss,
    /// Reuse an open same-origin page: navigate it and bring it forward.
    FocusAndNavigate { client_id: String, url: String },
    /// No open page; open a fresh window.
    OpenWindow { url: String },
}

/// Decide what a notification click does.
///
/// The `close` action only dismisses. Any other click prefers an already
/// open same-origin page over spawning a new window.
pub fn click_action(action: &str, url: &str, clients: &Clients, origin: &Url) -> ClickAction {
    if action == "close" {
        return ClickAction::Dismiss;
    }

    match clients.find_same_origin(origin) {
        Some(client) => {
            debug!(client = %client.id, url, "routing notification click to open page");
            ClickAction::FocusAndNavigate {
                client_id: client.id.clone(),
                url: url.to_string(),
            }
        }
        None => ClickAction::OpenWindow {
            url: url.to_string(),
        },
    }
}
