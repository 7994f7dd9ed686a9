//! Controlled-page registry.
//!
//! The worker never touches the page DOM; its only outbound path is posting
//! typed messages to connected clients, and the only bulk operation is
//! claiming control of every open page at activation.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::debug;
use url::Url;

/// Messages posted from the worker to foreground clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Background sync fired; re-fetch and reconcile the local trip mirror.
    #[serde(rename = "SYNC_VIAJES")]
    SyncViajes,
}

/// A client (open page) reachable from the worker.
#[derive(Debug)]
pub struct Client {
    /// Client ID.
    pub id: String,

    /// Page URL.
    pub url: Url,

    /// Whether this worker controls the page.
    pub controlled: bool,

    /// Whether the page is focused.
    pub focused: bool,

    tx: mpsc::UnboundedSender<ClientMessage>,
}

impl Client {
    /// Post a message to this client. Delivery failures (page gone) are
    /// reported, not propagated.
    pub fn post_message(&self, message: ClientMessage) -> bool {
        self.tx.send(message).is_ok()
    }
}

/// Registry of open pages.
#[derive(Debug, Default)]
pub struct Clients {
    clients: HashMap<String, Client>,
}

impl Clients {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect a page, returning its ID and the message receiver the
    /// foreground listens on.
    pub fn connect(&mut self, url: Url) -> (String, mpsc::UnboundedReceiver<ClientMessage>) {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        let id = format!("client-{}", COUNTER.fetch_add(1, Ordering::Relaxed));

        let (tx, rx) = mpsc::unbounded_channel();
        self.clients.insert(
            id.clone(),
            Client {
                id: id.clone(),
                url,
                controlled: false,
                focused: false,
                tx,
            },
        );
        (id, rx)
    }

    /// Get a client by ID.
    pub fn get(&self, id: &str) -> Option<&Client> {
        self.clients.get(id)
    }

    /// Disconnect a page.
    pub fn remove(&mut self, id: &str) -> bool {
        self.clients.remove(id).is_some()
    }

    /// Number of connected pages.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Check if no pages are connected.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Claim control of every open page, so the worker starts serving
    /// already-open tabs without a reload.
    pub fn claim(&mut self) -> usize {
        let mut claimed = 0;
        for client in self.clients.values_mut() {
            if !client.controlled {
                client.controlled = true;
                claimed += 1;
            }
        }
        debug!(claimed, "claimed clients");
        claimed
    }

    /// Post a message to every connected page, dropping clients whose
    /// receiving end is gone. Returns the number of deliveries.
    pub fn broadcast(&mut self, message: &ClientMessage) -> usize {
        let mut delivered = 0;
        self.clients.retain(|_, client| {
            if client.post_message(message.clone()) {
                delivered += 1;
                true
            } else {
                debug!(id = %client.id, "dropping disconnected client");
                false
            }
        });
        delivered
    }

    /// Find any client on the given origin, preferring a focused one.
    pub fn find_same_origin(&self, origin: &Url) -> Option<&Client> {
        let mut candidate = None;
        for client in self.clients.values() {
            if client.url.origin() == origin.origin() {
                if client.focused {
                    return Some(client);
                }
                candidate.get_or_insert(client);
            }
        }
        candidate
    }

    /// Mark a client focused (host callback).
    pub fn set_focused(&mut self, id: &str, focused: bool) {
        if let Some(client) = self.clients.get_mut(id) {
            client.focused = focused;
        }
    }
}
