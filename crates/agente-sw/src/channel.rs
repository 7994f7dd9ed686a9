//! Control channel: typed commands from the foreground app.
//!
//! Payloads are decoded once at the boundary. Unknown or malformed message
//! types decode to `None` and are ignored, keeping the channel
//! forward-compatible; handlers never throw back to the sender.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::debug;

/// A command posted by the foreground page.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlMessage {
    /// Force the waiting worker to activate immediately.
    SkipWaiting,
    /// Ask for the current version token; replied over the message's
    /// reply channel.
    GetVersion,
    /// Delete all cache generations unconditionally (diagnostic reset).
    ClearCache,
    /// Pre-warm the data generation: either force-write the inline trips
    /// array, or fetch the trips route and store its response.
    CacheViajes { viajes: Option<JsonValue> },
}

impl ControlMessage {
    /// Decode a foreground message. Returns `None` for unknown types and
    /// shapes this worker does not understand.
    pub fn decode(value: &JsonValue) -> Option<Self> {
        let kind = value.get("type")?.as_str()?;
        match kind {
            "SKIP_WAITING" => Some(Self::SkipWaiting),
            "GET_VERSION" => Some(Self::GetVersion),
            "CLEAR_CACHE" => Some(Self::ClearCache),
            "CACHE_VIAJES" => Some(Self::CacheViajes {
                viajes: value.get("viajes").filter(|v| v.is_array()).cloned(),
            }),
            other => {
                debug!(kind = other, "ignoring unknown control message");
                None
            }
        }
    }
}

/// Reply to `GET_VERSION`, delivered over the provided reply channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionReply {
    /// The active generation pair's version token.
    pub version: String,
}
