//! Control-channel messages exchanged with connected clients.

use serde::{Deserialize, Serialize, Serializer};

/// Inbound instruction from a connected client.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ControlMessage {
    #[serde(default)]
    pub action: ControlAction,
}

impl ControlMessage {
    pub fn clear_cache() -> Self {
        Self {
            action: ControlAction::ClearCache,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ControlAction {
    /// Delete every generation, unregister, and ask clients to reload.
    ClearCache,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Outbound notification delivered to every connected window client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    CacheCleared,
    ReloadPage,
    CacheClearFailed { error: String },
}

impl ClientMessage {
    pub fn label(&self) -> &'static str {
        match self {
            Self::CacheCleared => "cacheCleared",
            Self::ReloadPage => "reloadPage",
            Self::CacheClearFailed { .. } => "cacheClearFailed",
        }
    }
}

#[derive(Serialize)]
struct WireMessage<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    action: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

impl Serialize for ClientMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = match self {
            Self::CacheCleared => WireMessage {
                status: Some("cacheCleared"),
                action: None,
                error: None,
            },
            Self::ReloadPage => WireMessage {
                status: None,
                action: Some("reloadPage"),
                error: None,
            },
            Self::CacheClearFailed { error } => WireMessage {
                status: Some("cacheClearFailed"),
                action: None,
                error: Some(error),
            },
        };
        wire.serialize(serializer)
    }
}
