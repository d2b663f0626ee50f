//! Connected clients as seen by the engine.

use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientKind {
    Window,
    Worker,
    SharedWorker,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientInfo {
    pub id: Uuid,
    pub kind: ClientKind,
    /// Whether the client is served by the active engine.
    pub controlled: bool,
}

/// Filter for enumerating connected clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientQuery {
    pub kind: Option<ClientKind>,
    pub include_uncontrolled: bool,
}

impl ClientQuery {
    /// Every window client, controlled or not. Used for broadcasts.
    pub fn all_windows() -> Self {
        Self {
            kind: Some(ClientKind::Window),
            include_uncontrolled: true,
        }
    }

    pub fn matches(&self, client: &ClientInfo) -> bool {
        let kind_ok = self.kind.is_none_or(|kind| kind == client.kind);
        kind_ok && (self.include_uncontrolled || client.controlled)
    }
}
