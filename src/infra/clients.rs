//! Registry of connected clients and their outbound message queues.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::application::{ClientError, Clients};
use crate::domain::{ClientInfo, ClientKind, ClientMessage, ClientQuery};

struct ClientSlot {
    kind: ClientKind,
    controlled: bool,
    sender: mpsc::UnboundedSender<ClientMessage>,
}

/// Shared between the HTTP host, which connects clients, and the engine,
/// which enumerates and messages them.
#[derive(Default, Clone)]
pub struct ClientHub {
    clients: Arc<DashMap<Uuid, ClientSlot>>,
}

impl ClientHub {
    pub fn new() -> Self {
        Self {
            clients: Arc::new(DashMap::new()),
        }
    }

    /// Register a client. It stays connected until the returned handle drops.
    pub fn connect(&self, kind: ClientKind) -> ClientConnection {
        let id = Uuid::new_v4();
        let (sender, receiver) = mpsc::unbounded_channel();
        self.clients.insert(
            id,
            ClientSlot {
                kind,
                controlled: false,
                sender,
            },
        );
        debug!(target = "quay::clients", client = %id, ?kind, "client connected");
        ClientConnection {
            info: ClientInfo {
                id,
                kind,
                controlled: false,
            },
            receiver,
            _guard: ConnectionGuard {
                id,
                clients: Arc::clone(&self.clients),
            },
        }
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

pub struct ClientConnection {
    pub info: ClientInfo,
    receiver: mpsc::UnboundedReceiver<ClientMessage>,
    _guard: ConnectionGuard,
}

impl ClientConnection {
    pub fn id(&self) -> Uuid {
        self.info.id
    }

    /// Next message for this client, or `None` once the hub is gone.
    pub async fn recv(&mut self) -> Option<ClientMessage> {
        self.receiver.recv().await
    }
}

struct ConnectionGuard {
    id: Uuid,
    clients: Arc<DashMap<Uuid, ClientSlot>>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.clients.remove(&self.id);
        debug!(target = "quay::clients", client = %self.id, "client disconnected");
    }
}

#[async_trait]
impl Clients for ClientHub {
    async fn match_all(&self, query: ClientQuery) -> Vec<ClientInfo> {
        self.clients
            .iter()
            .map(|entry| ClientInfo {
                id: *entry.key(),
                kind: entry.kind,
                controlled: entry.controlled,
            })
            .filter(|info| query.matches(info))
            .collect()
    }

    async fn post_message(
        &self,
        client: Uuid,
        message: &ClientMessage,
    ) -> Result<(), ClientError> {
        let slot = self
            .clients
            .get(&client)
            .ok_or(ClientError::Disconnected(client))?;
        slot.sender
            .send(message.clone())
            .map_err(|_| ClientError::Disconnected(client))
    }

    async fn claim(&self) -> Result<usize, ClientError> {
        let mut claimed = 0;
        for mut entry in self.clients.iter_mut() {
            if !entry.controlled {
                entry.controlled = true;
                claimed += 1;
            }
        }
        Ok(claimed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connected_client_receives_messages() {
        let hub = ClientHub::new();
        let mut connection = hub.connect(ClientKind::Window);

        hub.post_message(connection.id(), &ClientMessage::CacheCleared)
            .await
            .expect("deliver");
        assert_eq!(connection.recv().await, Some(ClientMessage::CacheCleared));
    }

    #[tokio::test]
    async fn dropping_connection_disconnects() {
        let hub = ClientHub::new();
        let connection = hub.connect(ClientKind::Window);
        let id = connection.id();
        assert_eq!(hub.len(), 1);

        drop(connection);
        assert!(hub.is_empty());
        let err = hub
            .post_message(id, &ClientMessage::ReloadPage)
            .await
            .expect_err("gone");
        assert!(matches!(err, ClientError::Disconnected(_)));
    }

    #[tokio::test]
    async fn claim_controls_new_clients_once() {
        let hub = ClientHub::new();
        let _first = hub.connect(ClientKind::Window);
        let _second = hub.connect(ClientKind::Worker);

        assert_eq!(hub.claim().await.expect("claim"), 2);
        assert_eq!(hub.claim().await.expect("claim"), 0);

        let controlled_only = ClientQuery {
            kind: None,
            include_uncontrolled: false,
        };
        assert_eq!(hub.match_all(controlled_only).await.len(), 2);
        assert_eq!(hub.match_all(ClientQuery::all_windows()).await.len(), 1);
    }
}
