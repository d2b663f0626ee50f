//! Capabilities the engine consumes from its host.
//!
//! The engine never reaches for a global: every side effect goes through one
//! of these traits, so tests can drive it with in-memory doubles.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{ClientInfo, ClientMessage, ClientQuery, FetchedResponse, ResourceRequest};

use super::error::{ClientError, NetworkError, RegistrationError};

/// Origin access. Resolves to a response for any HTTP status and fails only
/// when no response could be obtained at all.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &ResourceRequest) -> Result<FetchedResponse, NetworkError>;
}

/// Connected clients and message delivery.
#[async_trait]
pub trait Clients: Send + Sync {
    async fn match_all(&self, query: ClientQuery) -> Vec<ClientInfo>;

    async fn post_message(&self, client: Uuid, message: &ClientMessage)
    -> Result<(), ClientError>;

    /// Take control of every connected client. Returns how many were claimed.
    async fn claim(&self) -> Result<usize, ClientError>;
}

/// The engine's own registration with its host.
#[async_trait]
pub trait Registration: Send + Sync {
    fn is_registered(&self) -> bool;

    async fn register(&self) -> Result<(), RegistrationError>;

    /// Returns whether a registration was actually removed.
    async fn unregister(&self) -> Result<bool, RegistrationError>;
}
