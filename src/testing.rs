//! In-memory doubles for the engine's capabilities.
//!
//! They let the lifecycle, routing, and control logic run without sockets,
//! in unit tests and in the integration suites alike.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use url::Url;
use uuid::Uuid;

use crate::application::{
    ClientError, Clients, Network, NetworkError, Registration, RegistrationError,
};
use crate::cache::lock::{mutex_lock, rw_read, rw_write};
use crate::cache::{CacheStorage, MemoryCacheStore, StoreError};
use crate::domain::{
    ClientInfo, ClientKind, ClientMessage, ClientQuery, FetchedResponse, Generation,
    RequestIdentity, ResourceRequest,
};

const SOURCE: &str = "testing";

fn normalize(url: &str) -> String {
    Url::parse(url)
        .map(|parsed| parsed.to_string())
        .unwrap_or_else(|_| url.to_string())
}

/// Scripted origin. Unknown URLs and offline mode fail like a dropped
/// connection.
#[derive(Default)]
pub struct FakeNetwork {
    routes: RwLock<HashMap<String, FetchedResponse>>,
    offline: AtomicBool,
    calls: AtomicUsize,
    requested: Mutex<Vec<String>>,
}

impl FakeNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(self, url: &str, response: FetchedResponse) -> Self {
        self.set_response(url, response);
        self
    }

    pub fn set_response(&self, url: &str, response: FetchedResponse) {
        rw_write(&self.routes, SOURCE, "set_response").insert(normalize(url), response);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// URLs fetched so far, in call order.
    pub fn requested(&self) -> Vec<String> {
        mutex_lock(&self.requested, SOURCE, "requested").clone()
    }
}

#[async_trait]
impl Network for FakeNetwork {
    async fn fetch(&self, request: &ResourceRequest) -> Result<FetchedResponse, NetworkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let url = request.url.to_string();
        mutex_lock(&self.requested, SOURCE, "fetch").push(url.clone());

        if self.offline.load(Ordering::SeqCst) {
            return Err(NetworkError::unavailable("network is offline"));
        }
        rw_read(&self.routes, SOURCE, "fetch")
            .get(&url)
            .cloned()
            .ok_or_else(|| NetworkError::unavailable(format!("connection refused: {url}")))
    }
}

#[derive(Default)]
struct ClientBook {
    clients: Vec<ClientInfo>,
    inbox: Vec<(Uuid, ClientMessage)>,
    failing: HashSet<Uuid>,
    fail_claim: bool,
}

/// Client registry that records every delivered message.
#[derive(Default)]
pub struct RecordingClients {
    book: Mutex<ClientBook>,
}

impl RecordingClients {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_claim(self) -> Self {
        mutex_lock(&self.book, SOURCE, "failing_claim").fail_claim = true;
        self
    }

    pub fn connect(&self, kind: ClientKind, controlled: bool) -> ClientInfo {
        let info = ClientInfo {
            id: Uuid::new_v4(),
            kind,
            controlled,
        };
        mutex_lock(&self.book, SOURCE, "connect")
            .clients
            .push(info.clone());
        info
    }

    pub fn fail_delivery_to(&self, client: Uuid) {
        mutex_lock(&self.book, SOURCE, "fail_delivery_to")
            .failing
            .insert(client);
    }

    pub fn clients(&self) -> Vec<ClientInfo> {
        mutex_lock(&self.book, SOURCE, "clients").clients.clone()
    }

    pub fn delivered(&self) -> Vec<(Uuid, ClientMessage)> {
        mutex_lock(&self.book, SOURCE, "delivered").inbox.clone()
    }

    pub fn messages_for(&self, client: Uuid) -> Vec<ClientMessage> {
        mutex_lock(&self.book, SOURCE, "messages_for")
            .inbox
            .iter()
            .filter(|(id, _)| *id == client)
            .map(|(_, message)| message.clone())
            .collect()
    }
}

#[async_trait]
impl Clients for RecordingClients {
    async fn match_all(&self, query: ClientQuery) -> Vec<ClientInfo> {
        mutex_lock(&self.book, SOURCE, "match_all")
            .clients
            .iter()
            .filter(|client| query.matches(client))
            .cloned()
            .collect()
    }

    async fn post_message(
        &self,
        client: Uuid,
        message: &ClientMessage,
    ) -> Result<(), ClientError> {
        let mut book = mutex_lock(&self.book, SOURCE, "post_message");
        if book.failing.contains(&client) {
            return Err(ClientError::Delivery(format!("{client} rejected delivery")));
        }
        if !book.clients.iter().any(|info| info.id == client) {
            return Err(ClientError::Disconnected(client));
        }
        book.inbox.push((client, message.clone()));
        Ok(())
    }

    async fn claim(&self) -> Result<usize, ClientError> {
        let mut book = mutex_lock(&self.book, SOURCE, "claim");
        if book.fail_claim {
            return Err(ClientError::Delivery("claim rejected".to_string()));
        }
        let mut claimed = 0;
        for client in book.clients.iter_mut().filter(|client| !client.controlled) {
            client.controlled = true;
            claimed += 1;
        }
        Ok(claimed)
    }
}

/// Registration flag that starts registered.
pub struct FlagRegistration {
    registered: AtomicBool,
    fail_unregister: bool,
    register_calls: AtomicUsize,
}

impl Default for FlagRegistration {
    fn default() -> Self {
        Self::new()
    }
}

impl FlagRegistration {
    pub fn new() -> Self {
        Self {
            registered: AtomicBool::new(true),
            fail_unregister: false,
            register_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_unregister(mut self) -> Self {
        self.fail_unregister = true;
        self
    }

    pub fn register_calls(&self) -> usize {
        self.register_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Registration for FlagRegistration {
    fn is_registered(&self) -> bool {
        self.registered.load(Ordering::SeqCst)
    }

    async fn register(&self) -> Result<(), RegistrationError> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        // Suspend like a real registration would, so callers can interleave.
        tokio::task::yield_now().await;
        self.registered.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn unregister(&self) -> Result<bool, RegistrationError> {
        if self.fail_unregister {
            return Err(RegistrationError::Rejected(
                "registration is locked".to_string(),
            ));
        }
        Ok(self.registered.swap(false, Ordering::SeqCst))
    }
}

/// Store whose every operation fails.
#[derive(Debug, Default)]
pub struct FailingStore;

impl FailingStore {
    pub fn new() -> Self {
        Self
    }

    fn error() -> StoreError {
        StoreError::backend("store unavailable")
    }
}

#[async_trait]
impl CacheStorage for FailingStore {
    async fn open(&self, _generation: &Generation) -> Result<(), StoreError> {
        Err(Self::error())
    }

    async fn put(
        &self,
        _generation: &Generation,
        _identity: RequestIdentity,
        _response: FetchedResponse,
    ) -> Result<(), StoreError> {
        Err(Self::error())
    }

    async fn lookup(
        &self,
        _generation: &Generation,
        _identity: &RequestIdentity,
    ) -> Result<Option<FetchedResponse>, StoreError> {
        Err(Self::error())
    }

    async fn match_any(
        &self,
        _identity: &RequestIdentity,
    ) -> Result<Option<FetchedResponse>, StoreError> {
        Err(Self::error())
    }

    async fn generations(&self) -> Result<Vec<Generation>, StoreError> {
        Err(Self::error())
    }

    async fn delete(&self, _generation: &Generation) -> Result<bool, StoreError> {
        Err(Self::error())
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// Memory store whose deletes start failing after a fixed number succeed.
///
/// Models a backend that gives out partway through a purge.
pub struct BrittleStore {
    inner: MemoryCacheStore,
    deletes_left: AtomicUsize,
}

impl BrittleStore {
    pub fn failing_after(deletes: usize) -> Self {
        Self {
            inner: MemoryCacheStore::new(),
            deletes_left: AtomicUsize::new(deletes),
        }
    }
}

#[async_trait]
impl CacheStorage for BrittleStore {
    async fn open(&self, generation: &Generation) -> Result<(), StoreError> {
        self.inner.open(generation).await
    }

    async fn put(
        &self,
        generation: &Generation,
        identity: RequestIdentity,
        response: FetchedResponse,
    ) -> Result<(), StoreError> {
        self.inner.put(generation, identity, response).await
    }

    async fn lookup(
        &self,
        generation: &Generation,
        identity: &RequestIdentity,
    ) -> Result<Option<FetchedResponse>, StoreError> {
        self.inner.lookup(generation, identity).await
    }

    async fn match_any(
        &self,
        identity: &RequestIdentity,
    ) -> Result<Option<FetchedResponse>, StoreError> {
        self.inner.match_any(identity).await
    }

    async fn generations(&self) -> Result<Vec<Generation>, StoreError> {
        self.inner.generations().await
    }

    async fn delete(&self, generation: &Generation) -> Result<bool, StoreError> {
        let allowed = self
            .deletes_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if !allowed {
            return Err(StoreError::backend(format!(
                "failed to delete `{generation}`"
            )));
        }
        self.inner.delete(generation).await
    }

    fn name(&self) -> &'static str {
        "brittle"
    }
}
