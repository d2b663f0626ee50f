//! The engine façade the host dispatches lifecycle, fetch and control events into.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, watch};
use tracing::info;

use crate::cache::{CacheConfig, CachePolicy, CacheStorage, GenerationRegistry};
use crate::domain::{ControlMessage, DomainError, ResourceRequest};

use super::control::{ControlChannel, ControlOutcome};
use super::error::LifecycleError;
use super::lifecycle::{
    ActivateReport, InstallReport, LifecycleController, LifecycleHandle, LifecycleState,
};
use super::ports::{Clients, Network, Registration};
use super::router::{FetchOutcome, FetchRouter};
use super::writes::WriteTracker;

/// Entry points a host runtime dispatches into.
#[async_trait]
pub trait WorkerHooks: Send + Sync {
    async fn on_install(&self) -> Result<InstallReport, LifecycleError>;

    async fn on_activate(&self) -> Result<ActivateReport, LifecycleError>;

    /// Route one intercepted request. Never fails: every path resolves to an
    /// outcome, at worst an offline substitute.
    async fn on_fetch(&self, request: ResourceRequest) -> FetchOutcome;

    async fn on_message(&self, message: ControlMessage) -> ControlOutcome;
}

/// Capabilities the engine is built from.
#[derive(Clone)]
pub struct Capabilities {
    pub storage: Arc<dyn CacheStorage>,
    pub network: Arc<dyn Network>,
    pub clients: Arc<dyn Clients>,
    pub registration: Arc<dyn Registration>,
}

pub struct Engine {
    config: CacheConfig,
    router: FetchRouter,
    lifecycle: LifecycleController,
    control: ControlChannel,
    registration: Arc<dyn Registration>,
    writes: WriteTracker,
    state: LifecycleHandle,
    registering: Mutex<()>,
}

impl Engine {
    /// Build an engine for `config`.
    ///
    /// Fails when a manifest entry or the default document cannot be resolved
    /// against the configured scope.
    pub fn new(config: CacheConfig, capabilities: Capabilities) -> Result<Self, DomainError> {
        let policy = CachePolicy::new(&config)?;
        let precache = config.manifest.requests(&config.scope)?;
        let state = LifecycleHandle::new();
        let writes = WriteTracker::new();

        let router = FetchRouter::new(
            Arc::new(policy),
            Arc::clone(&capabilities.storage),
            Arc::clone(&capabilities.network),
            config.generation.clone(),
            writes.clone(),
        );
        let lifecycle = LifecycleController::new(
            Arc::clone(&capabilities.storage),
            Arc::clone(&capabilities.network),
            Arc::clone(&capabilities.clients),
            GenerationRegistry::new(config.generation.clone()),
            precache,
            state.clone(),
        );
        let control = ControlChannel::new(
            capabilities.storage,
            capabilities.clients,
            Arc::clone(&capabilities.registration),
            state.clone(),
        );

        Ok(Self {
            config,
            router,
            lifecycle,
            control,
            registration: capabilities.registration,
            writes,
            state,
            registering: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn state(&self) -> LifecycleState {
        self.state.get()
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    pub fn is_registered(&self) -> bool {
        self.registration.is_registered()
    }

    /// Wait for every opportunistic cache write started so far.
    pub async fn settle(&self) {
        self.writes.settle().await;
    }

    /// Register again after a purge, then run install and activate.
    ///
    /// A no-op when the engine is still registered. Concurrent calls are
    /// serialized, so install and activate run at most once per purge.
    pub async fn register(&self) -> Result<LifecycleState, LifecycleError> {
        let _registering = self.registering.lock().await;
        if self.registration.is_registered() {
            return Ok(self.state.get());
        }
        self.registration.register().await?;
        info!(
            target = "quay::engine",
            generation = %self.config.generation,
            "re-registered"
        );
        self.on_install().await?;
        self.on_activate().await?;
        Ok(self.state.get())
    }
}

#[async_trait]
impl WorkerHooks for Engine {
    async fn on_install(&self) -> Result<InstallReport, LifecycleError> {
        self.lifecycle.install().await
    }

    async fn on_activate(&self) -> Result<ActivateReport, LifecycleError> {
        self.lifecycle.activate().await
    }

    async fn on_fetch(&self, request: ResourceRequest) -> FetchOutcome {
        self.router.route(&request).await
    }

    async fn on_message(&self, message: ControlMessage) -> ControlOutcome {
        self.control.handle(message).await
    }
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;
    use crate::cache::MemoryCacheStore;
    use crate::domain::{FetchedResponse, PrecacheManifest};
    use crate::testing::{FakeNetwork, FlagRegistration, RecordingClients};

    fn engine(registration: Arc<FlagRegistration>) -> Engine {
        let config = CacheConfig::new("v1", Url::parse("https://app.test/").expect("scope"))
            .with_manifest(PrecacheManifest::new(["./"]));
        let network = FakeNetwork::new().with_response("https://app.test/", FetchedResponse::ok("home"));
        Engine::new(
            config,
            Capabilities {
                storage: Arc::new(MemoryCacheStore::new()),
                network: Arc::new(network),
                clients: Arc::new(RecordingClients::new()),
                registration,
            },
        )
        .expect("engine")
    }

    #[tokio::test]
    async fn starts_parsed() {
        let engine = engine(Arc::new(FlagRegistration::new()));
        assert_eq!(engine.state(), LifecycleState::Parsed);
        assert!(engine.is_registered());
    }

    #[tokio::test]
    async fn register_is_noop_while_registered() {
        let registration = Arc::new(FlagRegistration::new());
        let engine = engine(registration.clone());
        let state = engine.register().await.expect("register");
        assert_eq!(state, LifecycleState::Parsed);
        assert_eq!(registration.register_calls(), 0);
    }

    #[tokio::test]
    async fn register_reinstalls_after_purge() {
        let registration = Arc::new(FlagRegistration::new());
        let engine = engine(registration.clone());
        engine.on_install().await.expect("install");
        engine.on_activate().await.expect("activate");
        engine.on_message(ControlMessage::clear_cache()).await;
        assert_eq!(engine.state(), LifecycleState::Unregistered);

        let state = engine.register().await.expect("register");
        assert_eq!(state, LifecycleState::Active);
        assert!(engine.is_registered());
        assert_eq!(registration.register_calls(), 1);
    }

    #[tokio::test]
    async fn concurrent_register_reinstalls_once() {
        let registration = Arc::new(FlagRegistration::new());
        let engine = engine(registration.clone());
        engine.on_install().await.expect("install");
        engine.on_activate().await.expect("activate");
        engine.on_message(ControlMessage::clear_cache()).await;

        let (first, second) = tokio::join!(engine.register(), engine.register());

        assert_eq!(first.expect("first register"), LifecycleState::Active);
        assert_eq!(second.expect("second register"), LifecycleState::Active);
        assert_eq!(registration.register_calls(), 1);
    }

    #[test]
    fn invalid_default_document_is_rejected() {
        let config = CacheConfig::new("v1", Url::parse("https://app.test/").expect("scope"))
            .with_manifest(PrecacheManifest::new(["./"]))
            .with_default_document("http://[::1");
        let result = Engine::new(
            config,
            Capabilities {
                storage: Arc::new(MemoryCacheStore::new()),
                network: Arc::new(FakeNetwork::new()),
                clients: Arc::new(RecordingClients::new()),
                registration: Arc::new(FlagRegistration::new()),
            },
        );
        assert!(result.is_err());
    }
}
