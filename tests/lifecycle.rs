use std::sync::Arc;

use quay::application::{
    Capabilities, Engine, FetchOutcome, LifecycleError, LifecycleState, WorkerHooks,
};
use quay::cache::{CacheConfig, CacheStorage, MemoryCacheStore};
use quay::domain::{
    ClientKind, FetchedResponse, Generation, PrecacheManifest, RequestIdentity, ResourceRequest,
};
use quay::testing::{FakeNetwork, FlagRegistration, RecordingClients};
use url::Url;

const ORIGIN: &str = "https://app.test/";

fn url(path: &str) -> Url {
    Url::parse(ORIGIN)
        .and_then(|origin| origin.join(path))
        .expect("valid url")
}

fn config(generation: &str) -> CacheConfig {
    CacheConfig::new(generation, Url::parse(ORIGIN).expect("origin"))
        .with_manifest(PrecacheManifest::new(["./", "./app.js"]))
}

fn network() -> Arc<FakeNetwork> {
    Arc::new(
        FakeNetwork::new()
            .with_response(ORIGIN, FetchedResponse::ok("home"))
            .with_response(url("app.js").as_str(), FetchedResponse::ok("js")),
    )
}

fn engine(
    generation: &str,
    store: Arc<MemoryCacheStore>,
    network: Arc<FakeNetwork>,
    clients: Arc<RecordingClients>,
) -> Engine {
    Engine::new(
        config(generation),
        Capabilities {
            storage: store,
            network,
            clients,
            registration: Arc::new(FlagRegistration::new()),
        },
    )
    .expect("engine")
}

#[tokio::test]
async fn lifecycle_walks_through_every_state() {
    let engine = engine(
        "v1",
        Arc::new(MemoryCacheStore::new()),
        network(),
        Arc::new(RecordingClients::new()),
    );
    let states = engine.subscribe();
    assert_eq!(engine.state(), LifecycleState::Parsed);

    let install = engine.on_install().await.expect("install");
    assert!(install.skip_waiting);
    assert_eq!(engine.state(), LifecycleState::Installed);

    engine.on_activate().await.expect("activate");
    assert_eq!(engine.state(), LifecycleState::Active);
    assert_eq!(*states.borrow(), LifecycleState::Active);
}

#[tokio::test]
async fn generation_bump_sweeps_the_previous_generation() {
    let store = Arc::new(MemoryCacheStore::new());
    let clients = Arc::new(RecordingClients::new());

    let old = engine("v1", store.clone(), network(), clients.clone());
    old.on_install().await.expect("install v1");
    old.on_activate().await.expect("activate v1");

    let new = engine("v2", store.clone(), network(), clients.clone());
    new.on_install().await.expect("install v2");
    assert_eq!(
        store.generations().await.expect("list"),
        vec![Generation::new("v1"), Generation::new("v2")]
    );

    let report = new.on_activate().await.expect("activate v2");
    assert_eq!(report.deleted, vec![Generation::new("v1")]);
    assert_eq!(
        store.generations().await.expect("list"),
        vec![Generation::new("v2")]
    );
}

#[tokio::test]
async fn sweep_is_idempotent() {
    let store = Arc::new(MemoryCacheStore::new());
    for name in ["a", "b", "c", "v3"] {
        store.open(&Generation::new(name)).await.expect("open");
    }
    let engine = engine("v3", store.clone(), network(), Arc::new(RecordingClients::new()));

    let first = engine.on_activate().await.expect("first sweep");
    assert_eq!(first.deleted.len(), 3);
    let surviving = store.generations().await.expect("list");

    let second = engine.on_activate().await.expect("second sweep");
    assert!(second.deleted.is_empty());
    assert_eq!(store.generations().await.expect("list"), surviving);
    assert_eq!(surviving, vec![Generation::new("v3")]);
}

#[tokio::test]
async fn stale_entries_serve_until_activation() {
    let store = Arc::new(MemoryCacheStore::new());
    let target = url("legacy.css");
    store
        .put(
            &Generation::new("v1"),
            RequestIdentity::get(&target),
            FetchedResponse::ok("legacy"),
        )
        .await
        .expect("seed v1");

    let offline = Arc::new(FakeNetwork::new());
    offline.set_offline(true);
    let engine = engine("v2", store, offline, Arc::new(RecordingClients::new()));
    engine.on_install().await.expect("install");

    let before = engine.on_fetch(ResourceRequest::get(target.clone())).await;
    assert_eq!(before, FetchOutcome::Cached(FetchedResponse::ok("legacy")));

    engine.on_activate().await.expect("activate");
    let after = engine.on_fetch(ResourceRequest::get(target)).await;
    assert_eq!(after.label(), "substitute");
}

#[tokio::test]
async fn failed_precache_still_installs() {
    let store = Arc::new(MemoryCacheStore::new());
    let partial = Arc::new(FakeNetwork::new().with_response(ORIGIN, FetchedResponse::ok("home")));
    let engine = engine("v1", store.clone(), partial, Arc::new(RecordingClients::new()));

    let report = engine.on_install().await.expect("install");
    assert!(!report.is_seeded());
    assert!(report.precache_error.is_some());
    assert_eq!(engine.state(), LifecycleState::Installed);
    assert_eq!(store.entry_count(&Generation::new("v1")), Some(0));
}

#[tokio::test]
async fn activation_claims_open_clients() {
    let clients = Arc::new(RecordingClients::new());
    clients.connect(ClientKind::Window, false);
    clients.connect(ClientKind::Window, false);
    let engine = engine(
        "v1",
        Arc::new(MemoryCacheStore::new()),
        network(),
        clients.clone(),
    );

    let report = engine.on_activate().await.expect("activate");
    assert_eq!(report.claimed, 2);
    assert!(clients.clients().iter().all(|client| client.controlled));
}

#[tokio::test]
async fn claim_failure_fails_activation() {
    let clients = Arc::new(RecordingClients::new().failing_claim());
    let engine = engine(
        "v1",
        Arc::new(MemoryCacheStore::new()),
        network(),
        clients,
    );

    let err = engine.on_activate().await.expect_err("claim failure");
    assert!(matches!(err, LifecycleError::Claim(_)));
    assert_eq!(engine.state(), LifecycleState::Activating);
}
