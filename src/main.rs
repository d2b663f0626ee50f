use std::{process, sync::Arc};

use quay::{
    application::{Capabilities, Engine, WorkerHooks, error::AppError},
    cache::{CacheConfig, MemoryCacheStore},
    config,
    infra::{
        clients::ClientHub,
        error::InfraError,
        http::{self, HostState, ShutdownSignal},
        network::HttpNetwork,
        registration::HostRegistration,
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (_cli_args, settings) = config::load_with_cli()?;
    telemetry::init(&settings.logging)?;

    let network = Arc::new(HttpNetwork::new(settings.origin.connect_timeout)?);
    let clients = ClientHub::new();
    let engine = Arc::new(Engine::new(
        CacheConfig::from(&settings),
        Capabilities {
            storage: Arc::new(MemoryCacheStore::new()),
            network: network.clone(),
            clients: Arc::new(clients.clone()),
            registration: Arc::new(HostRegistration::new()),
        },
    )?);

    let install = engine.on_install().await?;
    if let Some(reason) = install.precache_error.as_deref() {
        warn!(
            target = "quay::startup",
            generation = %install.generation,
            reason,
            "serving without a complete precache"
        );
    }
    let activate = engine.on_activate().await?;
    info!(
        target = "quay::startup",
        generation = %activate.generation,
        seeded = install.seeded,
        origin = %settings.origin.url,
        "engine active"
    );

    serve_http(&settings, engine, network, clients).await
}

async fn serve_http(
    settings: &config::Settings,
    engine: Arc<Engine>,
    network: Arc<HttpNetwork>,
    clients: ClientHub,
) -> Result<(), AppError> {
    let shutdown = ShutdownSignal::new();
    let state = HostState {
        engine: Arc::clone(&engine),
        network,
        clients,
        origin: settings.origin.url.clone(),
        shutdown: shutdown.clone(),
    };
    let router = http::build_router(state, &settings.control.prefix);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "quay::startup",
        addr = %settings.server.addr,
        control = %settings.control.prefix,
        "listening"
    );

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown.trigger();
        })
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    if tokio::time::timeout(settings.server.graceful_shutdown, engine.settle())
        .await
        .is_err()
    {
        warn!(
            target = "quay::shutdown",
            "pending cache writes did not finish before the shutdown deadline"
        );
    }
    info!(target = "quay::shutdown", "stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(
            target = "quay::shutdown",
            error = %err,
            "failed to listen for shutdown signal"
        );
        std::future::pending::<()>().await;
    }
}
