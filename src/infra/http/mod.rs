//! HTTP host for the engine.
//!
//! Control endpoints live under the configured prefix; every other request is
//! intercepted and routed through
//! [`WorkerHooks::on_fetch`](crate::application::WorkerHooks::on_fetch).

mod control;
mod middleware;
mod proxy;

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::header,
    middleware as axum_middleware,
    response::Response,
    routing::{get, post},
};
use tokio::sync::watch;
use url::Url;

use crate::application::{Engine, Network};
use crate::domain::FetchedResponse;

use super::clients::ClientHub;

/// Largest request body the host buffers before forwarding.
pub const MAX_REQUEST_BODY_BYTES: usize = 16 * 1024 * 1024;

#[derive(Clone)]
pub struct HostState {
    pub engine: Arc<Engine>,
    /// Used for pass-through when the engine declines or is unregistered.
    pub network: Arc<dyn Network>,
    pub clients: ClientHub,
    /// Base that origin-form request targets are resolved against.
    pub origin: Url,
    pub shutdown: ShutdownSignal,
}

/// Flag raised once the server starts shutting down.
///
/// Long-lived responses such as event streams end when it is raised, so
/// graceful shutdown is not held open by idle listeners.
#[derive(Clone)]
pub struct ShutdownSignal {
    sender: Arc<watch::Sender<bool>>,
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn trigger(&self) {
        self.sender.send_replace(true);
    }

    /// Resolves once [`trigger`](Self::trigger) has been called.
    pub async fn triggered(&self) {
        let mut receiver = self.sender.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = receiver.wait_for(|stopping| *stopping).await;
    }
}

pub fn build_router(state: HostState, control_prefix: &str) -> Router {
    Router::new()
        .route(
            &format!("{control_prefix}/message"),
            post(control::post_message),
        )
        .route(
            &format!("{control_prefix}/events"),
            get(control::client_events),
        )
        .route(
            &format!("{control_prefix}/register"),
            post(control::register),
        )
        .route(&format!("{control_prefix}/status"), get(control::status))
        .fallback(proxy::intercept)
        .with_state(state)
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::set_request_context))
}

/// Turn a buffered response into an axum response.
///
/// Framing headers are dropped because the body is already fully buffered.
pub fn into_http_response(fetched: FetchedResponse) -> Response {
    let FetchedResponse {
        status,
        mut headers,
        body,
    } = fetched;
    headers.remove(header::TRANSFER_ENCODING);
    headers.remove(header::CONNECTION);

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

