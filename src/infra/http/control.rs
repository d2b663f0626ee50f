//! Control-channel endpoints: purge messages, client event streams, status.

use std::convert::Infallible;

use async_stream::stream;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use serde::Serialize;
use tracing::{debug, warn};

use crate::application::{ControlOutcome, LifecycleState, WorkerHooks, error::HttpError};
use crate::domain::{ClientKind, ControlMessage, Generation};

use super::HostState;

const SOURCE: &str = "infra::http::control";

pub(super) async fn post_message(
    State(state): State<HostState>,
    Json(message): Json<ControlMessage>,
) -> Json<ControlOutcome> {
    Json(state.engine.on_message(message).await)
}

/// Server-sent event stream for one window client.
///
/// The client counts as connected for as long as the stream is open. The
/// first event carries its id; every later event is one control-channel
/// message. The stream ends when the host starts shutting down.
pub(super) async fn client_events(State(state): State<HostState>) -> Response {
    let mut connection = state.clients.connect(ClientKind::Window);
    let client_id = connection.id();
    let shutdown = state.shutdown.clone();

    let events = stream! {
        yield Ok::<Event, Infallible>(
            Event::default()
                .event("connected")
                .data(client_id.to_string()),
        );
        loop {
            let message = tokio::select! {
                message = connection.recv() => message,
                () = shutdown.triggered() => None,
            };
            let Some(message) = message else {
                break;
            };
            match Event::default().event("message").json_data(&message) {
                Ok(event) => yield Ok(event),
                Err(err) => warn!(
                    target = "quay::http::events",
                    client = %client_id,
                    error = %err,
                    "failed to encode client message"
                ),
            }
        }
        debug!(target = "quay::http::events", client = %client_id, "event stream closed");
    };

    Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct StatusView {
    state: LifecycleState,
    registered: bool,
    generation: Generation,
    clients: usize,
}

pub(super) async fn register(State(state): State<HostState>) -> Result<Json<StatusView>, HttpError> {
    state.engine.register().await.map_err(|err| {
        HttpError::from_error(
            SOURCE,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Registration failed",
            &err,
        )
    })?;
    Ok(Json(status_view(&state)))
}

pub(super) async fn status(State(state): State<HostState>) -> Json<StatusView> {
    Json(status_view(&state))
}

fn status_view(state: &HostState) -> StatusView {
    StatusView {
        state: state.engine.state(),
        registered: state.engine.is_registered(),
        generation: state.engine.config().generation.clone(),
        clients: state.clients.len(),
    }
}
