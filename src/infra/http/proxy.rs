//! Fallback handler that turns intercepted HTTP requests into engine fetches.

use axum::{
    body::{Body, to_bytes},
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::debug;
use url::Url;

use crate::application::{WorkerHooks, error::HttpError};
use crate::domain::ResourceRequest;

use super::{HostState, MAX_REQUEST_BODY_BYTES, into_http_response};

const SOURCE: &str = "infra::http::intercept";

/// Fallback handler: every request outside the control prefix.
pub(super) async fn intercept(State(state): State<HostState>, request: Request<Body>) -> Response {
    let request = match resource_request(&state.origin, request).await {
        Ok(request) => request,
        Err(err) => return err.into_response(),
    };

    if !state.engine.is_registered() {
        debug!(
            target = "quay::http::intercept",
            url = %request.url,
            "engine unregistered, passing through"
        );
        return pass_through(&state, &request).await;
    }

    match state.engine.on_fetch(request.clone()).await.into_fetched() {
        Some(fetched) => into_http_response(fetched),
        None => pass_through(&state, &request).await,
    }
}

/// Default network handling, untouched by the engine.
async fn pass_through(state: &HostState, request: &ResourceRequest) -> Response {
    match state.network.fetch(request).await {
        Ok(fetched) => into_http_response(fetched),
        Err(err) => {
            HttpError::from_error(SOURCE, StatusCode::BAD_GATEWAY, "Bad Gateway", &err)
                .into_response()
        }
    }
}

async fn resource_request(
    origin: &Url,
    request: Request<Body>,
) -> Result<ResourceRequest, HttpError> {
    let (parts, body) = request.into_parts();

    let url = match parts.uri.scheme() {
        Some(_) => Url::parse(&parts.uri.to_string()),
        None => {
            let target = parts
                .uri
                .path_and_query()
                .map(|pq| pq.as_str())
                .unwrap_or("/");
            origin.join(target)
        }
    }
    .map_err(|err| {
        HttpError::new(
            SOURCE,
            StatusCode::BAD_REQUEST,
            "Invalid request target",
            format!("`{}`: {err}", parts.uri),
        )
    })?;

    let body = to_bytes(body, MAX_REQUEST_BODY_BYTES).await.map_err(|err| {
        HttpError::new(
            SOURCE,
            StatusCode::PAYLOAD_TOO_LARGE,
            "Request body too large",
            err.to_string(),
        )
    })?;

    let mut resource = ResourceRequest::new(parts.method, url).with_body(body);
    resource.headers = parts.headers;
    Ok(resource)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Url {
        Url::parse("https://app.test/pwa/").expect("origin")
    }

    #[tokio::test]
    async fn origin_form_resolves_against_origin() {
        let request = Request::builder()
            .uri("/pwa/app.js?v=2")
            .body(Body::empty())
            .expect("request");
        let resource = resource_request(&origin(), request).await.expect("convert");
        assert_eq!(resource.url.as_str(), "https://app.test/pwa/app.js?v=2");
    }

    #[tokio::test]
    async fn absolute_form_is_used_as_is() {
        let request = Request::builder()
            .uri("http://other.test/data.json")
            .header("accept", "application/json")
            .body(Body::empty())
            .expect("request");
        let resource = resource_request(&origin(), request).await.expect("convert");
        assert_eq!(resource.url.as_str(), "http://other.test/data.json");
        assert!(resource.accepts_json());
    }
}
