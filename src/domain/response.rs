//! Fetched and cached responses.

use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};
use bytes::Bytes;

/// Message carried by the structured offline substitute.
pub const OFFLINE_ERROR_MESSAGE: &str = "Offline or network error";
/// Body of the plain-text offline substitute.
pub const OFFLINE_TEXT_BODY: &str = "Network error occurred.";

/// A fully buffered response.
///
/// The body is reference-counted, so a clone handed to the store and the
/// original handed to the caller can each be read independently.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl FetchedResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// A bare `200 OK` with the given body.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::new(StatusCode::OK, HeaderMap::new(), body)
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Only exact `200` responses are eligible for the cache.
    pub fn is_ok(&self) -> bool {
        self.status == StatusCode::OK
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }

    /// Substitute returned when the network is unreachable.
    pub fn offline(structured: bool) -> Self {
        if structured {
            let body = serde_json::json!({ "error": OFFLINE_ERROR_MESSAGE }).to_string();
            Self::new(StatusCode::SERVICE_UNAVAILABLE, HeaderMap::new(), body).with_header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            )
        } else {
            Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                HeaderMap::new(),
                OFFLINE_TEXT_BODY,
            )
            .with_header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_exact_200_is_ok() {
        assert!(FetchedResponse::ok("x").is_ok());
        assert!(
            !FetchedResponse::ok("x")
                .with_status(StatusCode::NO_CONTENT)
                .is_ok()
        );
    }

    #[test]
    fn structured_offline_body() {
        let response = FetchedResponse::offline(true);
        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.content_type(), Some("application/json"));
        let body: serde_json::Value = serde_json::from_slice(&response.body).expect("json body");
        assert_eq!(body, serde_json::json!({ "error": "Offline or network error" }));
    }

    #[test]
    fn plain_offline_body() {
        let response = FetchedResponse::offline(false);
        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.body, Bytes::from_static(b"Network error occurred."));
    }

    #[test]
    fn clone_is_independently_readable() {
        let original = FetchedResponse::ok("payload");
        let copy = original.clone();
        drop(original);
        assert_eq!(copy.body, Bytes::from_static(b"payload"));
    }
}
