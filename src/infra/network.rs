//! reqwest-backed Network API.

use std::time::Duration;

use async_trait::async_trait;
use axum::http::{HeaderMap, header};
use tracing::debug;

use crate::application::{Network, NetworkError};
use crate::domain::{FetchedResponse, ResourceRequest};

use super::error::InfraError;

/// Request headers that describe one hop and are never forwarded.
static HOP_BY_HOP: [header::HeaderName; 7] = [
    header::CONNECTION,
    header::CONTENT_LENGTH,
    header::HOST,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

#[derive(Clone)]
pub struct HttpNetwork {
    client: reqwest::Client,
}

impl HttpNetwork {
    /// Build a client that never follows redirects, so 3xx responses reach
    /// the caller unchanged.
    pub fn new(connect_timeout: Duration) -> Result<Self, InfraError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|err| InfraError::http_client(err.to_string()))?;
        Ok(Self { client })
    }
}

fn forwarded_headers(headers: &HeaderMap) -> HeaderMap {
    let mut forwarded = headers.clone();
    for name in HOP_BY_HOP.iter() {
        forwarded.remove(name);
    }
    forwarded
}

fn classify(err: reqwest::Error) -> NetworkError {
    if err.is_builder() {
        NetworkError::InvalidRequest(err.to_string())
    } else {
        NetworkError::Unavailable(err.to_string())
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &ResourceRequest) -> Result<FetchedResponse, NetworkError> {
        let response = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(forwarded_headers(&request.headers))
            .body(request.body.clone())
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(classify)?;
        debug!(
            target = "quay::network",
            url = %request.url,
            status = status.as_u16(),
            bytes = body.len(),
            "origin responded"
        );
        Ok(FetchedResponse::new(status, headers, body))
    }
}
