//! Intercepted requests and their cache identity.

use std::fmt;

use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, header};
use bytes::Bytes;
use url::Url;

/// A request seen by the engine, either intercepted from a client or
/// synthesised from the precache manifest.
#[derive(Debug, Clone)]
pub struct ResourceRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ResourceRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn is_get(&self) -> bool {
        self.method == Method::GET
    }

    pub fn host(&self) -> Option<&str> {
        self.url.host_str()
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    pub fn identity(&self) -> RequestIdentity {
        RequestIdentity::new(self.method.clone(), &self.url)
    }

    /// Returns true when the `Accept` header asks for a JSON payload.
    ///
    /// Matches `application/json` as well as structured `+json` media types
    /// such as `application/problem+json`.
    pub fn accepts_json(&self) -> bool {
        self.headers
            .get_all(header::ACCEPT)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(','))
            .map(|media| media.split(';').next().unwrap_or("").trim())
            .any(|media| media.eq_ignore_ascii_case("application/json") || media.ends_with("+json"))
    }
}

/// Key under which a response is stored: method plus URL without fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestIdentity {
    method: Method,
    url: String,
}

impl RequestIdentity {
    pub fn new(method: Method, url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self {
            method,
            url: url.into(),
        }
    }

    pub fn get(url: &Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_get(&self) -> bool {
        self.method == Method::GET
    }
}

impl fmt::Display for RequestIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(raw: &str) -> Url {
        Url::parse(raw).expect("valid url")
    }

    #[test]
    fn identity_ignores_fragment() {
        let plain = RequestIdentity::get(&url("https://app.test/app.js"));
        let fragment = RequestIdentity::get(&url("https://app.test/app.js#top"));
        assert_eq!(plain, fragment);
    }

    #[test]
    fn identity_distinguishes_query_and_method() {
        let base = RequestIdentity::get(&url("https://app.test/data"));
        let query = RequestIdentity::get(&url("https://app.test/data?page=2"));
        let post = RequestIdentity::new(Method::POST, &url("https://app.test/data"));
        assert_ne!(base, query);
        assert_ne!(base, post);
        assert!(!post.is_get());
    }

    #[test]
    fn accepts_json_for_plain_and_structured_types() {
        let plain = ResourceRequest::get(url("https://app.test/"))
            .with_header(header::ACCEPT, HeaderValue::from_static("application/json"));
        assert!(plain.accepts_json());

        let listed = ResourceRequest::get(url("https://app.test/")).with_header(
            header::ACCEPT,
            HeaderValue::from_static("text/html, application/problem+json;q=0.9"),
        );
        assert!(listed.accepts_json());
    }

    #[test]
    fn accepts_json_false_without_header_or_for_html() {
        let missing = ResourceRequest::get(url("https://app.test/"));
        assert!(!missing.accepts_json());

        let html = ResourceRequest::get(url("https://app.test/"))
            .with_header(header::ACCEPT, HeaderValue::from_static("text/html,*/*"));
        assert!(!html.accepts_json());
    }
}
