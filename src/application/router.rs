//! Fetch Router.
//!
//! Every intercepted request walks one ordered policy list:
//! bypass, cache lookup, network, offline substitute. The first layer that
//! produces an answer wins and the answer is returned as a [`FetchOutcome`].

use std::sync::Arc;

use metrics::counter;
use tracing::{debug, instrument, warn};

use crate::cache::{BypassReason, Cache, CachePolicy, CacheStorage};
use crate::domain::{FetchedResponse, Generation, RequestIdentity, ResourceRequest};

use super::ports::Network;
use super::writes::WriteTracker;

const METRIC_FETCH_TOTAL: &str = "quay_fetch_total";
const METRIC_CACHE_WRITE_FAILED_TOTAL: &str = "quay_cache_write_failed_total";

/// Result of routing one request.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// The router did not intervene; the host handles the request itself.
    Declined(BypassReason),
    /// Served from a stored entry without touching the network.
    Cached(FetchedResponse),
    /// Live network response, returned as received whatever its status.
    Network(FetchedResponse),
    /// The network was unreachable and a 503 was synthesized.
    Substitute(FetchedResponse),
}

impl FetchOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Declined(_) => "declined",
            Self::Cached(_) => "cached",
            Self::Network(_) => "network",
            Self::Substitute(_) => "substitute",
        }
    }

    pub fn response(&self) -> Option<&FetchedResponse> {
        match self {
            Self::Declined(_) => None,
            Self::Cached(response) | Self::Network(response) | Self::Substitute(response) => {
                Some(response)
            }
        }
    }

    pub fn into_fetched(self) -> Option<FetchedResponse> {
        match self {
            Self::Declined(_) => None,
            Self::Cached(response) | Self::Network(response) | Self::Substitute(response) => {
                Some(response)
            }
        }
    }

    pub fn is_declined(&self) -> bool {
        matches!(self, Self::Declined(_))
    }
}

#[derive(Clone)]
pub struct FetchRouter {
    policy: Arc<CachePolicy>,
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    generation: Generation,
    writes: WriteTracker,
}

impl FetchRouter {
    pub fn new(
        policy: Arc<CachePolicy>,
        storage: Arc<dyn CacheStorage>,
        network: Arc<dyn Network>,
        generation: Generation,
        writes: WriteTracker,
    ) -> Self {
        Self {
            policy,
            storage,
            network,
            generation,
            writes,
        }
    }

    #[instrument(skip_all, fields(method = %request.method, url = %request.url))]
    pub async fn route(&self, request: &ResourceRequest) -> FetchOutcome {
        let outcome = self.resolve(request).await;
        counter!(METRIC_FETCH_TOTAL, "outcome" => outcome.label()).increment(1);
        outcome
    }

    async fn resolve(&self, request: &ResourceRequest) -> FetchOutcome {
        if let Some(reason) = self.policy.bypass_reason(request) {
            debug!(target = "quay::router", ?reason, "request declined");
            return FetchOutcome::Declined(reason);
        }

        let identity = request.identity();
        match self.storage.match_any(&identity).await {
            Ok(Some(response)) => {
                debug!(target = "quay::router", outcome = "hit", "serving stored response");
                return FetchOutcome::Cached(response);
            }
            Ok(None) => {
                debug!(target = "quay::router", outcome = "miss", "falling back to network");
            }
            Err(err) => {
                warn!(
                    target = "quay::router",
                    store = self.storage.name(),
                    error = %err,
                    "cache lookup failed, treating as miss"
                );
            }
        }

        match self.network.fetch(request).await {
            Ok(response) => {
                if response.is_ok() && self.policy.is_cacheable(&request.url) {
                    self.store_in_background(identity, response.clone());
                }
                FetchOutcome::Network(response)
            }
            Err(err) => {
                let structured = request.accepts_json();
                warn!(
                    target = "quay::router",
                    error = %err,
                    structured,
                    "network unavailable, substituting offline response"
                );
                FetchOutcome::Substitute(FetchedResponse::offline(structured))
            }
        }
    }

    fn store_in_background(&self, identity: RequestIdentity, response: FetchedResponse) {
        let storage = Arc::clone(&self.storage);
        let generation = self.generation.clone();
        self.writes.spawn(async move {
            let label = identity.to_string();
            let written = match Cache::open(storage, generation.clone()).await {
                Ok(cache) => cache.put(identity, response).await,
                Err(err) => Err(err),
            };
            match written {
                Ok(()) => debug!(
                    target = "quay::router",
                    %generation,
                    request = %label,
                    "stored network response"
                ),
                Err(err) => {
                    counter!(METRIC_CACHE_WRITE_FAILED_TOTAL).increment(1);
                    warn!(
                        target = "quay::router",
                        %generation,
                        request = %label,
                        error = %err,
                        "opportunistic cache write failed"
                    );
                }
            }
        });
    }
}
