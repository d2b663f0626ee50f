//! Cache storage.
//!
//! [`CacheStorage`] is the capability the engine drives: a persistent map
//! from (generation, request identity) to a buffered response. [`Cache`] is
//! a handle bound to one generation, mirroring `caches.open(name)`.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use axum::http::StatusCode;
use futures::future::try_join_all;
use thiserror::Error;
use tracing::debug;

use crate::application::Network;
use crate::domain::{FetchedResponse, Generation, RequestIdentity, ResourceRequest};

use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to precache `{url}`: {reason}")]
    AddAll { url: String, reason: String },
    #[error("only GET requests can be stored, got `{identity}`")]
    NonGet { identity: String },
    #[error("only status 200 responses can be stored, got {status}")]
    NotOk { status: StatusCode },
    #[error("cache backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}

/// Persistent store of cache generations.
///
/// Every mutation replaces a whole entry or a whole generation.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create `generation` if it does not exist yet.
    async fn open(&self, generation: &Generation) -> Result<(), StoreError>;

    /// Insert or overwrite one entry, creating the generation if needed.
    async fn put(
        &self,
        generation: &Generation,
        identity: RequestIdentity,
        response: FetchedResponse,
    ) -> Result<(), StoreError>;

    async fn lookup(
        &self,
        generation: &Generation,
        identity: &RequestIdentity,
    ) -> Result<Option<FetchedResponse>, StoreError>;

    /// First match across all generations, oldest generation first.
    async fn match_any(
        &self,
        identity: &RequestIdentity,
    ) -> Result<Option<FetchedResponse>, StoreError>;

    /// Generation names in creation order.
    async fn generations(&self) -> Result<Vec<Generation>, StoreError>;

    /// Remove a generation and all its entries. Returns whether it existed.
    async fn delete(&self, generation: &Generation) -> Result<bool, StoreError>;

    fn name(&self) -> &'static str;
}

/// Handle to one opened generation.
#[derive(Clone)]
pub struct Cache {
    storage: Arc<dyn CacheStorage>,
    generation: Generation,
}

impl Cache {
    pub async fn open(
        storage: Arc<dyn CacheStorage>,
        generation: Generation,
    ) -> Result<Self, StoreError> {
        storage.open(&generation).await?;
        Ok(Self {
            storage,
            generation,
        })
    }

    pub fn generation(&self) -> &Generation {
        &self.generation
    }

    /// Store `response` under `identity`.
    ///
    /// Rejects non-GET identities and anything other than status 200.
    pub async fn put(
        &self,
        identity: RequestIdentity,
        response: FetchedResponse,
    ) -> Result<(), StoreError> {
        if !identity.is_get() {
            return Err(StoreError::NonGet {
                identity: identity.to_string(),
            });
        }
        if !response.is_ok() {
            return Err(StoreError::NotOk {
                status: response.status,
            });
        }
        self.storage.put(&self.generation, identity, response).await
    }

    pub async fn lookup(
        &self,
        identity: &RequestIdentity,
    ) -> Result<Option<FetchedResponse>, StoreError> {
        self.storage.lookup(&self.generation, identity).await
    }

    /// Fetch every request and store the results as one unit.
    ///
    /// All fetches run concurrently. If any of them fails or answers with a
    /// status other than 200, nothing is written.
    pub async fn add_all(
        &self,
        requests: &[ResourceRequest],
        network: &dyn Network,
    ) -> Result<usize, StoreError> {
        let fetched = try_join_all(requests.iter().map(|request| async move {
            let response = network
                .fetch(request)
                .await
                .map_err(|err| StoreError::AddAll {
                    url: request.url.to_string(),
                    reason: err.to_string(),
                })?;
            if !response.is_ok() {
                return Err(StoreError::AddAll {
                    url: request.url.to_string(),
                    reason: format!("unexpected status {}", response.status),
                });
            }
            Ok::<_, StoreError>((request.identity(), response))
        }))
        .await?;

        let count = fetched.len();
        for (identity, response) in fetched {
            self.put(identity, response).await?;
        }

        debug!(
            target = "quay::cache",
            generation = %self.generation,
            count,
            "generation populated"
        );
        Ok(count)
    }
}

struct Slot {
    name: Generation,
    entries: HashMap<RequestIdentity, FetchedResponse>,
}

impl Slot {
    fn new(name: Generation) -> Self {
        Self {
            name,
            entries: HashMap::new(),
        }
    }
}

/// In-process [`CacheStorage`]; generations live until deleted or the
/// process exits.
#[derive(Default)]
pub struct MemoryCacheStore {
    slots: RwLock<Vec<Slot>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries in `generation`, or `None` if it does not exist.
    pub fn entry_count(&self, generation: &Generation) -> Option<usize> {
        rw_read(&self.slots, SOURCE, "entry_count")
            .iter()
            .find(|slot| &slot.name == generation)
            .map(|slot| slot.entries.len())
    }
}

fn slot_mut<'a>(slots: &'a mut Vec<Slot>, generation: &Generation) -> &'a mut Slot {
    match slots.iter().position(|slot| &slot.name == generation) {
        Some(index) => &mut slots[index],
        None => {
            slots.push(Slot::new(generation.clone()));
            let last = slots.len() - 1;
            &mut slots[last]
        }
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStore {
    async fn open(&self, generation: &Generation) -> Result<(), StoreError> {
        let mut slots = rw_write(&self.slots, SOURCE, "open");
        slot_mut(&mut slots, generation);
        Ok(())
    }

    async fn put(
        &self,
        generation: &Generation,
        identity: RequestIdentity,
        response: FetchedResponse,
    ) -> Result<(), StoreError> {
        let mut slots = rw_write(&self.slots, SOURCE, "put");
        slot_mut(&mut slots, generation)
            .entries
            .insert(identity, response);
        Ok(())
    }

    async fn lookup(
        &self,
        generation: &Generation,
        identity: &RequestIdentity,
    ) -> Result<Option<FetchedResponse>, StoreError> {
        Ok(rw_read(&self.slots, SOURCE, "lookup")
            .iter()
            .find(|slot| &slot.name == generation)
            .and_then(|slot| slot.entries.get(identity).cloned()))
    }

    async fn match_any(
        &self,
        identity: &RequestIdentity,
    ) -> Result<Option<FetchedResponse>, StoreError> {
        Ok(rw_read(&self.slots, SOURCE, "match_any")
            .iter()
            .find_map(|slot| slot.entries.get(identity).cloned()))
    }

    async fn generations(&self) -> Result<Vec<Generation>, StoreError> {
        Ok(rw_read(&self.slots, SOURCE, "generations")
            .iter()
            .map(|slot| slot.name.clone())
            .collect())
    }

    async fn delete(&self, generation: &Generation) -> Result<bool, StoreError> {
        let mut slots = rw_write(&self.slots, SOURCE, "delete");
        let before = slots.len();
        slots.retain(|slot| &slot.name != generation);
        Ok(slots.len() != before)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
