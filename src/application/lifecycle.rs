//! Lifecycle Controller: install seeds the current generation, activate
//! sweeps stale generations and claims open clients.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, instrument, warn};

use crate::cache::{Cache, CacheStorage, GenerationRegistry};
use crate::domain::{Generation, ResourceRequest};

use super::error::LifecycleError;
use super::ports::{Clients, Network};

const METRIC_INSTALL_MS: &str = "quay_install_ms";
const METRIC_PRECACHE_FAILED_TOTAL: &str = "quay_precache_failed_total";
const METRIC_GENERATIONS_DELETED_TOTAL: &str = "quay_generations_deleted_total";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LifecycleState {
    /// Constructed, install not yet run.
    Parsed,
    Installing,
    Installed,
    Activating,
    Active,
    Unregistered,
}

impl LifecycleState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Parsed => "parsed",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Activating => "activating",
            Self::Active => "active",
            Self::Unregistered => "unregistered",
        }
    }
}

/// Shared, observable lifecycle state.
#[derive(Clone)]
pub struct LifecycleHandle {
    sender: Arc<watch::Sender<LifecycleState>>,
}

impl Default for LifecycleHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleHandle {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(LifecycleState::Parsed);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn get(&self) -> LifecycleState {
        *self.sender.borrow()
    }

    pub fn set(&self, state: LifecycleState) {
        let previous = self.sender.send_replace(state);
        if previous != state {
            info!(
                target = "quay::lifecycle",
                from = previous.as_str(),
                to = state.as_str(),
                "lifecycle transition"
            );
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.sender.subscribe()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallReport {
    pub generation: Generation,
    /// Entries written by the precache step; zero when it failed.
    pub seeded: usize,
    /// Why population failed, if it did. Installation proceeds regardless.
    pub precache_error: Option<String>,
    /// Take effect immediately instead of waiting for older instances.
    pub skip_waiting: bool,
}

impl InstallReport {
    pub fn is_seeded(&self) -> bool {
        self.precache_error.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivateReport {
    pub generation: Generation,
    pub deleted: Vec<Generation>,
    pub claimed: usize,
}

pub struct LifecycleController {
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    clients: Arc<dyn Clients>,
    registry: GenerationRegistry,
    precache: Vec<ResourceRequest>,
    state: LifecycleHandle,
}

impl LifecycleController {
    pub fn new(
        storage: Arc<dyn CacheStorage>,
        network: Arc<dyn Network>,
        clients: Arc<dyn Clients>,
        registry: GenerationRegistry,
        precache: Vec<ResourceRequest>,
        state: LifecycleHandle,
    ) -> Self {
        Self {
            storage,
            network,
            clients,
            registry,
            precache,
            state,
        }
    }

    pub fn state(&self) -> &LifecycleHandle {
        &self.state
    }

    /// Open the current generation and seed it from the precache manifest.
    ///
    /// Only a failure to open the generation aborts installation.
    #[instrument(skip_all, fields(generation = %self.registry.current()))]
    pub async fn install(&self) -> Result<InstallReport, LifecycleError> {
        let started_at = Instant::now();
        let previous = self.state.get();
        self.state.set(LifecycleState::Installing);

        let generation = self.registry.current().clone();
        let cache = match Cache::open(Arc::clone(&self.storage), generation.clone()).await {
            Ok(cache) => cache,
            Err(err) => {
                self.state.set(previous);
                return Err(err.into());
            }
        };

        let (seeded, precache_error) =
            match cache.add_all(&self.precache, self.network.as_ref()).await {
                Ok(count) => (count, None),
                Err(err) => {
                    counter!(METRIC_PRECACHE_FAILED_TOTAL).increment(1);
                    warn!(
                        target = "quay::lifecycle",
                        error = %err,
                        "precache population failed, continuing installation"
                    );
                    (0, Some(err.to_string()))
                }
            };

        histogram!(METRIC_INSTALL_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);
        self.state.set(LifecycleState::Installed);
        info!(
            target = "quay::lifecycle",
            seeded,
            manifest = self.precache.len(),
            "install finished"
        );

        Ok(InstallReport {
            generation,
            seeded,
            precache_error,
            skip_waiting: true,
        })
    }

    /// Delete every generation other than the current one, then claim clients.
    #[instrument(skip_all, fields(generation = %self.registry.current()))]
    pub async fn activate(&self) -> Result<ActivateReport, LifecycleError> {
        self.state.set(LifecycleState::Activating);

        let present = self.storage.generations().await?;
        let stale = self.registry.stale(&present);
        let mut deleted = Vec::with_capacity(stale.len());
        for generation in stale {
            if self.storage.delete(&generation).await? {
                deleted.push(generation);
            }
        }
        counter!(METRIC_GENERATIONS_DELETED_TOTAL).increment(deleted.len() as u64);

        let claimed = self.clients.claim().await.map_err(LifecycleError::Claim)?;
        self.state.set(LifecycleState::Active);
        info!(
            target = "quay::lifecycle",
            deleted = deleted.len(),
            claimed,
            "activation finished"
        );

        Ok(ActivateReport {
            generation: self.registry.current().clone(),
            deleted,
            claimed,
        })
    }
}
