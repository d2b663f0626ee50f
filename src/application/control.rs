//! Remote Control Channel.
//!
//! A `clearCache` message drives one purge through
//! `Received -> Purging -> Notifying -> Unregistering -> ReloadRequested`.
//! If deletion fails the purge stops at `Purging` and clients are told why.

use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::cache::{CacheStorage, StoreError};
use crate::domain::{ClientMessage, ClientQuery, ControlAction, ControlMessage, Generation};

use super::lifecycle::{LifecycleHandle, LifecycleState};
use super::ports::{Clients, Registration};

const METRIC_PURGE_TOTAL: &str = "quay_purge_total";
const METRIC_CLIENT_MESSAGES_TOTAL: &str = "quay_client_messages_total";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PurgeStage {
    Received,
    Purging,
    Notifying,
    Unregistering,
    ReloadRequested,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeReport {
    /// Stages reached, in order.
    pub stages: Vec<PurgeStage>,
    pub deleted: Vec<Generation>,
    /// Messages successfully delivered across all broadcasts.
    pub delivered: usize,
    /// Whether a registration was actually removed.
    pub unregistered: bool,
    pub error: Option<String>,
}

impl PurgeReport {
    fn enter(&mut self, stage: PurgeStage) {
        debug!(target = "quay::control", ?stage, "purge stage");
        self.stages.push(stage);
    }

    pub fn last_stage(&self) -> Option<PurgeStage> {
        self.stages.last().copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum ControlOutcome {
    Ignored,
    Purged(PurgeReport),
    PurgeFailed(PurgeReport),
}

pub struct ControlChannel {
    storage: Arc<dyn CacheStorage>,
    clients: Arc<dyn Clients>,
    registration: Arc<dyn Registration>,
    state: LifecycleHandle,
}

impl ControlChannel {
    pub fn new(
        storage: Arc<dyn CacheStorage>,
        clients: Arc<dyn Clients>,
        registration: Arc<dyn Registration>,
        state: LifecycleHandle,
    ) -> Self {
        Self {
            storage,
            clients,
            registration,
            state,
        }
    }

    pub async fn handle(&self, message: ControlMessage) -> ControlOutcome {
        match message.action {
            ControlAction::ClearCache => self.purge().await,
            ControlAction::Unknown => {
                debug!(target = "quay::control", "ignoring unrecognised control message");
                ControlOutcome::Ignored
            }
        }
    }

    #[instrument(skip_all)]
    async fn purge(&self) -> ControlOutcome {
        let mut report = PurgeReport::default();
        report.enter(PurgeStage::Received);

        report.enter(PurgeStage::Purging);
        if let Err(err) = self.delete_all(&mut report.deleted).await {
            let error = err.to_string();
            warn!(
                target = "quay::control",
                error = %error,
                deleted = report.deleted.len(),
                "purge failed"
            );
            report.delivered += broadcast(
                self.clients.as_ref(),
                &ClientMessage::CacheClearFailed {
                    error: error.clone(),
                },
            )
            .await;
            report.error = Some(error);
            counter!(METRIC_PURGE_TOTAL, "result" => "failed").increment(1);
            return ControlOutcome::PurgeFailed(report);
        }

        report.enter(PurgeStage::Notifying);
        report.delivered += broadcast(self.clients.as_ref(), &ClientMessage::CacheCleared).await;

        report.enter(PurgeStage::Unregistering);
        match self.registration.unregister().await {
            Ok(removed) => {
                report.unregistered = removed;
                self.state.set(LifecycleState::Unregistered);
            }
            Err(err) => {
                warn!(
                    target = "quay::control",
                    error = %err,
                    "unregister failed after purge"
                );
            }
        }

        report.enter(PurgeStage::ReloadRequested);
        report.delivered += broadcast(self.clients.as_ref(), &ClientMessage::ReloadPage).await;

        counter!(METRIC_PURGE_TOTAL, "result" => "purged").increment(1);
        info!(
            target = "quay::control",
            deleted = report.deleted.len(),
            delivered = report.delivered,
            "purge finished"
        );
        ControlOutcome::Purged(report)
    }

    async fn delete_all(&self, deleted: &mut Vec<Generation>) -> Result<(), StoreError> {
        for generation in self.storage.generations().await? {
            if self.storage.delete(&generation).await? {
                deleted.push(generation);
            }
        }
        Ok(())
    }
}

/// Post `message` to every window client, controlled or not.
///
/// A failed delivery is logged and skipped. Returns the number delivered.
pub async fn broadcast(clients: &dyn Clients, message: &ClientMessage) -> usize {
    let targets = clients.match_all(ClientQuery::all_windows()).await;
    let mut delivered = 0;
    for client in targets {
        match clients.post_message(client.id, message).await {
            Ok(()) => {
                delivered += 1;
                counter!(METRIC_CLIENT_MESSAGES_TOTAL, "message" => message.label()).increment(1);
            }
            Err(err) => warn!(
                target = "quay::control",
                client = %client.id,
                message = message.label(),
                error = %err,
                "client delivery failed"
            ),
        }
    }
    delivered
}
