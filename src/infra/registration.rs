//! Process-local registration state for the hosted engine.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tracing::info;

use crate::application::{Registration, RegistrationError};

/// In-process registration flag of the hosted engine.
///
/// While unregistered the host forwards every request straight to the origin.
#[derive(Debug)]
pub struct HostRegistration {
    registered: AtomicBool,
}

impl Default for HostRegistration {
    fn default() -> Self {
        Self::new()
    }
}

impl HostRegistration {
    /// Starts registered: the host installs the engine on boot.
    pub fn new() -> Self {
        Self {
            registered: AtomicBool::new(true),
        }
    }
}

#[async_trait]
impl Registration for HostRegistration {
    fn is_registered(&self) -> bool {
        self.registered.load(Ordering::Acquire)
    }

    async fn register(&self) -> Result<(), RegistrationError> {
        self.registered.store(true, Ordering::Release);
        info!(target = "quay::registration", "engine registered");
        Ok(())
    }

    async fn unregister(&self) -> Result<bool, RegistrationError> {
        let removed = self.registered.swap(false, Ordering::AcqRel);
        info!(target = "quay::registration", removed, "engine unregistered");
        Ok(removed)
    }
}
