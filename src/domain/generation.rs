//! Cache generation names.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// Opaque name of one cache epoch.
///
/// Exactly one generation is current for a running engine; any other name
/// found in the store is stale and is removed by the next activation sweep.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Generation(String);

impl Generation {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Build a generation name, rejecting blank input.
    pub fn parse(name: &str) -> Result<Self, DomainError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("generation name must not be empty"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Generation {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Generation {
    fn from(value: String) -> Self {
        Self(value)
    }
}
