use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("manifest entry `{entry}` cannot be resolved: {reason}")]
    ManifestEntry { entry: String, reason: String },
    #[error("domain validation failed: {message}")]
    Validation { message: String },
}

impl DomainError {
    pub fn manifest_entry(entry: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ManifestEntry {
            entry: entry.into(),
            reason: reason.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}
