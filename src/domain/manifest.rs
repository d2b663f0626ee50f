//! Precache manifest.

use url::Url;

use super::error::DomainError;
use super::request::ResourceRequest;

/// Ordered list of resource paths seeded at install time.
///
/// Entries are relative to the engine scope (`./app.js`, `./`). The manifest
/// is fixed for the lifetime of one generation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrecacheManifest {
    entries: Vec<String>,
}

impl PrecacheManifest {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(Into::into)
                .filter(|entry: &String| !entry.trim().is_empty())
                .collect(),
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve every entry against `scope`.
    pub fn resolve(&self, scope: &Url) -> Result<Vec<Url>, DomainError> {
        self.entries
            .iter()
            .map(|entry| {
                scope
                    .join(entry)
                    .map_err(|err| DomainError::manifest_entry(entry, err.to_string()))
            })
            .collect()
    }

    /// GET requests for every entry, in manifest order.
    pub fn requests(&self, scope: &Url) -> Result<Vec<ResourceRequest>, DomainError> {
        Ok(self
            .resolve(scope)?
            .into_iter()
            .map(ResourceRequest::get)
            .collect())
    }
}

/// The root entry stands for both the scope root and its default document.
pub fn is_root_entry(entry: &str) -> bool {
    matches!(entry.trim(), "./" | "." | "/")
}
