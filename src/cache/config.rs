//! Cache configuration.
//!
//! Injected into the engine at construction; nothing here is global, so a
//! test can run several generations side by side.

use serde::Deserialize;
use url::Url;

use crate::domain::{Generation, PrecacheManifest};

pub const DEFAULT_DOCUMENT: &str = "index.html";

/// How live request paths are compared with manifest entries when deciding
/// whether a network response may be cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Same origin as the scope and identical resolved path.
    #[default]
    Exact,
    /// Path ends with the entry (scope-independent).
    Suffix,
}

/// Engine cache settings.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Name of the live generation.
    pub generation: Generation,
    /// Base URL that manifest entries resolve against.
    pub scope: Url,
    /// Resources seeded at install time.
    pub manifest: PrecacheManifest,
    /// Hosts whose traffic always bypasses the engine.
    pub excluded_hosts: Vec<String>,
    /// Cacheability comparison for opportunistic writes.
    pub match_mode: MatchMode,
    /// Document served for the scope root.
    pub default_document: String,
}

impl CacheConfig {
    pub fn new(generation: impl Into<Generation>, scope: Url) -> Self {
        Self {
            generation: generation.into(),
            scope,
            manifest: PrecacheManifest::default(),
            excluded_hosts: Vec::new(),
            match_mode: MatchMode::default(),
            default_document: DEFAULT_DOCUMENT.to_string(),
        }
    }

    pub fn with_manifest(mut self, manifest: PrecacheManifest) -> Self {
        self.manifest = manifest;
        self
    }

    pub fn with_excluded_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_hosts = hosts.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_match_mode(mut self, mode: MatchMode) -> Self {
        self.match_mode = mode;
        self
    }

    pub fn with_default_document(mut self, document: impl Into<String>) -> Self {
        self.default_document = document.into();
        self
    }
}

impl From<&crate::config::Settings> for CacheConfig {
    fn from(settings: &crate::config::Settings) -> Self {
        let cache = &settings.cache;
        Self {
            generation: cache.generation.clone(),
            scope: settings.origin.url.clone(),
            manifest: cache.precache.clone(),
            excluded_hosts: cache.excluded_hosts.clone(),
            match_mode: cache.match_mode,
            default_document: cache.default_document.clone(),
        }
    }
}
