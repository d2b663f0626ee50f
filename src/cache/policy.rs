//! Bypass and cacheability rules.

use axum::http::Method;
use url::Url;

use crate::domain::{DomainError, ResourceRequest, is_root_entry};

use super::config::{CacheConfig, MatchMode};

/// Why the router declined to intervene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BypassReason {
    /// Only GET traffic is intercepted.
    Method(Method),
    /// The target host is configured to always go straight to the network.
    ExcludedHost(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Pattern {
    Root { root: String, document: String },
    Path(String),
}

/// Compiled form of [`CacheConfig`]'s routing rules.
#[derive(Debug, Clone)]
pub struct CachePolicy {
    scope: Url,
    mode: MatchMode,
    patterns: Vec<Pattern>,
    excluded_hosts: Vec<String>,
}

impl CachePolicy {
    pub fn new(config: &CacheConfig) -> Result<Self, DomainError> {
        let scope = &config.scope;
        let document = scope.join(&config.default_document).map_err(|err| {
            DomainError::manifest_entry(&config.default_document, err.to_string())
        })?;

        let mut patterns = Vec::with_capacity(config.manifest.len());
        for entry in config.manifest.entries() {
            if is_root_entry(entry) {
                let (root, document) = match config.match_mode {
                    MatchMode::Exact => (scope.path().to_string(), document.path().to_string()),
                    MatchMode::Suffix => ("/".to_string(), suffix_of(&config.default_document)),
                };
                patterns.push(Pattern::Root { root, document });
                continue;
            }

            let path = match config.match_mode {
                MatchMode::Exact => scope
                    .join(entry)
                    .map_err(|err| DomainError::manifest_entry(entry, err.to_string()))?
                    .path()
                    .to_string(),
                MatchMode::Suffix => suffix_of(entry),
            };
            patterns.push(Pattern::Path(path));
        }

        let excluded_hosts = config
            .excluded_hosts
            .iter()
            .map(|host| host.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|host| !host.is_empty())
            .collect();

        Ok(Self {
            scope: scope.clone(),
            mode: config.match_mode,
            patterns,
            excluded_hosts,
        })
    }

    /// Returns the reason to leave `request` to the platform, if any.
    pub fn bypass_reason(&self, request: &ResourceRequest) -> Option<BypassReason> {
        if !request.is_get() {
            return Some(BypassReason::Method(request.method.clone()));
        }

        let host = request.host()?.to_ascii_lowercase();
        self.excluded_hosts
            .iter()
            .find(|excluded| host_matches(&host, excluded))
            .map(|excluded| BypassReason::ExcludedHost(excluded.clone()))
    }

    /// Whether a successful network response for `url` may be stored.
    pub fn is_cacheable(&self, url: &Url) -> bool {
        if self.mode == MatchMode::Exact && url.origin() != self.scope.origin() {
            return false;
        }

        let path = url.path();
        self.patterns.iter().any(|pattern| match pattern {
            Pattern::Root { root, document } => path == root || path == document,
            Pattern::Path(expected) => match self.mode {
                MatchMode::Exact => path == expected,
                MatchMode::Suffix => path.ends_with(expected.as_str()),
            },
        })
    }
}

fn suffix_of(entry: &str) -> String {
    let trimmed = entry.trim().trim_start_matches("./").trim_start_matches('/');
    format!("/{trimmed}")
}

fn host_matches(host: &str, excluded: &str) -> bool {
    host == excluded
        || host
            .strip_suffix(excluded)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

#[cfg(test)]
mod tests {
    use axum::http::Method;

    use super::*;
    use crate::domain::PrecacheManifest;

    fn config(mode: MatchMode) -> CacheConfig {
        CacheConfig::new("v1", Url::parse("https://app.test/").expect("scope"))
            .with_manifest(PrecacheManifest::new([
                "./",
                "./index.html",
                "./app.js",
                "./manifest.json",
            ]))
            .with_excluded_hosts(["generativelanguage.googleapis.com"])
            .with_match_mode(mode)
    }

    fn url(raw: &str) -> Url {
        Url::parse(raw).expect("valid url")
    }

    #[test]
    fn non_get_is_bypassed() {
        let policy = CachePolicy::new(&config(MatchMode::Exact)).expect("policy");
        let request = ResourceRequest::new(Method::POST, url("https://app.test/app.js"));
        assert_eq!(
            policy.bypass_reason(&request),
            Some(BypassReason::Method(Method::POST))
        );
    }

    #[test]
    fn excluded_host_and_subdomains_are_bypassed() {
        let policy = CachePolicy::new(&config(MatchMode::Exact)).expect("policy");
        let exact = ResourceRequest::get(url(
            "https://generativelanguage.googleapis.com/v1beta/models",
        ));
        assert!(matches!(
            policy.bypass_reason(&exact),
            Some(BypassReason::ExcludedHost(_))
        ));

        let sub = ResourceRequest::get(url("https://eu.generativelanguage.googleapis.com/x"));
        assert!(policy.bypass_reason(&sub).is_some());

        let lookalike = ResourceRequest::get(url("https://notgenerativelanguage.googleapis.com/x"));
        assert!(policy.bypass_reason(&lookalike).is_none());
    }

    #[test]
    fn same_origin_get_is_not_bypassed() {
        let policy = CachePolicy::new(&config(MatchMode::Exact)).expect("policy");
        let request = ResourceRequest::get(url("https://app.test/app.js"));
        assert!(policy.bypass_reason(&request).is_none());
    }

    #[test]
    fn exact_mode_matches_resolved_paths_only() {
        let policy = CachePolicy::new(&config(MatchMode::Exact)).expect("policy");
        assert!(policy.is_cacheable(&url("https://app.test/app.js")));
        assert!(policy.is_cacheable(&url("https://app.test/app.js?v=3")));
        assert!(!policy.is_cacheable(&url("https://app.test/vendor/app.js")));
        assert!(!policy.is_cacheable(&url("https://cdn.test/app.js")));
        assert!(!policy.is_cacheable(&url("https://app.test/random.json")));
    }

    #[test]
    fn root_entry_matches_root_and_default_document() {
        for mode in [MatchMode::Exact, MatchMode::Suffix] {
            let policy = CachePolicy::new(
                &CacheConfig::new("v1", url("https://app.test/"))
                    .with_manifest(PrecacheManifest::new(["./"]))
                    .with_match_mode(mode),
            )
            .expect("policy");
            assert!(policy.is_cacheable(&url("https://app.test/")));
            assert!(policy.is_cacheable(&url("https://app.test/index.html")));
            assert!(!policy.is_cacheable(&url("https://app.test/about.html")));
        }
    }

    #[test]
    fn suffix_mode_over_matches_shared_suffixes() {
        let policy = CachePolicy::new(&config(MatchMode::Suffix)).expect("policy");
        assert!(policy.is_cacheable(&url("https://app.test/app.js")));
        assert!(policy.is_cacheable(&url("https://app.test/vendor/app.js")));
        assert!(policy.is_cacheable(&url("https://cdn.test/app.js")));
        assert!(!policy.is_cacheable(&url("https://app.test/random.json")));
    }

    #[test]
    fn nested_scope_root_in_exact_mode() {
        let policy = CachePolicy::new(
            &CacheConfig::new("v1", url("https://app.test/pwa/"))
                .with_manifest(PrecacheManifest::new(["./", "./app.js"])),
        )
        .expect("policy");
        assert!(policy.is_cacheable(&url("https://app.test/pwa/")));
        assert!(policy.is_cacheable(&url("https://app.test/pwa/index.html")));
        assert!(policy.is_cacheable(&url("https://app.test/pwa/app.js")));
        assert!(!policy.is_cacheable(&url("https://app.test/app.js")));
    }
}
