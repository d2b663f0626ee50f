//! Quay cache layer
//!
//! Owns everything that touches stored responses:
//!
//! - **Storage**: the [`CacheStorage`] capability keyed by
//!   (generation, request identity) and its in-memory implementation
//! - **Registry**: which generation is current and which are stale
//! - **Policy**: bypass and cacheability rules derived from [`CacheConfig`]
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! generation = "app-cache-v2"
//! precache = ["./", "./index.html", "./app.js"]
//! excluded_hosts = ["api.example.com"]
//! match_mode = "exact"
//! ```

mod config;
pub(crate) mod lock;
mod policy;
mod registry;
mod store;

pub use config::{CacheConfig, DEFAULT_DOCUMENT, MatchMode};
pub use policy::{BypassReason, CachePolicy};
pub use registry::GenerationRegistry;
pub use store::{Cache, CacheStorage, MemoryCacheStore, StoreError};
