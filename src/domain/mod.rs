//! Domain layer types and invariants.

pub mod clients;
pub mod error;
pub mod generation;
pub mod manifest;
pub mod messages;
pub mod request;
pub mod response;

pub use clients::{ClientInfo, ClientKind, ClientQuery};
pub use error::DomainError;
pub use generation::Generation;
pub use manifest::{PrecacheManifest, is_root_entry};
pub use messages::{ClientMessage, ControlAction, ControlMessage};
pub use request::{RequestIdentity, ResourceRequest};
pub use response::{FetchedResponse, OFFLINE_ERROR_MESSAGE, OFFLINE_TEXT_BODY};
