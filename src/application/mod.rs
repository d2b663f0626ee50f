//! Engine orchestration: routing, lifecycle and the control channel, all
//! driven through the capability traits in [`ports`].

mod control;
mod engine;
pub mod error;
mod lifecycle;
pub mod ports;
mod router;
mod writes;

pub use control::{ControlChannel, ControlOutcome, PurgeReport, PurgeStage, broadcast};
pub use engine::{Capabilities, Engine, WorkerHooks};
pub use error::{AppError, ClientError, LifecycleError, NetworkError, RegistrationError};
pub use lifecycle::{
    ActivateReport, InstallReport, LifecycleController, LifecycleHandle, LifecycleState,
};
pub use ports::{Clients, Network, Registration};
pub use router::{FetchOutcome, FetchRouter};
pub use writes::WriteTracker;
