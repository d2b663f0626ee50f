//! Infrastructure adapters and runtime bootstrap.

pub mod clients;
pub mod error;
pub mod http;
pub mod network;
pub mod registration;
pub mod telemetry;
