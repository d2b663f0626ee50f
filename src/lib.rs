//! Cache-first resource intermediary.
//!
//! The engine serves precached and opportunistically cached responses from
//! named cache generations, falls back to the origin on a miss, and
//! synthesizes an offline response when the origin is unreachable. Connected
//! clients can order a full purge over a control channel.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod testing;
