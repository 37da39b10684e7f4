//! # solvr_core
//!
//! Core identity and authorization logic for Solvr: credential verification
//! for humans and agents, refresh-token rotation, the agent claim protocol,
//! identity resolution and the ownership/family authorization policy.

pub mod auth;
pub mod migrate;
pub mod models;
pub mod store;
pub mod uuid;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
