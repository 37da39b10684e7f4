//! Request handlers.

pub mod admin;
pub mod agents;
pub mod auth;
pub mod claims;
