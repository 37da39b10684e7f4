//! Domain models shared by the auth subsystem and its repositories.

pub mod auth;
