//! # agora_core
//!
//! Authentication core for the Agora API: bearer token issuance and
//! validation, login throttling with temporary lockout, and a cache-aside
//! session layer in front of the durable user store.

pub mod auth;
pub mod clock;
pub mod config;
pub mod kv;
pub mod migrate;
pub mod models;

pub use migrate::migrate;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
