//! HTTP front end: contact and order intake, product catalog, health and the
//! WhatsApp status/control routes.
//!
//! Lifecycle:
//! 1. Load config, open the SQLite store
//! 2. Spawn the WhatsApp session against the Evolution bridge
//! 3. Serve the router until ctrl-c, then tear the session down

pub mod error;
pub mod ip_filter;
pub mod server;
pub mod state;
pub mod store;
pub mod submissions;
pub mod whatsapp;

#[cfg(test)]
mod test_support;

pub use {
    server::{build_app, start_server},
    state::AppState,
    store::{NotificationStore, SqliteStore},
};
