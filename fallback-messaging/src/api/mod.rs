//! REST API server module.
//!
//! Provides HTTP endpoints for submitting notifications, receiving provider
//! delivery events and inspecting delivery state.

pub mod error;
pub mod routes;
pub mod server;

pub use server::{ApiServer, ApiServerConfig, AppState};
