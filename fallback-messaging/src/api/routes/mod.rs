//! API route modules.
//!
//! Organizes routes by resource type.

pub mod events;
pub mod health;
pub mod logging;
pub mod messages;

use axum::Router;

use crate::api::server::AppState;

/// Create the main API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/messages", messages::router())
        .nest("/api/events", events::router())
        .nest("/api/logging", logging::router())
        .nest("/health", health::router())
        .with_state(state)
}
