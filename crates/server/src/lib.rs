//! Collaborative editing server.
//!
//! Per-document edit sessions ([`session`]) are created and looked up
//! through a [`broker`], and driven over the wire by the axum WebSocket
//! transport in [`ws`]. [`auth`] and [`content_store`] are thin
//! externally-pluggable collaborators; [`error`] is the taxonomy the
//! protocol handler maps onto wire error codes.

pub mod auth;
pub mod broker;
pub mod config;
pub mod content_store;
pub mod error;
pub mod session;
pub mod state;
pub mod ws;

use axum::routing::get;
use axum::Router;

pub use config::AppConfig;
pub use state::AppState;

/// The collaborative editing router: a single WebSocket upgrade endpoint
/// plus a liveness probe, matching the minimal surface spec §4.6 defines.
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws::upgrade))
        .route("/health", get(health_check))
        .with_state(state)
        .layer(tower_http::cors::CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

async fn health_check() -> &'static str {
    "ok"
}
