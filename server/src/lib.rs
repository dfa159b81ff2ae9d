//! # hAIfu Deployment Feed Server
//!
//! A local stand-in for the backend's deployment log channel. Each
//! WebSocket subscriber to `/ws/deployment/{resource_id}` is shown a
//! simulated deployment: a status change, five log lines and a completion
//! frame, paced by [`FeedSettings::frame_interval`].
//!
//! ## Endpoints
//! - `GET /ws/deployment/{resource_id}`: WebSocket feed
//! - `GET /api/streams`: open subscriptions

pub mod api;
pub mod handlers;
pub mod protocol;
pub mod scenario;
pub mod state;

pub use state::{AppState, FeedSettings};

use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws/deployment/{resource_id}", get(handlers::ws_handler))
        .route("/api/streams", get(api::list_streams))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serves the feed on an already bound listener until the process exits.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    info!("📜 Deployment feed listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state)).await
}
