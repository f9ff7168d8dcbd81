//! HTTP API
//!
//! Axum-based surface for the geocoding worker: a single `POST /geocode`
//! endpoint carrying both request shapes (single address, batch with
//! checkpoint) plus a health probe for the scheduler driving batch
//! continuation.

pub mod handlers;

use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use handlers::AppState;

/// Create the router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/geocode", post(handlers::geocode))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve(state: AppState, bind_addr: &str) -> Result<()> {
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind {bind_addr}"))?;
    info!("HTTP server listening on {}", bind_addr);

    axum::serve(listener, create_router(state)).await?;
    Ok(())
}
