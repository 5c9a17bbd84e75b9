//! HTTP server setup and routing
//!
//! Sets up the Axum HTTP server with the control endpoints and SSE.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::jukebox::Jukebox;
use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub jukebox: Arc<Jukebox>,
}

/// Build the router with all routes and layers attached
pub fn build_router(ctx: AppContext) -> Router {
    Router::new()
        .route("/health", get(super::handlers::health))
        // Requests and queue
        .route("/request_song", post(super::handlers::request_song))
        .route("/queue", get(super::handlers::get_queue))
        .route("/toggle_clean_mode", post(super::handlers::toggle_clean_mode))
        // Playback control
        .route("/currentlyPlayingSong", get(super::handlers::currently_playing))
        .route("/pauseToggle", post(super::handlers::pause_toggle))
        .route("/skip", post(super::handlers::skip))
        .route(
            "/volume",
            get(super::handlers::get_volume).post(super::handlers::set_volume),
        )
        // SSE event stream
        .route("/events", get(super::sse::event_stream))
        .with_state(ctx)
        // Any origin may call the API (LAN clients on arbitrary hosts)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Run the HTTP API server until `shutdown` resolves
pub async fn run<F>(config: &Config, jukebox: Arc<Jukebox>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr: SocketAddr = format!("{}:{}", config.bind_address, config.port)
        .parse()
        .map_err(|e| {
            Error::Config(format!(
                "Invalid bind address {}:{}: {}",
                config.bind_address, config.port, e
            ))
        })?;

    let app = build_router(AppContext { jukebox });

    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    info!("HTTP server stopped");
    Ok(())
}
