//! HTTP server setup and routing

use super::handlers;
use crate::autodj::Scheduler;
use crate::error::Result;
use crate::playback::Pipeline;
use crate::stream::webrtc::WebRtcHandler;
use crate::stream::Broadcaster;
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;

/// Shared application context passed to all handlers.
#[derive(Clone)]
pub struct AppContext {
    pub scheduler: Arc<Scheduler>,
    pub pipeline: Arc<Pipeline>,
    pub broadcaster: Arc<Broadcaster>,
    pub webrtc: Arc<WebRtcHandler>,
}

/// Run the HTTP server until the token is cancelled.
pub async fn run(port: u16, ctx: AppContext, cancel: CancellationToken) -> Result<()> {
    let app = Router::new()
        // Embedded player UI
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        // Audio transports
        .route("/stream", get(handlers::stream_mp3))
        .route("/offer", post(handlers::webrtc_offer))
        // Control plane
        .route("/api/status", get(handlers::status))
        .route("/api/genre", post(handlers::set_genre))
        .route("/api/skip", post(handlers::skip))
        .route("/api/autodj", post(handlers::set_auto_dj))
        .route("/api/duration", post(handlers::set_track_duration))
        .route("/api/rate", post(handlers::rate))
        .with_state(ctx)
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("everwave radio live on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;

    Ok(())
}
