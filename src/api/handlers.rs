//! Control-plane request handlers

use super::server::AppContext;
use crate::autodj::is_valid_genre;
use crate::stream::http as mp3_stream;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

/// GET / — the embedded player page.
pub async fn index() -> Html<&'static str> {
    Html(include_str!("index.html"))
}

/// GET /health
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// GET /stream — chunked MP3 audio.
pub async fn stream_mp3(State(ctx): State<AppContext>) -> Response {
    mp3_stream::handle_stream(ctx.broadcaster.clone()).await
}

/// POST /offer — WebRTC SDP negotiation.
pub async fn webrtc_offer(
    State(ctx): State<AppContext>,
    Json(offer): Json<RTCSessionDescription>,
) -> Response {
    match ctx.webrtc.handle_offer(offer).await {
        Ok(answer) => Json(answer).into_response(),
        Err(e) => {
            warn!("webrtc offer failed: {e}");
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

/// GET /api/status
pub async fn status(State(ctx): State<AppContext>) -> Json<serde_json::Value> {
    let dj = ctx.scheduler.status();
    let (track, position, duration) = ctx.pipeline.status();

    Json(json!({
        "genre": dj.genre,
        "auto_dj": dj.auto_dj,
        "dwell_remaining": dj.dwell_remaining,
        "queue_size": dj.queue_size,
        "track_id": track.id,
        "track_name": track.name,
        "caption": ctx.scheduler.last_caption(),
        "position": position.as_secs_f64(),
        "duration": duration.as_secs_f64(),
        "track_duration": ctx.scheduler.track_duration(),
        "http_listeners": ctx.broadcaster.listener_count(),
        "webrtc_listeners": ctx.webrtc.peer_count(),
    }))
}

#[derive(Deserialize)]
pub struct GenreRequest {
    genre: String,
}

/// POST /api/genre — manual genre override.
pub async fn set_genre(
    State(ctx): State<AppContext>,
    Json(req): Json<GenreRequest>,
) -> Response {
    if !is_valid_genre(&req.genre) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "unknown genre" })),
        )
            .into_response();
    }
    ctx.scheduler.set_genre(req.genre.clone());
    Json(json!({ "ok": true, "genre": req.genre })).into_response()
}

/// POST /api/skip
pub async fn skip(State(ctx): State<AppContext>) -> Json<serde_json::Value> {
    ctx.scheduler.skip();
    Json(json!({ "ok": true }))
}

#[derive(Deserialize)]
pub struct AutoDjRequest {
    enabled: bool,
}

/// POST /api/autodj
pub async fn set_auto_dj(
    State(ctx): State<AppContext>,
    Json(req): Json<AutoDjRequest>,
) -> Json<serde_json::Value> {
    ctx.scheduler.set_auto_dj(req.enabled);
    Json(json!({ "ok": true, "auto_dj": req.enabled }))
}

#[derive(Deserialize)]
pub struct DurationRequest {
    seconds: u32,
}

/// POST /api/duration — duration of future generated tracks, clamped.
pub async fn set_track_duration(
    State(ctx): State<AppContext>,
    Json(req): Json<DurationRequest>,
) -> Json<serde_json::Value> {
    ctx.scheduler.set_track_duration(req.seconds);
    Json(json!({ "ok": true, "seconds": ctx.scheduler.track_duration() }))
}

#[derive(Deserialize)]
pub struct RateRequest {
    rating: i32,
}

/// POST /api/rate — logged for now; nothing is learned from it.
pub async fn rate(
    State(ctx): State<AppContext>,
    Json(req): Json<RateRequest>,
) -> Json<serde_json::Value> {
    let (track, _, _) = ctx.pipeline.status();
    info!(
        "rating: track={} genre={} rating={}",
        track.id, track.genre, req.rating
    );
    Json(json!({ "ok": true }))
}
