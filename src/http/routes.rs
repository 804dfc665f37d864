//! Axum router configuration

use axum::{
    http::{header, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

use super::api;
use super::handlers::{active_sessions, health_check, metrics_handler, version_check};
use super::middleware::request_logger;
use super::stream;

/// Create the Axum router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        // Health, version and metrics
        .route("/health", get(health_check))
        .route("/version", get(version_check))
        .route("/metrics", get(metrics_handler))
        // Debug endpoints
        .route("/debug/sessions", get(active_sessions))
        // Streaming
        .route("/transcode/{*path}", get(stream::transcode))
        .route("/api/subtitles/{*path}", get(stream::subtitles))
        // Media metadata
        .route("/api/video-info/{*path}", get(api::video_info))
        .route("/api/audio-tracks/{*path}", get(api::audio_tracks))
        .route("/api/subtitle-tracks/{*path}", get(api::subtitle_tracks))
        // Playback state
        .route("/api/save-position/{*path}", post(api::save_position))
        .route("/api/get-position/{*path}", get(api::get_position))
        .route("/api/record-view/{*path}", post(api::record_view))
        .route("/api/adjacent-videos/{*path}", get(api::adjacent_videos))
        .route("/api/continue-watching", get(api::continue_watching))
        .route("/api/history", get(api::history))
        // Middleware
        .layer(middleware::from_fn_with_state(state.clone(), request_logger))
        .layer(TraceLayer::new_for_http());

    if state.config.cors_enabled {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS, Method::HEAD])
            .allow_headers([
                header::ACCEPT,
                header::RANGE,
                header::CONTENT_TYPE,
                header::ORIGIN,
            ])
            .expose_headers([header::HeaderName::from_static(stream::SESSION_HEADER)])
            .max_age(Duration::from_secs(3600));
        router = router.layer(cors);
    }

    router.with_state(state)
}
