//! JSON side-channel endpoints used by the player page.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::AppError;
use crate::library::{self, Adjacent};
use crate::state::AppState;
use crate::store::HistoryEntry;

/// GET /api/video-info/{*path}
pub async fn video_info(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let media = state.resolve(&path)?;
    let probe = state.probe(&media).await?;

    Ok(Json(serde_json::json!({
        "duration": probe.duration_seconds,
        "codec": probe.container_codec,
        "container": probe.container,
        "has_video": probe.has_video(),
        "needs_transcode": probe.needs_transcode(),
    })))
}

#[derive(Debug, Serialize)]
pub struct AudioTrackView {
    pub index: u32,
    pub label: String,
    pub language: Option<String>,
    pub codec: String,
}

#[derive(Debug, Serialize)]
pub struct SubtitleTrackView {
    pub index: u32,
    pub label: String,
    pub language: Option<String>,
    pub codec: String,
    /// Bitmap tracks can only be burned in, not fetched as WebVTT
    pub bitmap: bool,
}

#[derive(Debug, Serialize)]
pub struct TrackList<T> {
    pub tracks: Vec<T>,
}

/// GET /api/audio-tracks/{*path}
pub async fn audio_tracks(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> Result<Json<TrackList<AudioTrackView>>, AppError> {
    let media = state.resolve(&path)?;
    let probe = state.probe(&media).await?;

    let tracks = probe
        .audio_tracks
        .iter()
        .map(|t| AudioTrackView {
            index: t.index,
            label: t.label.clone(),
            language: t.language.clone(),
            codec: t.codec.clone(),
        })
        .collect();
    Ok(Json(TrackList { tracks }))
}

/// GET /api/subtitle-tracks/{*path}
pub async fn subtitle_tracks(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> Result<Json<TrackList<SubtitleTrackView>>, AppError> {
    let media = state.resolve(&path)?;
    let probe = state.probe(&media).await?;

    let tracks = probe
        .subtitle_tracks
        .iter()
        .map(|t| SubtitleTrackView {
            index: t.index,
            label: t.label.clone(),
            language: t.language.clone(),
            codec: t.codec.clone(),
            bitmap: t.bitmap,
        })
        .collect();
    Ok(Json(TrackList { tracks }))
}

#[derive(Debug, Deserialize)]
pub struct SavePositionBody {
    pub position: f64,
}

/// POST /api/save-position/{*path}
///
/// Store failures are logged and still acknowledged; the player keeps
/// playing either way.
pub async fn save_position(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
    Json(body): Json<SavePositionBody>,
) -> Result<StatusCode, AppError> {
    let media = state.resolve(&path)?;
    match state.playback.save_position(&media, body.position).await {
        Ok(()) => {}
        Err(AppError::Store(e)) => {
            tracing::warn!(path = media.key(), error = %e, "failed to save position");
        }
        Err(e) => return Err(e),
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/get-position/{*path}
pub async fn get_position(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let media = state.resolve(&path)?;
    let duration = state.known_duration(&media).await;
    let position = state.playback.get_position(&media, duration).await?;
    Ok(Json(serde_json::json!({ "position": position })))
}

/// GET /api/adjacent-videos/{*path}
pub async fn adjacent_videos(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> Result<Json<Adjacent>, AppError> {
    let media = state.resolve(&path)?;
    let adjacent = tokio::task::spawn_blocking(move || library::adjacent(&media))
        .await
        .map_err(|e| AppError::Internal(format!("adjacency task failed: {}", e)))??;
    Ok(Json(adjacent))
}

/// GET /api/continue-watching
pub async fn continue_watching(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let latest = state.playback.continue_watching().await?;
    Ok(Json(match latest {
        Some(entry) => serde_json::json!({
            "file_path": entry.path,
            "file_type": entry.file_type,
            "file_name": entry.name,
        }),
        None => serde_json::json!({}),
    }))
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub count: usize,
    pub history: Vec<HistoryEntry>,
}

/// GET /api/history
pub async fn history(
    State(state): State<Arc<AppState>>,
) -> Result<Json<HistoryResponse>, AppError> {
    let history = state.playback.history(None).await?;
    Ok(Json(HistoryResponse {
        count: history.len(),
        history,
    }))
}

/// POST /api/record-view/{*path}
///
/// For files the browser plays natively, which never hit `/transcode`.
pub async fn record_view(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let media = state.resolve(&path)?;
    let entry = state.playback.record_view(&media).await?;
    Ok(Json(serde_json::json!({
        "file_path": entry.path,
        "view_count": entry.view_count,
    })))
}
