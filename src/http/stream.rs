//! Streaming endpoints: transcoded media and rebased subtitles.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::{AppError, TranscodeError};
use crate::state::AppState;
use crate::transcode::TranscodeRequest;

/// Header carrying the session id of a transcode response.
pub const SESSION_HEADER: &str = "x-transcode-session";

#[derive(Debug, Deserialize)]
pub struct TranscodeQuery {
    #[serde(default)]
    pub start_time: f64,
    pub audio_track: Option<u32>,
    pub subtitle_track: Option<u32>,
    /// Set by players restarting the stream for a seek or track switch;
    /// such requests are not counted as views.
    #[serde(default)]
    pub seek: bool,
}

/// GET /transcode/{*path}
///
/// One engine process per request. The response body owns the process:
/// when the client goes away the body is dropped and the engine is reaped.
pub async fn transcode(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
    Query(query): Query<TranscodeQuery>,
) -> Result<Response, AppError> {
    let media = state.resolve(&path)?;
    let request = TranscodeRequest {
        start_time: query.start_time,
        audio_track: query.audio_track,
        subtitle_track: query.subtitle_track,
    };

    let (plan, stream) = state.open_transcode(&media, &request).await?;
    if !query.seek {
        state.playback.record_view_best_effort(&media).await;
    }

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, plan.content_type())
        .header(header::CACHE_CONTROL, "no-store")
        .header(SESSION_HEADER, stream.id().to_string())
        .body(Body::from_stream(stream))
        .map_err(|e| AppError::Internal(format!("building transcode response: {}", e)))
}

#[derive(Debug, Deserialize)]
pub struct SubtitleQuery {
    pub track: u32,
    #[serde(default)]
    pub offset: f64,
}

/// GET /api/subtitles/{*path}?track=N&offset=S
pub async fn subtitles(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
    Query(query): Query<SubtitleQuery>,
) -> Result<Response, AppError> {
    let media = state.resolve(&path)?;
    let probe = state.probe(&media).await?;

    let track = probe
        .subtitle_track(query.track)
        .ok_or(TranscodeError::InvalidTrack {
            kind: "subtitle",
            index: query.track,
        })?;
    if track.bitmap {
        return Err(TranscodeError::UnsupportedSubtitle(query.track).into());
    }

    let vtt = state
        .subtitles
        .rebased_track(media.absolute(), query.track, query.offset)
        .await?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/vtt; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        vtt,
    )
        .into_response())
}
