use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Main error type for the transcode server
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Probe error: {0}")]
    Probe(#[from] ProbeError),

    #[error("Transcode error: {0}")]
    Transcode(#[from] TranscodeError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Path(#[from] PathError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failures while inspecting a media file with the external engine.
#[derive(Error, Debug, Clone)]
pub enum ProbeError {
    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("unreadable media format: {0}")]
    UnreadableFormat(String),

    #[error("probe engine failed: {0}")]
    EngineFailure(String),
}

impl ProbeError {
    /// Machine-readable reason code
    pub fn reason(&self) -> &'static str {
        match self {
            ProbeError::FileNotFound(_) => "file-not-found",
            ProbeError::UnreadableFormat(_) => "unreadable-format",
            ProbeError::EngineFailure(_) => "engine-failure",
        }
    }
}

/// Failures while launching or running the transcoding engine.
#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("failed to spawn engine: {0}")]
    SpawnFailed(String),

    #[error("engine exited with {status} before producing output: {stderr}")]
    EngineExited { status: String, stderr: String },

    #[error("engine timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("no {kind} track with index {index}")]
    InvalidTrack { kind: &'static str, index: u32 },

    #[error("subtitle track {0} is bitmap-based and cannot be extracted as text")]
    UnsupportedSubtitle(u32),

    #[error("engine I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TranscodeError {
    pub fn reason(&self) -> &'static str {
        match self {
            TranscodeError::SpawnFailed(_) => "spawn-failed",
            TranscodeError::EngineExited { .. } => "engine-exited",
            TranscodeError::Timeout(_) => "engine-timeout",
            TranscodeError::InvalidTrack { .. } => "invalid-track",
            TranscodeError::UnsupportedSubtitle(_) => "unsupported-subtitle",
            TranscodeError::Io(_) => "engine-io",
        }
    }
}

/// Position / history persistence failures
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("connection pool error: {0}")]
    Pool(String),

    #[error("invalid stored value: {0}")]
    Corrupt(String),

    #[error("store task failed: {0}")]
    Task(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl From<r2d2::Error> for StoreError {
    fn from(err: r2d2::Error) -> Self {
        StoreError::Pool(err.to_string())
    }
}

/// Request path resolution failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Path escapes the media root: {0}")]
    Traversal(String),
}

impl AppError {
    fn status_and_reason(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Path(PathError::Traversal(_)) => (StatusCode::BAD_REQUEST, "traversal"),
            AppError::Path(PathError::NotFound(_)) => (StatusCode::NOT_FOUND, "not-found"),
            AppError::Probe(e @ ProbeError::FileNotFound(_)) => (StatusCode::NOT_FOUND, e.reason()),
            AppError::Probe(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.reason()),
            AppError::Transcode(
                e @ (TranscodeError::InvalidTrack { .. } | TranscodeError::UnsupportedSubtitle(_)),
            ) => (StatusCode::BAD_REQUEST, e.reason()),
            AppError::Transcode(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.reason()),
            AppError::Store(_) => (StatusCode::SERVICE_UNAVAILABLE, "store-failure"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad-request"),
            AppError::Config(_) | AppError::Io(_) | AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, reason) = self.status_and_reason();
        if status.is_server_error() {
            tracing::error!(reason, "{}", self);
        } else {
            tracing::debug!(reason, "{}", self);
        }

        let body = Json(serde_json::json!({
            "error": reason,
            "message": self.to_string(),
        }));
        let mut response = (status, body).into_response();
        response.extensions_mut().insert(ErrorReason(reason));
        response
    }
}

/// Reason code attached to error responses, read by the request logger.
#[derive(Debug, Clone, Copy)]
pub struct ErrorReason(pub &'static str);

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;
