//! Resume positions, watch history and continue-watching.
//!
//! Wraps the blocking stores for async handlers and applies the finished
//! window on reads.

use std::sync::Arc;

use crate::error::{AppError, StoreError};
use crate::library::MediaPath;
use crate::store::{HistoryEntry, HistoryStore, PositionStore};

pub struct PlaybackTracker {
    positions: Arc<dyn PositionStore>,
    history: Arc<dyn HistoryStore>,
    finished_window: f64,
}

/// Reported position: positions inside the trailing window of a known
/// duration mean the file was finished, and read back as 0.
pub fn effective_position(stored: f64, duration: Option<f64>, window: f64) -> f64 {
    match duration {
        Some(d) if d > 0.0 && stored >= d - window => 0.0,
        _ => stored,
    }
}

impl PlaybackTracker {
    pub fn new(
        positions: Arc<dyn PositionStore>,
        history: Arc<dyn HistoryStore>,
        finished_window: f64,
    ) -> Self {
        Self {
            positions,
            history,
            finished_window,
        }
    }

    /// Persist a position. Negative and non-finite values are rejected.
    pub async fn save_position(&self, media: &MediaPath, seconds: f64) -> Result<(), AppError> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(AppError::BadRequest(format!(
                "position must be a non-negative number, got {}",
                seconds
            )));
        }
        let store = self.positions.clone();
        let key = media.key().to_string();
        blocking(move || store.save_position(&key, seconds)).await?;
        Ok(())
    }

    /// Stored position for `media`, 0 when absent or finished.
    pub async fn get_position(
        &self,
        media: &MediaPath,
        duration: Option<f64>,
    ) -> Result<f64, AppError> {
        let store = self.positions.clone();
        let key = media.key().to_string();
        let stored = blocking(move || store.get_position(&key)).await?;
        Ok(stored
            .map(|p| effective_position(p.position_seconds, duration, self.finished_window))
            .unwrap_or(0.0))
    }

    pub async fn record_view(&self, media: &MediaPath) -> Result<HistoryEntry, AppError> {
        let store = self.history.clone();
        let key = media.key().to_string();
        let name = media.file_name().to_string();
        let file_type = media.file_type().ok_or_else(|| {
            AppError::BadRequest(format!("{} is not a media file", media.key()))
        })?;
        let entry = blocking(move || store.record_view(&key, &name, file_type)).await?;
        tracing::debug!(path = %entry.path, views = entry.view_count, "recorded view");
        Ok(entry)
    }

    /// Record a view without failing the caller; playback must not depend on
    /// the history store being writable.
    pub async fn record_view_best_effort(&self, media: &MediaPath) {
        if let Err(e) = self.record_view(media).await {
            tracing::warn!(path = media.key(), error = %e, "failed to record view");
        }
    }

    pub async fn history(&self, limit: Option<usize>) -> Result<Vec<HistoryEntry>, AppError> {
        let store = self.history.clone();
        Ok(blocking(move || store.list_history(limit)).await?)
    }

    pub async fn continue_watching(&self) -> Result<Option<HistoryEntry>, AppError> {
        let store = self.history.clone();
        Ok(blocking(move || store.most_recent()).await?)
    }
}

async fn blocking<T, F>(f: F) -> Result<T, StoreError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
}
