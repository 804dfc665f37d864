//! Application state management
//!
//! This module defines the AppState structure that holds:
//! - Server configuration and the served media root
//! - Probe cache and subtitle delivery
//! - Playback position / history tracking
//! - Active transcode sessions
//! - Metrics

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::error::AppError;
use crate::library::{MediaPath, MediaRoot};
use crate::metrics::{Metrics, Snapshot};
use crate::playback::PlaybackTracker;
use crate::probe::{FfprobeProber, ProbeCache, ProbeResult};
use crate::store::{HistoryStore, MemoryStore, PositionStore, SqliteStore};
use crate::subtitle::Subtitles;
use crate::transcode::{self, args, session, SessionInfo, SessionRegistry, TranscodeRequest};

/// `database_path` value selecting the in-memory stores.
pub const MEMORY_DATABASE: &str = ":memory:";

/// Shared application state
pub struct AppState {
    pub config: ServerConfig,
    pub root: MediaRoot,
    pub probes: ProbeCache,
    pub subtitles: Subtitles,
    pub playback: PlaybackTracker,
    pub sessions: Arc<SessionRegistry>,
    pub metrics: Metrics,
}

impl AppState {
    /// Build state around already opened stores.
    pub fn new(
        config: ServerConfig,
        root: MediaRoot,
        positions: Arc<dyn PositionStore>,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        let prober = FfprobeProber::new(
            config.engine.ffprobe_path.clone(),
            config.engine.probe_timeout(),
        );
        Self {
            root,
            probes: ProbeCache::new(prober, config.cache.probe_entries),
            subtitles: Subtitles::new(&config),
            playback: PlaybackTracker::new(
                positions,
                history,
                config.playback.finished_window_secs,
            ),
            sessions: Arc::new(SessionRegistry::new()),
            metrics: Metrics::new(),
            config,
        }
    }

    /// Open the media root and the SQLite database named in `config`.
    ///
    /// A database path of `:memory:` keeps playback state in process memory.
    pub fn open(config: ServerConfig) -> Result<Self, AppError> {
        let root = MediaRoot::new(&config.media_root).map_err(|e| {
            AppError::Config(format!(
                "media root {}: {}",
                config.media_root.display(),
                e
            ))
        })?;
        if config.database_path.as_os_str() == MEMORY_DATABASE {
            tracing::warn!("playback state is kept in memory and lost on restart");
            let store = Arc::new(MemoryStore::new());
            return Ok(Self::new(config, root, store.clone(), store));
        }
        let store = Arc::new(SqliteStore::open(&config.database_path)?);
        tracing::info!(database = %config.database_path.display(), "opened playback database");
        Ok(Self::new(config, root, store.clone(), store))
    }

    pub fn resolve(&self, raw: &str) -> Result<MediaPath, AppError> {
        Ok(self.root.resolve(raw)?)
    }

    pub async fn probe(&self, media: &MediaPath) -> Result<Arc<ProbeResult>, AppError> {
        Ok(self.probes.probe(media.absolute()).await?)
    }

    /// Duration if the file can be probed; used where it is optional.
    pub async fn known_duration(&self, media: &MediaPath) -> Option<f64> {
        match self.probe(media).await {
            Ok(probe) => Some(probe.duration_seconds),
            Err(e) => {
                tracing::debug!(path = media.key(), error = %e, "duration unavailable");
                None
            }
        }
    }

    /// Validate the request, launch the engine and wait for its first bytes.
    pub async fn open_transcode(
        &self,
        media: &MediaPath,
        request: &TranscodeRequest,
    ) -> Result<(transcode::TranscodePlan, transcode::TranscodeStream), AppError> {
        let probe = self.probe(media).await?;
        let plan = transcode::plan(media.absolute(), &probe, request)?;
        let args = args::build_args(&plan, &self.config.transcode);

        let info = SessionInfo::new(
            media.key(),
            plan.start_time,
            plan.audio_index,
            request.subtitle_track,
        );
        let stream = session::open(
            &self.config.engine.ffmpeg_path,
            args,
            info,
            self.sessions.clone(),
            self.config.transcode.kill_grace(),
        )
        .await?;
        Ok((plan, stream))
    }

    /// Sample the counters owned by other components for `/metrics`.
    pub fn metrics_snapshot(&self) -> Snapshot {
        let probe = self.probes.stats();
        Snapshot {
            active_sessions: self.sessions.len() as u64,
            sessions_started: self.sessions.started_total(),
            sessions_finished: self.sessions.finished_total(),
            bytes_streamed: self.sessions.bytes_streamed(),
            probe_cache_hits: probe.hits,
            probe_cache_misses: probe.misses,
            probe_cache_entries: probe.entries as u64,
            subtitle_cache_entries: self.subtitles.cache().len() as u64,
            subtitle_cache_bytes: self.subtitles.cache().memory_usage() as u64,
        }
    }
}
