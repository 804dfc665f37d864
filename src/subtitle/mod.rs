//! Subtitle delivery module
//!
//! This module serves text subtitle tracks as WebVTT aligned to a playback
//! offset:
//! - Track extraction through the engine (`-f webvtt`)
//! - Cue parsing and rebasing (shift, drop, clamp)
//! - Memory-bounded cache of raw extracted tracks keyed by (path, mtime, track)
//! - Single-flight extraction per key

pub mod cache;
pub mod extractor;
pub mod webvtt;

pub use cache::SubtitleCache;
pub use extractor::SubtitleExtractor;

use bytes::Bytes;
use dashmap::DashMap;
use std::path::Path;
use std::sync::Arc;

use crate::config::ServerConfig;
use crate::error::TranscodeError;

/// Extraction plus caching of subtitle tracks.
pub struct Subtitles {
    extractor: SubtitleExtractor,
    cache: SubtitleCache,
    in_flight: DashMap<String, Arc<tokio::sync::OnceCell<Bytes>>>,
}

impl Subtitles {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            extractor: SubtitleExtractor::new(
                config.engine.ffmpeg_path.clone(),
                config.engine.subtitle_timeout(),
            ),
            cache: SubtitleCache::new(&config.cache),
            in_flight: DashMap::new(),
        }
    }

    /// WebVTT for text track `index` of `path`, with cues shifted so that
    /// `offset_seconds` in the file is time zero.
    pub async fn rebased_track(
        &self,
        path: &Path,
        index: u32,
        offset_seconds: f64,
    ) -> Result<String, TranscodeError> {
        let raw = self.raw_track(path, index).await?;
        let cues = webvtt::parse(&String::from_utf8_lossy(&raw));
        let cues = webvtt::rebase(cues, webvtt::offset_to_ms(offset_seconds));
        Ok(webvtt::render(&cues))
    }

    /// The unshifted track, from cache or a (shared) engine run.
    async fn raw_track(&self, path: &Path, index: u32) -> Result<Bytes, TranscodeError> {
        let mtime = tokio::fs::metadata(path).await?.modified()?;
        let key = SubtitleCache::make_key(path, mtime, index);

        // Fast path: already extracted
        if let Some(data) = self.cache.get(&key) {
            return Ok(data);
        }

        // Slow path: get-or-create an in-flight cell for this key
        let cell = self
            .in_flight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(tokio::sync::OnceCell::new()))
            .clone();

        let outcome = cell
            .get_or_try_init(|| async {
                self.extractor.extract(path, index).await.map(Bytes::from)
            })
            .await
            .cloned();

        if let Ok(data) = &outcome {
            self.cache.insert(key.clone(), data.clone());
        }
        self.in_flight.remove(&key);

        outcome
    }

    pub fn cache(&self) -> &SubtitleCache {
        &self.cache
    }
}
