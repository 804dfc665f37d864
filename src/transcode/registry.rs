//! Active transcode sessions.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// One running engine process and what it is serving.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub id: Uuid,
    pub path: String,
    pub start_time: f64,
    pub audio_track: u32,
    pub subtitle_track: Option<u32>,
    pub pid: Option<u32>,
    pub started_at: DateTime<Utc>,
}

impl SessionInfo {
    pub fn new(path: &str, start_time: f64, audio_track: u32, subtitle_track: Option<u32>) -> Self {
        Self {
            id: Uuid::new_v4(),
            path: path.to_string(),
            start_time,
            audio_track,
            subtitle_track,
            pid: None,
            started_at: Utc::now(),
        }
    }
}

/// Sessions currently streaming, plus lifetime counters.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    active: DashMap<Uuid, SessionInfo>,
    started: AtomicU64,
    finished: AtomicU64,
    bytes_streamed: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, info: SessionInfo) {
        self.started.fetch_add(1, Ordering::Relaxed);
        self.active.insert(info.id, info);
    }

    /// Remove a session and account for the bytes it delivered.
    pub fn finish(&self, id: &Uuid, bytes: u64) -> Option<SessionInfo> {
        let removed = self.active.remove(id).map(|(_, info)| info);
        if removed.is_some() {
            self.finished.fetch_add(1, Ordering::Relaxed);
            self.bytes_streamed.fetch_add(bytes, Ordering::Relaxed);
        }
        removed
    }

    /// Active sessions, oldest first.
    pub fn list(&self) -> Vec<SessionInfo> {
        let mut sessions: Vec<SessionInfo> =
            self.active.iter().map(|entry| entry.value().clone()).collect();
        sessions.sort_by_key(|s| s.started_at);
        sessions
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn started_total(&self) -> u64 {
        self.started.load(Ordering::Relaxed)
    }

    pub fn finished_total(&self) -> u64 {
        self.finished.load(Ordering::Relaxed)
    }

    pub fn bytes_streamed(&self) -> u64 {
        self.bytes_streamed.load(Ordering::Relaxed)
    }
}
