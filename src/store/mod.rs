//! Durable playback state
//!
//! Two stores keyed by the media path key:
//! - [`PositionStore`]: last watched offset per file, last writer wins
//! - [`HistoryStore`]: one entry per file with an atomically incremented
//!   view count and the time of the latest view
//!
//! [`SqliteStore`] is the durable implementation; [`MemoryStore`] backs tests
//! and throwaway servers. Both are blocking and called from blocking tasks.

pub mod memory;
pub mod migrations;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::Serialize;

use crate::error::StoreError;
use crate::library::FileType;

/// Last watched offset of one file.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackPosition {
    pub path: String,
    pub position_seconds: f64,
    pub updated_at: DateTime<Utc>,
}

/// Watch history of one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    #[serde(rename = "file_path")]
    pub path: String,
    #[serde(rename = "file_name")]
    pub name: String,
    pub file_type: FileType,
    pub view_count: u64,
    pub last_watched: DateTime<Utc>,
}

pub trait PositionStore: Send + Sync {
    /// Upsert the position; returns once the write is durable.
    fn save_position(&self, path: &str, seconds: f64) -> Result<(), StoreError>;

    fn get_position(&self, path: &str) -> Result<Option<PlaybackPosition>, StoreError>;
}

pub trait HistoryStore: Send + Sync {
    /// Count one view of `path`: insert with a count of 1 or increment by
    /// exactly 1, and move `last_watched` to now. Atomic per path.
    fn record_view(
        &self,
        path: &str,
        name: &str,
        file_type: FileType,
    ) -> Result<HistoryEntry, StoreError>;

    /// Entries by `last_watched` descending, ties by path.
    fn list_history(&self, limit: Option<usize>) -> Result<Vec<HistoryEntry>, StoreError>;

    fn most_recent(&self) -> Result<Option<HistoryEntry>, StoreError> {
        Ok(self.list_history(Some(1))?.into_iter().next())
    }
}

/// Current time at the precision timestamps are stored with.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Fixed-width RFC 3339 form, so text order equals time order.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("timestamp {:?}: {}", s, e)))
}
