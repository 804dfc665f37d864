//! In-memory stores. Nothing survives a restart.

use dashmap::DashMap;

use super::{now, HistoryEntry, HistoryStore, PlaybackPosition, PositionStore};
use crate::error::StoreError;
use crate::library::FileType;

#[derive(Debug, Default)]
pub struct MemoryStore {
    positions: DashMap<String, PlaybackPosition>,
    history: DashMap<String, HistoryEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PositionStore for MemoryStore {
    fn save_position(&self, path: &str, seconds: f64) -> Result<(), StoreError> {
        self.positions.insert(
            path.to_string(),
            PlaybackPosition {
                path: path.to_string(),
                position_seconds: seconds,
                updated_at: now(),
            },
        );
        Ok(())
    }

    fn get_position(&self, path: &str) -> Result<Option<PlaybackPosition>, StoreError> {
        Ok(self.positions.get(path).map(|p| p.value().clone()))
    }
}

impl HistoryStore for MemoryStore {
    fn record_view(
        &self,
        path: &str,
        name: &str,
        file_type: FileType,
    ) -> Result<HistoryEntry, StoreError> {
        let watched = now();
        // The entry guard holds the shard lock for the whole read-modify-write.
        let entry = self
            .history
            .entry(path.to_string())
            .and_modify(|e| {
                e.view_count += 1;
                e.name = name.to_string();
                e.file_type = file_type;
                e.last_watched = e.last_watched.max(watched);
            })
            .or_insert_with(|| HistoryEntry {
                path: path.to_string(),
                name: name.to_string(),
                file_type,
                view_count: 1,
                last_watched: watched,
            });
        Ok(entry.value().clone())
    }

    fn list_history(&self, limit: Option<usize>) -> Result<Vec<HistoryEntry>, StoreError> {
        let mut entries: Vec<HistoryEntry> =
            self.history.iter().map(|e| e.value().clone()).collect();
        entries.sort_by(|a, b| {
            b.last_watched
                .cmp(&a.last_watched)
                .then_with(|| a.path.cmp(&b.path))
        });
        if let Some(limit) = limit {
            entries.truncate(limit);
        }
        Ok(entries)
    }
}
