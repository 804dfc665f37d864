//! LRU Subtitle Cache
//!
//! Keeps extracted WebVTT tracks in memory so repeated seeks only rebase
//! cues instead of re-running the engine.

use bytes::Bytes;
use dashmap::DashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::CacheConfig;

/// Cache entry with metadata
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub data: Bytes,
    pub created_at: SystemTime,
    pub last_accessed: SystemTime,
}

impl CacheEntry {
    pub fn new(data: Bytes) -> Self {
        let now = SystemTime::now();
        Self {
            data,
            created_at: now,
            last_accessed: now,
        }
    }

    pub fn touch(&mut self) {
        self.last_accessed = SystemTime::now();
    }

    pub fn age_secs(&self) -> u64 {
        self.created_at.elapsed().map(|d| d.as_secs()).unwrap_or(0)
    }

    pub fn is_expired(&self, ttl_secs: u64) -> bool {
        self.age_secs() > ttl_secs
    }
}

/// Memory-bounded cache of extracted subtitle tracks
pub struct SubtitleCache {
    /// Cache entries (key -> entry)
    entries: DashMap<String, CacheEntry>,
    /// Current memory usage in bytes
    memory_bytes: AtomicUsize,
    max_memory_bytes: usize,
    max_entries: usize,
    ttl_secs: u64,
}

impl SubtitleCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            memory_bytes: AtomicUsize::new(0),
            max_memory_bytes: config.subtitle_memory_bytes(),
            max_entries: config.subtitle_entries.max(1),
            ttl_secs: config.subtitle_ttl_secs,
        }
    }

    /// Cache key for one track of one version of a file
    pub fn make_key(path: &Path, mtime: SystemTime, track: u32) -> String {
        let nanos = mtime
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        format!("{}:{}:{}", path.display(), nanos, track)
    }

    /// Get a cached track; expired entries count as misses
    pub fn get(&self, key: &str) -> Option<Bytes> {
        if let Some(mut entry) = self.entries.get_mut(key) {
            if !entry.is_expired(self.ttl_secs) {
                entry.touch();
                return Some(entry.data.clone());
            }
        }
        if let Some((_, entry)) = self
            .entries
            .remove_if(key, |_, entry| entry.is_expired(self.ttl_secs))
        {
            self.memory_bytes.fetch_sub(entry.data.len(), Ordering::Relaxed);
        }
        None
    }

    /// Cache a track. Tracks larger than the whole budget are not kept.
    pub fn insert(&self, key: String, data: Bytes) {
        let size = data.len();
        if size > self.max_memory_bytes {
            tracing::debug!(key = %key, size, "subtitle track too large to cache");
            return;
        }

        if self.memory_bytes.load(Ordering::Relaxed) + size > self.max_memory_bytes
            || self.entries.len() >= self.max_entries
        {
            self.evict_for(size);
        }

        if let Some(previous) = self.entries.insert(key, CacheEntry::new(data)) {
            self.memory_bytes
                .fetch_sub(previous.data.len(), Ordering::Relaxed);
        }
        self.memory_bytes.fetch_add(size, Ordering::Relaxed);
    }

    /// Drop expired entries, then least recently used ones until the new
    /// data fits under both limits.
    fn evict_for(&self, needed_size: usize) {
        self.clear_expired();

        let mut entries: Vec<(String, SystemTime, usize)> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().last_accessed, e.value().data.len()))
            .collect();
        entries.sort_by_key(|(_, last_accessed, _)| *last_accessed);

        let mut memory = self.memory_bytes.load(Ordering::Relaxed);
        let mut count = self.entries.len();
        for (key, _, len) in entries {
            if memory + needed_size <= self.max_memory_bytes && count < self.max_entries {
                break;
            }
            if let Some((_, entry)) = self.entries.remove(&key) {
                self.memory_bytes
                    .fetch_sub(entry.data.len(), Ordering::Relaxed);
                memory = memory.saturating_sub(len);
                count -= 1;
            }
        }
    }

    /// Clear all expired entries
    pub fn clear_expired(&self) {
        let mut freed = 0;
        self.entries.retain(|_, entry| {
            if entry.is_expired(self.ttl_secs) {
                freed += entry.data.len();
                false
            } else {
                true
            }
        });
        self.memory_bytes.fetch_sub(freed, Ordering::Relaxed);
    }

    /// Get the number of cached entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get current memory usage in bytes
    pub fn memory_usage(&self) -> usize {
        self.memory_bytes.load(Ordering::Relaxed)
    }
}
