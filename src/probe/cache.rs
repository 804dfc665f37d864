//! Probe result cache
//!
//! Completed results live in a bounded LRU keyed by (path, mtime), so an
//! edited file is re-probed. Concurrent misses on the same key share one
//! in-flight probe.

use dashmap::DashMap;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use super::{FfprobeProber, ProbeResult};
use crate::error::ProbeError;

type ProbeKey = (PathBuf, SystemTime);

/// Counters exposed through `/metrics`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProbeCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

pub struct ProbeCache {
    prober: FfprobeProber,
    completed: Mutex<LruCache<ProbeKey, Arc<ProbeResult>>>,
    in_flight: DashMap<ProbeKey, Arc<tokio::sync::OnceCell<Arc<ProbeResult>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ProbeCache {
    pub fn new(prober: FfprobeProber, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            prober,
            completed: Mutex::new(LruCache::new(capacity)),
            in_flight: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Probe `path`, reusing a cached result while its mtime is unchanged.
    ///
    /// Failures are returned to every waiter of the flight and never cached.
    pub async fn probe(&self, path: &Path) -> Result<Arc<ProbeResult>, ProbeError> {
        let mtime = tokio::fs::metadata(path)
            .await
            .and_then(|m| m.modified())
            .map_err(|_| ProbeError::FileNotFound(path.display().to_string()))?;
        let key: ProbeKey = (path.to_path_buf(), mtime);

        // Fast path: already probed
        if let Some(result) = self.completed.lock().get(&key).cloned() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(result);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        // Slow path: join or start the in-flight probe for this key
        let cell = self
            .in_flight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(tokio::sync::OnceCell::new()))
            .clone();

        let outcome = cell
            .get_or_try_init(|| async {
                self.prober.probe(path).await.map(Arc::new)
            })
            .await
            .cloned();

        if let Ok(result) = &outcome {
            self.completed.lock().put(key.clone(), result.clone());
        }
        self.in_flight.remove(&key);

        outcome
    }

    pub fn stats(&self) -> ProbeCacheStats {
        ProbeCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.completed.lock().len(),
        }
    }
}
