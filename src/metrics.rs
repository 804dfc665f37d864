//! Prometheus-compatible metrics endpoint

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::time::{Duration, Instant};

/// Values owned by other components, sampled at export time.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub active_sessions: u64,
    pub sessions_started: u64,
    pub sessions_finished: u64,
    pub bytes_streamed: u64,
    pub probe_cache_hits: u64,
    pub probe_cache_misses: u64,
    pub probe_cache_entries: u64,
    pub subtitle_cache_entries: u64,
    pub subtitle_cache_bytes: u64,
}

/// Metrics collector
#[derive(Debug)]
pub struct Metrics {
    /// Server start time
    start_time: Instant,
    /// Total requests processed
    request_count: RwLock<u64>,
    /// Requests by matched route
    requests_by_endpoint: RwLock<HashMap<String, u64>>,
    /// Error responses by reason
    errors_by_type: RwLock<HashMap<String, u64>>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            request_count: RwLock::new(0),
            requests_by_endpoint: RwLock::new(HashMap::new()),
            errors_by_type: RwLock::new(HashMap::new()),
        }
    }

    /// Record a request
    pub fn record_request(&self, endpoint: &str) {
        *self.request_count.write() += 1;
        *self
            .requests_by_endpoint
            .write()
            .entry(endpoint.to_string())
            .or_insert(0) += 1;
    }

    /// Record an error response
    pub fn record_error(&self, error_type: &str) {
        *self
            .errors_by_type
            .write()
            .entry(error_type.to_string())
            .or_insert(0) += 1;
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self, snapshot: &Snapshot) -> String {
        let mut out = String::new();

        metric(
            &mut out,
            "transcode_server_uptime_seconds",
            "counter",
            "Server uptime in seconds",
            self.uptime_secs(),
        );
        metric(
            &mut out,
            "transcode_server_start_time_seconds",
            "gauge",
            "Server start time as Unix timestamp",
            std::time::SystemTime::UNIX_EPOCH
                .elapsed()
                .unwrap_or(Duration::ZERO)
                .as_secs()
                .saturating_sub(self.uptime_secs()),
        );

        // Requests
        metric(
            &mut out,
            "transcode_requests_total",
            "counter",
            "Total number of HTTP requests",
            *self.request_count.read(),
        );
        labelled(
            &mut out,
            "transcode_requests_by_endpoint",
            "Requests by endpoint",
            "endpoint",
            &self.requests_by_endpoint.read(),
        );
        labelled(
            &mut out,
            "transcode_errors_total",
            "Error responses by reason",
            "type",
            &self.errors_by_type.read(),
        );

        // Sessions
        metric(
            &mut out,
            "transcode_active_sessions",
            "gauge",
            "Engine processes currently streaming",
            snapshot.active_sessions,
        );
        metric(
            &mut out,
            "transcode_sessions_started_total",
            "counter",
            "Transcode sessions started",
            snapshot.sessions_started,
        );
        metric(
            &mut out,
            "transcode_sessions_finished_total",
            "counter",
            "Transcode sessions ended by completion or disconnect",
            snapshot.sessions_finished,
        );
        metric(
            &mut out,
            "transcode_bytes_streamed_total",
            "counter",
            "Bytes delivered by finished sessions",
            snapshot.bytes_streamed,
        );

        // Caches
        metric(
            &mut out,
            "transcode_probe_cache_hits_total",
            "counter",
            "Probe cache hits",
            snapshot.probe_cache_hits,
        );
        metric(
            &mut out,
            "transcode_probe_cache_misses_total",
            "counter",
            "Probe cache misses",
            snapshot.probe_cache_misses,
        );
        let lookups = snapshot.probe_cache_hits + snapshot.probe_cache_misses;
        let hit_ratio = if lookups > 0 {
            snapshot.probe_cache_hits as f64 / lookups as f64
        } else {
            0.0
        };
        let _ = write!(
            out,
            "\n# HELP transcode_probe_cache_hit_ratio Probe cache hit ratio\n\
             # TYPE transcode_probe_cache_hit_ratio gauge\n\
             transcode_probe_cache_hit_ratio {:.4}\n",
            hit_ratio
        );
        metric(
            &mut out,
            "transcode_probe_cache_entries",
            "gauge",
            "Cached probe results",
            snapshot.probe_cache_entries,
        );
        metric(
            &mut out,
            "transcode_subtitle_cache_entries",
            "gauge",
            "Cached subtitle tracks",
            snapshot.subtitle_cache_entries,
        );
        metric(
            &mut out,
            "transcode_subtitle_cache_bytes",
            "gauge",
            "Memory held by cached subtitle tracks",
            snapshot.subtitle_cache_bytes,
        );

        out
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

fn metric(out: &mut String, name: &str, kind: &str, help: &str, value: u64) {
    let _ = write!(
        out,
        "\n# HELP {name} {help}\n# TYPE {name} {kind}\n{name} {value}\n"
    );
}

fn labelled(out: &mut String, name: &str, help: &str, label: &str, values: &HashMap<String, u64>) {
    let _ = write!(out, "\n# HELP {name} {help}\n# TYPE {name} counter\n");
    let mut sorted: Vec<_> = values.iter().collect();
    sorted.sort();
    for (key, count) in sorted {
        let _ = writeln!(out, "{name}{{{label}=\"{key}\"}} {count}");
    }
}
