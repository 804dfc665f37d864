//! Server configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// External engine (ffmpeg / ffprobe) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Path or name of the ffmpeg binary
    pub ffmpeg_path: PathBuf,

    /// Path or name of the ffprobe binary
    pub ffprobe_path: PathBuf,

    /// Maximum time an inspection run may take
    pub probe_timeout_secs: u64,

    /// Maximum time a subtitle extraction run may take
    pub subtitle_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            probe_timeout_secs: 30,
            subtitle_timeout_secs: 120,
        }
    }
}

impl EngineConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn subtitle_timeout(&self) -> Duration {
        Duration::from_secs(self.subtitle_timeout_secs)
    }
}

/// Transcoding output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscodeConfig {
    /// Video encoder used when the source video cannot be copied
    pub video_encoder: String,

    /// Encoder speed preset
    pub preset: String,

    /// Constant rate factor for the video encoder
    pub crf: u8,

    /// Audio encoder used when the source audio cannot be copied
    pub audio_encoder: String,

    /// Audio bitrate in kbps
    pub audio_bitrate_kbps: u32,

    /// Output channel count for re-encoded audio
    pub audio_channels: u8,

    /// How long a disconnected session's engine may take to exit before it is killed
    pub kill_grace_ms: u64,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            video_encoder: "libx264".to_string(),
            preset: "veryfast".to_string(),
            crf: 23,
            audio_encoder: "aac".to_string(),
            audio_bitrate_kbps: 192,
            audio_channels: 2,
            kill_grace_ms: 2000,
        }
    }
}

impl TranscodeConfig {
    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }
}

/// Playback state configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Positions this close to the end of a file read back as 0 (finished)
    pub finished_window_secs: f64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            finished_window_secs: 5.0,
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of probe results kept in memory
    pub probe_entries: usize,

    /// Maximum memory usage for extracted subtitles in megabytes
    pub subtitle_memory_mb: usize,

    /// Maximum number of extracted subtitle tracks to cache
    pub subtitle_entries: usize,

    /// Time-to-live for cached subtitles in seconds
    pub subtitle_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            probe_entries: 1024,
            subtitle_memory_mb: 64,
            subtitle_entries: 256,
            subtitle_ttl_secs: 1800, // 30 minutes
        }
    }
}

impl CacheConfig {
    /// Get maximum subtitle cache memory in bytes
    pub fn subtitle_memory_bytes(&self) -> usize {
        self.subtitle_memory_mb * 1024 * 1024
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Root of the served media tree
    pub media_root: PathBuf,

    /// SQLite database holding positions and history
    pub database_path: PathBuf,

    /// Engine configuration
    pub engine: EngineConfig,

    /// Transcode configuration
    pub transcode: TranscodeConfig,

    /// Playback state configuration
    pub playback: PlaybackConfig,

    /// Cache configuration
    pub cache: CacheConfig,

    /// Enable CORS
    pub cors_enabled: bool,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Log output format (pretty, json)
    pub log_format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            media_root: PathBuf::from("/app/data"),
            database_path: PathBuf::from("playback.db"),
            engine: EngineConfig::default(),
            transcode: TranscodeConfig::default(),
            playback: PlaybackConfig::default(),
            cache: CacheConfig::default(),
            cors_enabled: true,
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

impl ServerConfig {
    /// Get the socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
