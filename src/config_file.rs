//! Configuration file support
//!
//! Loads server configuration from TOML files. Every section except
//! `[server]` and `[media]` may be omitted; missing values fall back to
//! the defaults in [`crate::config`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::{
    CacheConfig, EngineConfig, PlaybackConfig, ServerConfig, TranscodeConfig,
};

/// Configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Server settings
    pub server: ServerSettings,
    /// Media tree and database locations
    pub media: MediaSettings,
    /// External engine settings
    pub engine: Option<EngineSettings>,
    /// Transcode output settings
    pub transcode: Option<TranscodeSettings>,
    /// Playback state settings
    pub playback: Option<PlaybackSettings>,
    /// Cache settings
    pub cache: Option<CacheSettings>,
    /// Logging settings
    pub logging: Option<LoggingSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Enable CORS
    pub cors_enabled: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaSettings {
    /// Root directory served to clients
    pub root: PathBuf,
    /// SQLite database file for positions and history
    pub database: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    pub ffmpeg: Option<PathBuf>,
    pub ffprobe: Option<PathBuf>,
    pub probe_timeout_secs: Option<u64>,
    pub subtitle_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscodeSettings {
    pub video_encoder: Option<String>,
    pub preset: Option<String>,
    pub crf: Option<u8>,
    pub audio_encoder: Option<String>,
    pub audio_bitrate_kbps: Option<u32>,
    pub audio_channels: Option<u8>,
    /// Grace period before a disconnected session's engine is killed
    pub kill_grace_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackSettings {
    /// Trailing window (seconds) in which a saved position counts as finished
    pub finished_window_secs: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    pub probe_entries: Option<usize>,
    pub subtitle_memory_mb: Option<usize>,
    pub subtitle_entries: Option<usize>,
    pub subtitle_ttl_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: Option<String>,
}

impl ConfigFile {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: ConfigFile = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Generate default configuration file
    pub fn default_config() -> Self {
        let defaults = ServerConfig::default();
        Self {
            server: ServerSettings {
                host: defaults.host,
                port: defaults.port,
                cors_enabled: Some(true),
            },
            media: MediaSettings {
                root: defaults.media_root,
                database: Some(defaults.database_path),
            },
            engine: Some(EngineSettings {
                ffmpeg: Some(defaults.engine.ffmpeg_path),
                ffprobe: Some(defaults.engine.ffprobe_path),
                probe_timeout_secs: Some(defaults.engine.probe_timeout_secs),
                subtitle_timeout_secs: Some(defaults.engine.subtitle_timeout_secs),
            }),
            transcode: Some(TranscodeSettings {
                video_encoder: Some(defaults.transcode.video_encoder),
                preset: Some(defaults.transcode.preset),
                crf: Some(defaults.transcode.crf),
                audio_encoder: Some(defaults.transcode.audio_encoder),
                audio_bitrate_kbps: Some(defaults.transcode.audio_bitrate_kbps),
                audio_channels: Some(defaults.transcode.audio_channels),
                kill_grace_ms: Some(defaults.transcode.kill_grace_ms),
            }),
            playback: Some(PlaybackSettings {
                finished_window_secs: Some(defaults.playback.finished_window_secs),
            }),
            cache: None,
            logging: Some(LoggingSettings {
                level: "info".to_string(),
                format: Some("pretty".to_string()),
            }),
        }
    }

    /// Convert to ServerConfig
    pub fn into_server_config(self) -> ServerConfig {
        let defaults = ServerConfig::default();

        let engine = match self.engine {
            Some(e) => EngineConfig {
                ffmpeg_path: e.ffmpeg.unwrap_or(defaults.engine.ffmpeg_path),
                ffprobe_path: e.ffprobe.unwrap_or(defaults.engine.ffprobe_path),
                probe_timeout_secs: e
                    .probe_timeout_secs
                    .unwrap_or(defaults.engine.probe_timeout_secs),
                subtitle_timeout_secs: e
                    .subtitle_timeout_secs
                    .unwrap_or(defaults.engine.subtitle_timeout_secs),
            },
            None => defaults.engine,
        };

        let transcode = match self.transcode {
            Some(t) => TranscodeConfig {
                video_encoder: t.video_encoder.unwrap_or(defaults.transcode.video_encoder),
                preset: t.preset.unwrap_or(defaults.transcode.preset),
                crf: t.crf.unwrap_or(defaults.transcode.crf),
                audio_encoder: t.audio_encoder.unwrap_or(defaults.transcode.audio_encoder),
                audio_bitrate_kbps: t
                    .audio_bitrate_kbps
                    .unwrap_or(defaults.transcode.audio_bitrate_kbps),
                audio_channels: t.audio_channels.unwrap_or(defaults.transcode.audio_channels),
                kill_grace_ms: t.kill_grace_ms.unwrap_or(defaults.transcode.kill_grace_ms),
            },
            None => defaults.transcode,
        };

        let playback = PlaybackConfig {
            finished_window_secs: self
                .playback
                .and_then(|p| p.finished_window_secs)
                .unwrap_or(defaults.playback.finished_window_secs),
        };

        let cache = match self.cache {
            Some(c) => CacheConfig {
                probe_entries: c.probe_entries.unwrap_or(defaults.cache.probe_entries),
                subtitle_memory_mb: c
                    .subtitle_memory_mb
                    .unwrap_or(defaults.cache.subtitle_memory_mb),
                subtitle_entries: c.subtitle_entries.unwrap_or(defaults.cache.subtitle_entries),
                subtitle_ttl_secs: c
                    .subtitle_ttl_secs
                    .unwrap_or(defaults.cache.subtitle_ttl_secs),
            },
            None => defaults.cache,
        };

        let (log_level, log_format) = match self.logging {
            Some(l) => (l.level, l.format.unwrap_or(defaults.log_format)),
            None => (defaults.log_level, defaults.log_format),
        };

        ServerConfig {
            host: self.server.host,
            port: self.server.port,
            media_root: self.media.root,
            database_path: self.media.database.unwrap_or(defaults.database_path),
            engine,
            transcode,
            playback,
            cache,
            cors_enabled: self.server.cors_enabled.unwrap_or(true),
            log_level,
            log_format,
        }
    }
}

/// Generate default configuration file at the specified path
pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigFile::default_config();
    config.to_file(path)?;
    Ok(())
}
