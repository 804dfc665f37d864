//! Media inspection
//!
//! This module turns the engine's inspection output into fixed shapes:
//! - [`ProbeResult`] with duration, container and primary codec
//! - Ordered [`AudioTrack`] / [`SubtitleTrack`] lists keyed by engine stream index
//! - Browser compatibility decisions (remux vs re-encode)
//! - A (path, mtime) keyed cache with single-flight probing

pub mod cache;
pub mod ffprobe;

pub use cache::ProbeCache;
pub use ffprobe::FfprobeProber;

use serde::Serialize;

/// An audio stream of the source file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioTrack {
    /// Engine stream index (not necessarily 0-based or contiguous)
    pub index: u32,
    pub label: String,
    pub language: Option<String>,
    pub codec: String,
    pub channels: Option<u32>,
    pub default: bool,
}

/// A subtitle stream of the source file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubtitleTrack {
    /// Engine stream index
    pub index: u32,
    pub label: String,
    pub language: Option<String>,
    pub codec: String,
    /// Picture-based (PGS, VobSub, DVB) rather than text
    pub bitmap: bool,
    pub default: bool,
    pub forced: bool,
}

/// Inspection result for one file. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeResult {
    pub duration_seconds: f64,
    /// Demuxer format name, e.g. "matroska,webm" or "mov,mp4,m4a,3gp,3g2,mj2"
    pub container: String,
    /// Primary codec: the video codec, or the first audio codec for audio-only files
    pub container_codec: String,
    pub video_codec: Option<String>,
    pub audio_tracks: Vec<AudioTrack>,
    pub subtitle_tracks: Vec<SubtitleTrack>,
}

impl ProbeResult {
    pub fn has_video(&self) -> bool {
        self.video_codec.is_some()
    }

    pub fn audio_track(&self, index: u32) -> Option<&AudioTrack> {
        self.audio_tracks.iter().find(|t| t.index == index)
    }

    /// The track played when the client does not choose one.
    pub fn default_audio(&self) -> Option<&AudioTrack> {
        self.audio_tracks.first()
    }

    pub fn subtitle_track(&self, index: u32) -> Option<&SubtitleTrack> {
        self.subtitle_tracks.iter().find(|t| t.index == index)
    }

    /// Position of a subtitle stream among the file's subtitle streams, as
    /// the engine's per-type stream specifiers (`0:s:N`, `si=N`) expect.
    pub fn subtitle_position(&self, index: u32) -> Option<usize> {
        self.subtitle_tracks.iter().position(|t| t.index == index)
    }

    /// Whether a browser cannot play the file directly.
    pub fn needs_transcode(&self) -> bool {
        let container_ok = is_browser_container(&self.container);
        let video_ok = self
            .video_codec
            .as_deref()
            .map(is_browser_video)
            .unwrap_or(true);
        let audio_ok = self
            .default_audio()
            .map(|a| is_browser_audio(&a.codec))
            .unwrap_or(true);
        !(container_ok && video_ok && audio_ok)
    }
}

/// Containers browsers demux natively.
pub fn is_browser_container(format_name: &str) -> bool {
    format_name
        .split(',')
        .any(|f| matches!(f.trim(), "mp4" | "mov" | "m4a" | "webm" | "ogg" | "mp3" | "flac" | "wav"))
}

/// Video codecs browsers decode natively.
pub fn is_browser_video(codec: &str) -> bool {
    matches!(codec, "h264" | "vp8" | "vp9" | "av1")
}

/// Audio codecs browsers decode natively.
pub fn is_browser_audio(codec: &str) -> bool {
    matches!(codec, "aac" | "mp3" | "opus" | "vorbis" | "flac")
}

/// Video codecs that can be stream-copied into fragmented MP4 output.
pub fn can_copy_video(codec: &str) -> bool {
    codec == "h264"
}

/// Audio codecs that can be stream-copied into fragmented MP4 output.
pub fn can_copy_audio(codec: &str) -> bool {
    matches!(codec, "aac" | "mp3")
}

/// Picture-based subtitle codecs (cannot be rendered as text).
pub fn is_bitmap_subtitle(codec: &str) -> bool {
    matches!(
        codec,
        "hdmv_pgs_subtitle" | "dvd_subtitle" | "dvb_subtitle" | "dvb_teletext" | "xsub"
    )
}

/// Human label for a track: title and language when present, otherwise
/// "Track N" with N the 1-based position among tracks of the same kind.
pub fn track_label(title: Option<&str>, language: Option<&str>, position: usize) -> String {
    let title = title.map(str::trim).filter(|t| !t.is_empty());
    let language = language
        .map(str::trim)
        .filter(|l| !l.is_empty() && *l != "und");

    match (title, language) {
        (Some(t), Some(l)) if !t.eq_ignore_ascii_case(l) => format!("{} ({})", t, l),
        (Some(t), _) => t.to_string(),
        (None, Some(l)) => l.to_string(),
        (None, None) => format!("Track {}", position + 1),
    }
}
