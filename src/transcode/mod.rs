//! On-demand transcoding module
//!
//! This module turns one playback request into one engine process:
//! - Start time clamping and track validation against the probe
//! - Remux vs re-encode decisions per stream
//! - Engine argument construction (input seek, fragmented MP4 to stdout)
//! - Process lifetime tied to the response body
//! - Registry of active sessions

pub mod args;
pub mod registry;
pub mod session;

pub use registry::{SessionInfo, SessionRegistry};
pub use session::TranscodeStream;

use std::path::{Path, PathBuf};

use crate::error::TranscodeError;
use crate::probe::{can_copy_audio, can_copy_video, ProbeResult};

/// Client choices for one playback request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranscodeRequest {
    pub start_time: f64,
    pub audio_track: Option<u32>,
    pub subtitle_track: Option<u32>,
}

/// How a subtitle track is drawn onto the video.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BurnIn {
    /// Text track, rendered by the `subtitles` filter. `position` is the
    /// track's place among the file's subtitle streams.
    Text { position: usize },
    /// Picture track, composited with `overlay`.
    Bitmap { index: u32 },
}

/// Everything needed to build the engine command line.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscodePlan {
    pub input: PathBuf,
    pub start_time: f64,
    pub has_video: bool,
    pub audio_index: u32,
    pub copy_video: bool,
    pub copy_audio: bool,
    pub burn_in: Option<BurnIn>,
}

impl TranscodePlan {
    pub fn content_type(&self) -> &'static str {
        if self.has_video {
            "video/mp4"
        } else {
            "audio/mp4"
        }
    }
}

/// Clamp a requested start offset into the playable range.
///
/// Non-finite and negative values start from the beginning; offsets at or
/// past the end start one second before it. A zero duration (unknown) only
/// applies the lower bound.
pub fn clamp_start_time(requested: f64, duration: f64) -> f64 {
    if !requested.is_finite() || requested < 0.0 {
        return 0.0;
    }
    if duration > 0.0 && requested >= duration {
        return (duration - 1.0).max(0.0);
    }
    requested
}

/// Validate the request against the probe and decide what the engine does.
pub fn plan(
    input: &Path,
    probe: &ProbeResult,
    request: &TranscodeRequest,
) -> Result<TranscodePlan, TranscodeError> {
    let audio = match request.audio_track {
        Some(index) => probe
            .audio_track(index)
            .ok_or(TranscodeError::InvalidTrack { kind: "audio", index })?,
        None => probe.default_audio().ok_or(TranscodeError::InvalidTrack {
            kind: "audio",
            index: 0,
        })?,
    };

    let burn_in = match request.subtitle_track {
        Some(index) => {
            let track = probe
                .subtitle_track(index)
                .ok_or(TranscodeError::InvalidTrack {
                    kind: "subtitle",
                    index,
                })?;
            if !probe.has_video() {
                return Err(TranscodeError::InvalidTrack {
                    kind: "subtitle",
                    index,
                });
            }
            if track.bitmap {
                Some(BurnIn::Bitmap { index })
            } else {
                let position = probe.subtitle_position(index).unwrap_or(0);
                Some(BurnIn::Text { position })
            }
        }
        None => None,
    };

    let copy_video = burn_in.is_none()
        && probe
            .video_codec
            .as_deref()
            .map(can_copy_video)
            .unwrap_or(false);

    Ok(TranscodePlan {
        input: input.to_path_buf(),
        start_time: clamp_start_time(request.start_time, probe.duration_seconds),
        has_video: probe.has_video(),
        audio_index: audio.index,
        copy_video,
        copy_audio: can_copy_audio(&audio.codec),
        burn_in,
    })
}
