//! Inspection through the `ffprobe` CLI.
//!
//! Runs `ffprobe -v error -print_format json -show_format -show_streams`
//! and maps the JSON output into [`ProbeResult`].

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{is_bitmap_subtitle, track_label, AudioTrack, ProbeResult, SubtitleTrack};
use crate::engine::{EngineCommand, EngineError};
use crate::error::ProbeError;

/// A prober backed by the `ffprobe` binary.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    ffprobe_path: PathBuf,
    timeout: Duration,
}

impl FfprobeProber {
    pub fn new(ffprobe_path: PathBuf, timeout: Duration) -> Self {
        Self {
            ffprobe_path,
            timeout,
        }
    }

    /// Inspect one file. Not cached; see [`super::ProbeCache`].
    pub async fn probe(&self, path: &Path) -> Result<ProbeResult, ProbeError> {
        if !path.is_file() {
            return Err(ProbeError::FileNotFound(path.display().to_string()));
        }

        let output = EngineCommand::new(self.ffprobe_path.clone())
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .path_arg(path)
            .timeout(self.timeout)
            .output()
            .await
            .map_err(|e| match e {
                EngineError::Exit { ref stderr, .. } if is_format_complaint(stderr) => {
                    ProbeError::UnreadableFormat(stderr.clone())
                }
                other => ProbeError::EngineFailure(other.to_string()),
            })?;

        let parsed = parse_output(&output.stdout)?;
        tracing::debug!(
            path = %path.display(),
            duration = parsed.duration_seconds,
            codec = %parsed.container_codec,
            audio_tracks = parsed.audio_tracks.len(),
            subtitle_tracks = parsed.subtitle_tracks.len(),
            "probed media"
        );
        Ok(parsed)
    }
}

fn is_format_complaint(stderr: &str) -> bool {
    stderr.contains("Invalid data found") || stderr.contains("could not find codec parameters")
}

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    format_name: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    index: u32,
    codec_type: Option<String>,
    codec_name: Option<String>,
    channels: Option<u32>,
    duration: Option<String>,
    #[serde(default)]
    disposition: FfprobeDisposition,
    #[serde(default)]
    tags: FfprobeTags,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeDisposition {
    #[serde(default)]
    default: u8,
    #[serde(default)]
    forced: u8,
    #[serde(default)]
    attached_pic: u8,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeTags {
    language: Option<String>,
    title: Option<String>,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Map raw ffprobe JSON into a [`ProbeResult`].
pub fn parse_output(stdout: &[u8]) -> Result<ProbeResult, ProbeError> {
    let output: FfprobeOutput = serde_json::from_slice(stdout)
        .map_err(|e| ProbeError::UnreadableFormat(format!("ffprobe JSON parse error: {}", e)))?;

    let format = output.format.ok_or_else(|| {
        ProbeError::UnreadableFormat("ffprobe reported no container format".to_string())
    })?;

    let mut video_codec = None;
    let mut audio_tracks = Vec::new();
    let mut subtitle_tracks = Vec::new();
    let mut longest_stream = 0.0_f64;

    for stream in output.streams {
        let codec = stream.codec_name.clone().unwrap_or_else(|| "unknown".to_string());
        if let Some(d) = stream.duration.as_deref().and_then(parse_seconds) {
            longest_stream = longest_stream.max(d);
        }

        match stream.codec_type.as_deref() {
            // Cover art shows up as a single-frame video stream.
            Some("video") if stream.disposition.attached_pic == 0 => {
                if video_codec.is_none() {
                    video_codec = Some(codec);
                }
            }
            Some("audio") => {
                let position = audio_tracks.len();
                audio_tracks.push(AudioTrack {
                    index: stream.index,
                    label: track_label(
                        stream.tags.title.as_deref(),
                        stream.tags.language.as_deref(),
                        position,
                    ),
                    language: stream.tags.language.clone(),
                    codec,
                    channels: stream.channels,
                    default: stream.disposition.default == 1,
                });
            }
            Some("subtitle") => {
                let position = subtitle_tracks.len();
                subtitle_tracks.push(SubtitleTrack {
                    index: stream.index,
                    label: track_label(
                        stream.tags.title.as_deref(),
                        stream.tags.language.as_deref(),
                        position,
                    ),
                    language: stream.tags.language.clone(),
                    bitmap: is_bitmap_subtitle(&codec),
                    codec,
                    default: stream.disposition.default == 1,
                    forced: stream.disposition.forced == 1,
                });
            }
            _ => {}
        }
    }

    if audio_tracks.is_empty() {
        return Err(ProbeError::UnreadableFormat(
            "no audio stream found".to_string(),
        ));
    }

    let duration_seconds = format
        .duration
        .as_deref()
        .and_then(parse_seconds)
        .unwrap_or(longest_stream);

    let container_codec = video_codec
        .clone()
        .unwrap_or_else(|| audio_tracks[0].codec.clone());

    Ok(ProbeResult {
        duration_seconds,
        container: format.format_name.unwrap_or_default(),
        container_codec,
        video_codec,
        audio_tracks,
        subtitle_tracks,
    })
}

fn parse_seconds(s: &str) -> Option<f64> {
    s.trim()
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d >= 0.0)
}
