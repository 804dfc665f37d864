//! Subtitle track extraction through the engine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::engine::{EngineCommand, EngineError};
use crate::error::TranscodeError;

/// Pulls one subtitle stream out of a file as WebVTT.
#[derive(Debug, Clone)]
pub struct SubtitleExtractor {
    ffmpeg_path: PathBuf,
    timeout: Duration,
}

impl SubtitleExtractor {
    pub fn new(ffmpeg_path: PathBuf, timeout: Duration) -> Self {
        Self {
            ffmpeg_path,
            timeout,
        }
    }

    /// Extract stream `index` (engine stream index) in full, unshifted.
    pub async fn extract(&self, path: &Path, index: u32) -> Result<String, TranscodeError> {
        let output = EngineCommand::new(self.ffmpeg_path.clone())
            .args(["-nostdin", "-hide_banner", "-loglevel", "error", "-i"])
            .path_arg(path)
            .args(["-map".to_string(), format!("0:{}", index)])
            .args(["-f", "webvtt", "pipe:1"])
            .timeout(self.timeout)
            .output()
            .await
            .map_err(engine_error)?;

        tracing::debug!(
            path = %path.display(),
            track = index,
            bytes = output.stdout.len(),
            "extracted subtitle track"
        );
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn engine_error(err: EngineError) -> TranscodeError {
    match err {
        EngineError::Spawn { program, source } => {
            TranscodeError::SpawnFailed(format!("{}: {}", program, source))
        }
        EngineError::Timeout { timeout, .. } => TranscodeError::Timeout(timeout),
        EngineError::Exit { status, stderr, .. } => TranscodeError::EngineExited {
            status: status.to_string(),
            stderr,
        },
        EngineError::Io { source, .. } => TranscodeError::Io(source),
    }
}
