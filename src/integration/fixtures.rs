//! Test fixtures
//!
//! Stand-in engine scripts, canned probe output and a server over a
//! temporary media tree. Nothing here needs a real ffmpeg install.

use axum::Router;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use crate::config::ServerConfig;
use crate::error::StoreError;
use crate::http::create_router;
use crate::library::{FileType, MediaRoot};
use crate::state::AppState;
use crate::store::{HistoryEntry, HistoryStore, MemoryStore, PlaybackPosition, PositionStore};

/// Container reported for the `.mp4` samples.
pub const MP4_FORMAT: &str = "mov,mp4,m4a,3gp,3g2,mj2";

/// What the default fake engine writes for a transcode run.
pub const FAKE_STREAM: &[u8] = b"\x00\x00\x00\x18ftypisom-fragmented-output";

/// Subtitle track the default fake engine extracts.
pub const FAKE_TRACK: &str = "WEBVTT\n\n00:00:02.000 --> 00:00:04.000\nearly\n\n\
    00:00:10.000 --> 00:00:12.000\nlater\n";

/// Write an executable shell script.
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
    path
}

/// A fake ffprobe printing `json`. Each run appends a line to `count_file`
/// and then sleeps `delay_secs`, so concurrent callers overlap.
pub fn fake_ffprobe(dir: &Path, json: &str, count_file: Option<&Path>, delay_secs: f64) -> PathBuf {
    let mut body = String::new();
    if let Some(count) = count_file {
        body.push_str(&format!("echo run >> '{}'\n", count.display()));
    }
    if delay_secs > 0.0 {
        body.push_str(&format!("sleep {}\n", delay_secs));
    }
    body.push_str(&format!("cat <<'EOF'\n{}\nEOF", json));
    write_script(dir, "ffprobe", &body)
}

/// Canned ffprobe JSON in a matroska container. See [`probe_json_in`].
pub fn probe_json(video: &str, audio: &[&str], duration: f64) -> String {
    let format = if video.is_empty() { "mp3" } else { "matroska,webm" };
    probe_json_in(format, video, audio, duration)
}

/// Canned ffprobe JSON.
///
/// Stream layout: video at 0 (omitted when `video` is empty), the audio
/// tracks next, then one SubRip and one PGS subtitle track.
pub fn probe_json_in(format: &str, video: &str, audio: &[&str], duration: f64) -> String {
    let mut streams = Vec::new();
    if !video.is_empty() {
        streams.push(serde_json::json!({
            "index": 0,
            "codec_type": "video",
            "codec_name": video,
            "disposition": { "default": 1, "attached_pic": 0 },
        }));
    }
    for codec in audio {
        streams.push(serde_json::json!({
            "index": streams.len(),
            "codec_type": "audio",
            "codec_name": codec,
            "channels": 6,
            "disposition": { "default": u8::from(streams.len() <= 1) },
            "tags": { "language": "eng" },
        }));
    }
    streams.push(serde_json::json!({
        "index": streams.len(),
        "codec_type": "subtitle",
        "codec_name": "subrip",
        "tags": { "language": "eng", "title": "English" },
    }));
    streams.push(serde_json::json!({
        "index": streams.len(),
        "codec_type": "subtitle",
        "codec_name": "hdmv_pgs_subtitle",
        "tags": { "language": "fre" },
    }));

    serde_json::json!({
        "format": { "format_name": format, "duration": format!("{:.6}", duration) },
        "streams": streams,
    })
    .to_string()
}

/// A store whose every call fails, as a locked or unwritable database would.
#[derive(Debug, Default)]
pub struct FailingStore;

impl FailingStore {
    fn fail<T>() -> Result<T, StoreError> {
        Err(StoreError::Database("database is locked".to_string()))
    }
}

impl PositionStore for FailingStore {
    fn save_position(&self, _path: &str, _seconds: f64) -> Result<(), StoreError> {
        Self::fail()
    }

    fn get_position(&self, _path: &str) -> Result<Option<PlaybackPosition>, StoreError> {
        Self::fail()
    }
}

impl HistoryStore for FailingStore {
    fn record_view(
        &self,
        _path: &str,
        _name: &str,
        _file_type: FileType,
    ) -> Result<HistoryEntry, StoreError> {
        Self::fail()
    }

    fn list_history(&self, _limit: Option<usize>) -> Result<Vec<HistoryEntry>, StoreError> {
        Self::fail()
    }
}

/// Whether `pid` is a live (non-zombie) process.
pub fn process_alive(pid: u32) -> bool {
    let Ok(stat) = std::fs::read_to_string(format!("/proc/{}/stat", pid)) else {
        return false;
    };
    // The state field follows the parenthesised command name.
    match stat.rfind(')') {
        Some(end) => !stat[end + 1..].trim_start().starts_with('Z'),
        None => true,
    }
}

/// Poll `check` until it holds or `timeout` passes.
pub async fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

/// A server over a temporary media tree:
///
/// ```text
/// show/a.mp4 show/b.mp4 show/c.mp4   h264/aac, 100s
/// movie.mkv                          hevc + aac/ac3 (1, 2), subrip 3, pgs 4, 120s
/// song.mp3                           mp3 (0), subrip 1, pgs 2, 200s
/// broken.avi                         rejected by the prober
/// notes.txt
/// ```
///
/// Playback state lives in a [`MemoryStore`] unless built with
/// [`TestServer::with_failing_store`].
pub struct TestServer {
    dir: TempDir,
    state: Arc<AppState>,
}

impl TestServer {
    pub fn new() -> Self {
        Self::build(None, |_| {}, false)
    }

    /// Replace the fake ffmpeg with a script running `body`.
    pub fn with_ffmpeg(body: &str) -> Self {
        Self::build(Some(body), |_| {}, false)
    }

    pub fn with_config(tweak: impl FnOnce(&mut ServerConfig)) -> Self {
        Self::build(None, tweak, false)
    }

    /// Back playback state with a [`FailingStore`].
    pub fn with_failing_store() -> Self {
        Self::build(None, |_| {}, true)
    }

    fn build(
        ffmpeg_body: Option<&str>,
        tweak: impl FnOnce(&mut ServerConfig),
        failing_store: bool,
    ) -> Self {
        let dir = TempDir::new().unwrap();
        let media = dir.path().join("media");
        let bin = dir.path().join("bin");
        std::fs::create_dir_all(media.join("show")).unwrap();
        std::fs::create_dir_all(&bin).unwrap();

        for name in ["show/a.mp4", "show/b.mp4", "show/c.mp4", "movie.mkv", "song.mp3", "broken.avi", "notes.txt"] {
            std::fs::write(media.join(name), b"media").unwrap();
        }

        let probes = [
            ("default.json", probe_json_in(MP4_FORMAT, "h264", &["aac"], 100.0)),
            ("movie.json", probe_json("hevc", &["aac", "ac3"], 120.0)),
            ("song.json", probe_json("", &["mp3"], 200.0)),
        ];
        for (name, json) in &probes {
            std::fs::write(bin.join(name), json).unwrap();
        }
        std::fs::write(bin.join("track.vtt"), FAKE_TRACK).unwrap();

        let b = bin.display();
        let ffprobe = write_script(
            &bin,
            "ffprobe",
            &format!(
                "for last; do :; done\n\
                 case \"$last\" in\n\
                 *movie.mkv) cat '{b}/movie.json' ;;\n\
                 *song.mp3) cat '{b}/song.json' ;;\n\
                 *broken.avi) echo 'Invalid data found when processing input' >&2; exit 1 ;;\n\
                 *) cat '{b}/default.json' ;;\n\
                 esac"
            ),
        );

        let default_ffmpeg = format!(
            "case \"$*\" in\n\
             *\"-f webvtt\"*) cat '{b}/track.vtt' ;;\n\
             *) printf '{}' ;;\n\
             esac",
            escape_printf(FAKE_STREAM)
        );
        let ffmpeg = write_script(&bin, "ffmpeg", ffmpeg_body.unwrap_or(default_ffmpeg.as_str()));

        let mut config = ServerConfig::default();
        config.media_root = media.clone();
        config.database_path = dir.path().join("unused.db");
        config.engine.ffmpeg_path = ffmpeg;
        config.engine.ffprobe_path = ffprobe;
        config.engine.probe_timeout_secs = 5;
        config.engine.subtitle_timeout_secs = 5;
        config.transcode.kill_grace_ms = 200;
        tweak(&mut config);

        let root = MediaRoot::new(&media).unwrap();
        let state = if failing_store {
            let store = Arc::new(FailingStore);
            AppState::new(config, root, store.clone(), store)
        } else {
            let store = Arc::new(MemoryStore::new());
            AppState::new(config, root, store.clone(), store)
        };
        let state = Arc::new(state);

        Self { dir, state }
    }

    pub fn router(&self) -> Router {
        create_router(self.state.clone())
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Root of the served tree.
    pub fn media_dir(&self) -> PathBuf {
        self.dir.path().join("media")
    }

    /// Scratch space outside the served tree.
    pub fn outside_dir(&self) -> &Path {
        self.dir.path()
    }
}

fn escape_printf(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| match b {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' => (*b as char).to_string(),
            other => format!("\\{:03o}", other),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ffprobe::parse_output;

    #[test]
    fn test_probe_json_layout() {
        let parsed = parse_output(probe_json("hevc", &["aac", "ac3"], 120.0).as_bytes()).unwrap();
        assert_eq!(parsed.video_codec.as_deref(), Some("hevc"));
        let audio: Vec<u32> = parsed.audio_tracks.iter().map(|t| t.index).collect();
        assert_eq!(audio, vec![1, 2]);
        let subs: Vec<(u32, bool)> = parsed.subtitle_tracks.iter().map(|t| (t.index, t.bitmap)).collect();
        assert_eq!(subs, vec![(3, false), (4, true)]);
        assert_eq!(parsed.duration_seconds, 120.0);
    }

    #[test]
    fn test_audio_only_layout() {
        let parsed = parse_output(probe_json("", &["mp3"], 200.0).as_bytes()).unwrap();
        assert!(!parsed.has_video());
        assert_eq!(parsed.audio_tracks[0].index, 0);
        assert_eq!(parsed.container, "mp3");
    }

    #[test]
    fn test_escape_printf() {
        assert_eq!(escape_printf(b"ab\x00 "), "ab\\000\\040");
    }

    #[test]
    fn test_process_alive() {
        assert!(process_alive(std::process::id()));
        assert!(!process_alive(u32::MAX));
    }
}
