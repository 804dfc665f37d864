//! Engine command line construction.

use crate::config::TranscodeConfig;

use super::{BurnIn, TranscodePlan};

/// Fragmented MP4 that can be written to a pipe and played while growing.
const MOVFLAGS: &str = "frag_keyframe+empty_moov+default_base_moof";

/// Build the `ffmpeg` arguments for a plan.
///
/// `-ss` comes before `-i` so the engine seeks the input (fast, keyframe
/// based) and output timestamps start at zero.
pub fn build_args(plan: &TranscodePlan, config: &TranscodeConfig) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-nostdin".into(),
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-ss".into(),
        format_seconds(plan.start_time),
        "-i".into(),
        plan.input.to_string_lossy().into_owned(),
    ];

    if plan.has_video {
        match plan.burn_in {
            Some(BurnIn::Bitmap { index }) => {
                args.push("-filter_complex".into());
                args.push(format!("[0:v:0][0:{}]overlay[v]", index));
                args.push("-map".into());
                args.push("[v]".into());
            }
            Some(BurnIn::Text { position }) => {
                args.push("-map".into());
                args.push("0:v:0".into());
                args.push("-vf".into());
                args.push(text_subtitle_filter(plan, position));
            }
            None => {
                args.push("-map".into());
                args.push("0:v:0".into());
            }
        }
    }

    args.push("-map".into());
    args.push(format!("0:{}", plan.audio_index));

    if !plan.has_video {
        args.push("-vn".into());
    } else if plan.copy_video {
        args.extend(["-c:v".to_string(), "copy".to_string()]);
    } else {
        args.extend([
            "-c:v".into(),
            config.video_encoder.clone(),
            "-preset".into(),
            config.preset.clone(),
            "-crf".into(),
            config.crf.to_string(),
            "-pix_fmt".into(),
            "yuv420p".into(),
        ]);
    }

    if plan.copy_audio {
        args.extend(["-c:a".to_string(), "copy".to_string()]);
    } else {
        args.extend([
            "-c:a".into(),
            config.audio_encoder.clone(),
            "-b:a".into(),
            format!("{}k", config.audio_bitrate_kbps),
            "-ac".into(),
            config.audio_channels.to_string(),
        ]);
    }

    args.extend(
        ["-sn", "-dn", "-f", "mp4", "-movflags", MOVFLAGS, "pipe:1"].map(String::from),
    );
    args
}

/// The `subtitles` filter renders cues against frame timestamps, which
/// restart at zero after an input seek; shift them forward for the render
/// and back afterwards.
fn text_subtitle_filter(plan: &TranscodePlan, position: usize) -> String {
    let source = escape_filter_path(&plan.input.to_string_lossy());
    if plan.start_time > 0.0 {
        let offset = format_seconds(plan.start_time);
        format!(
            "setpts=PTS+{offset}/TB,subtitles=filename={source}:si={position},setpts=PTS-STARTPTS"
        )
    } else {
        format!("subtitles=filename={source}:si={position}")
    }
}

/// Escape a path for use as a filter option value inside a filtergraph.
///
/// Two levels: the option value (`\ ' :`), then the graph description
/// (`\ ' [ ] , ;`).
pub fn escape_filter_path(path: &str) -> String {
    let mut value = String::with_capacity(path.len());
    for c in path.chars() {
        if matches!(c, '\\' | '\'' | ':') {
            value.push('\\');
        }
        value.push(c);
    }

    let mut graph = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '\'' | '[' | ']' | ',' | ';') {
            graph.push('\\');
        }
        graph.push(c);
    }
    graph
}

fn format_seconds(seconds: f64) -> String {
    format!("{:.3}", seconds)
}
