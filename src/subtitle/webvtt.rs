//! WebVTT cue parsing, rebasing and rendering.

use std::fmt::Write as _;

// helper.
macro_rules! regex {
    ($re:literal $(,)?) => {{
        static RE: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
        RE.get_or_init(|| regex::Regex::new($re).unwrap())
    }};
}

/// A single timed cue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cue {
    pub id: Option<String>,
    pub start_ms: i64,
    pub end_ms: i64,
    /// Cue settings after the end timestamp ("line:0 align:start"), verbatim
    pub settings: String,
    pub text: String,
}

impl Cue {
    pub fn new(start_ms: i64, end_ms: i64, text: impl Into<String>) -> Self {
        Self {
            id: None,
            start_ms,
            end_ms,
            settings: String::new(),
            text: text.into(),
        }
    }
}

/// Parse cues from WebVTT (or SRT-style) text.
///
/// Header, NOTE, STYLE and REGION blocks are skipped, as is any block
/// without a timing line.
pub fn parse(input: &str) -> Vec<Cue> {
    let normalized = input.replace("\r\n", "\n").replace('\r', "\n");
    let mut cues = Vec::new();

    for block in normalized.split("\n\n") {
        let lines: Vec<&str> = block.lines().filter(|l| !l.trim().is_empty()).collect();
        let Some(timing_at) = lines.iter().position(|l| l.contains("-->")) else {
            continue;
        };
        let Some((start_ms, end_ms, settings)) = parse_timing(lines[timing_at]) else {
            continue;
        };

        let id = match timing_at {
            0 => None,
            n => Some(lines[n - 1].trim().to_string()),
        };
        cues.push(Cue {
            id,
            start_ms,
            end_ms,
            settings,
            text: lines[timing_at + 1..].join("\n"),
        });
    }
    cues
}

/// Parse "00:01:02.500 --> 00:01:04.000 align:start".
fn parse_timing(line: &str) -> Option<(i64, i64, String)> {
    let caps = regex!(
        r"^\s*((?:\d+:)?\d{1,2}:\d{2}[.,]\d{1,3})\s+-->\s+((?:\d+:)?\d{1,2}:\d{2}[.,]\d{1,3})(.*)$"
    )
    .captures(line)?;

    let start = parse_timestamp(caps.get(1)?.as_str())?;
    let end = parse_timestamp(caps.get(2)?.as_str())?;
    let settings = caps.get(3).map(|m| m.as_str().trim()).unwrap_or("").to_string();
    Some((start, end, settings))
}

/// Parse "HH:MM:SS.mmm", "MM:SS.mmm" or the SRT comma form into milliseconds.
pub fn parse_timestamp(ts: &str) -> Option<i64> {
    let (clock, frac) = ts.trim().split_once(['.', ','])?;
    let mut millis: i64 = frac.parse().ok()?;
    // "5" means 500 ms, "05" means 50 ms
    for _ in frac.len()..3 {
        millis *= 10;
    }

    let parts: Vec<i64> = clock
        .split(':')
        .map(|p| p.parse::<i64>().ok())
        .collect::<Option<Vec<_>>>()?;
    let seconds = match parts.as_slice() {
        [h, m, s] => h * 3600 + m * 60 + s,
        [m, s] => m * 60 + s,
        _ => return None,
    };
    Some(seconds * 1000 + millis)
}

/// Format milliseconds as "HH:MM:SS.mmm".
pub fn format_timestamp(ms: i64) -> String {
    let total_ms = ms.max(0) as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let seconds = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;
    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, millis)
}

/// Shift every cue earlier by `offset_ms`.
///
/// Cues that end at or before the new origin are dropped; cues straddling
/// it start at zero.
pub fn rebase(cues: Vec<Cue>, offset_ms: i64) -> Vec<Cue> {
    cues.into_iter()
        .filter_map(|mut cue| {
            let end = cue.end_ms - offset_ms;
            if end <= 0 {
                return None;
            }
            cue.start_ms = (cue.start_ms - offset_ms).max(0);
            cue.end_ms = end;
            Some(cue)
        })
        .collect()
}

/// Render cues as a WebVTT document.
pub fn render(cues: &[Cue]) -> String {
    let mut out = String::from("WEBVTT\n\n");
    for cue in cues {
        if let Some(id) = &cue.id {
            let _ = writeln!(out, "{}", id);
        }
        let _ = write!(
            out,
            "{} --> {}",
            format_timestamp(cue.start_ms),
            format_timestamp(cue.end_ms)
        );
        if !cue.settings.is_empty() {
            let _ = write!(out, " {}", cue.settings);
        }
        let _ = write!(out, "\n{}\n\n", cue.text);
    }
    out
}

/// Convert an offset in seconds to whole milliseconds; invalid offsets are 0.
pub fn offset_to_ms(offset_seconds: f64) -> i64 {
    if !offset_seconds.is_finite() || offset_seconds < 0.0 {
        return 0;
    }
    (offset_seconds * 1000.0).round() as i64
}
