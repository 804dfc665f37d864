use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// File type recorded in watch history.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Video,
    Audio,
    Image,
    Text,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Video => "video",
            FileType::Audio => "audio",
            FileType::Image => "image",
            FileType::Text => "text",
        }
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "video" => Ok(FileType::Video),
            "audio" => Ok(FileType::Audio),
            "image" => Ok(FileType::Image),
            "text" => Ok(FileType::Text),
            other => Err(format!("unknown file type '{}'", other)),
        }
    }
}

/// Classify a file by extension (case-insensitive). Unknown extensions yield `None`.
pub fn classify(path: &Path) -> Option<FileType> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();

    let kind = match ext.as_str() {
        "mp4" | "m4v" | "mkv" | "avi" | "mov" | "ts" | "m2ts" | "mts" | "mpg" | "mpeg"
        | "wmv" | "flv" | "ogv" | "webm" | "3gp" => FileType::Video,

        "mp3" | "flac" | "wav" | "m4a" | "aac" | "ogg" | "opus" | "wma" | "aiff" | "aif" => {
            FileType::Audio
        }

        "jpg" | "jpeg" | "png" | "gif" | "webp" | "bmp" | "tif" | "tiff" => FileType::Image,

        "txt" | "md" | "srt" | "vtt" | "ass" | "ssa" | "nfo" | "log" => FileType::Text,

        _ => return None,
    };
    Some(kind)
}
