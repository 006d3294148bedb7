use crate::classifier::Platform;
use serde::{Deserialize, Serialize};

/// Media kind requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
}

impl MediaKind {
    /// Container extension for files produced on this path.
    pub fn extension(&self) -> &'static str {
        match self {
            MediaKind::Video => "mp4",
            MediaKind::Audio => "mp3",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoFormat {
    pub format_id: String,
    pub ext: String,
    pub quality: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filesize: Option<u64>,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Per-request metadata about a single video or post. Built transiently and
/// returned in the HTTP response, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoInfo {
    pub id: String,
    pub title: String,
    pub thumbnail: String,
    pub duration: String,
    pub uploader: String,
    pub platform: Platform,
    pub formats: Vec<VideoFormat>,
}

impl VideoInfo {
    /// Minimal metadata derived from the URL only. Used when the extraction
    /// tool is unavailable or fails; this path never errors.
    pub fn placeholder(platform: Platform, content_id: &str) -> Self {
        let thumbnail = match platform {
            Platform::Youtube => {
                format!("https://img.youtube.com/vi/{content_id}/hqdefault.jpg")
            }
            Platform::Instagram => String::new(),
        };

        Self {
            id: content_id.to_string(),
            title: "Unknown Title".to_string(),
            thumbnail,
            duration: "00:00".to_string(),
            uploader: "Unknown".to_string(),
            platform,
            formats: Vec::new(),
        }
    }
}

/// Incoming body of `POST /api/download`.
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadRequest {
    pub url: String,
    pub format: MediaKind,
    #[serde(default)]
    pub quality: String,
}

/// Pixel-height ceiling for a quality label, or `None` for unrecognized
/// labels (unconstrained "best available").
pub fn quality_height_ceiling(label: &str) -> Option<u32> {
    match label {
        "2160p (4K)" => Some(2160),
        "1440p" => Some(1440),
        "1080p" => Some(1080),
        "720p" => Some(720),
        "480p" => Some(480),
        "360p" => Some(360),
        _ => None,
    }
}

/// Renders a duration in seconds as `H:MM:SS`, or `M:SS` under an hour.
pub fn format_duration(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}
