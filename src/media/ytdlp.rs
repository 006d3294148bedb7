use super::downloader::{DownloadJob, Downloader};
use super::error::DownloadError;
use super::types::{format_duration, quality_height_ceiling, MediaKind, VideoFormat, VideoInfo};
use crate::classifier::Platform;
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Adapter around the yt-dlp command-line tool. Metadata mode emits one JSON
/// object on stdout; download mode writes a single media file to the output
/// template and exits zero on success.
pub struct YtDlp {
    program: PathBuf,
    metadata_timeout: Duration,
    download_timeout: Duration,
}

impl YtDlp {
    /// An explicit configured path wins; otherwise the bare program name is
    /// used and resolved through `PATH` by the OS.
    pub fn new(
        program: Option<PathBuf>,
        metadata_timeout: Duration,
        download_timeout: Duration,
    ) -> Self {
        Self {
            program: program.unwrap_or_else(|| PathBuf::from("yt-dlp")),
            metadata_timeout,
            download_timeout,
        }
    }

    /// yt-dlp format selector for the requested kind and quality label.
    pub fn format_selector(kind: MediaKind, quality: &str) -> String {
        match kind {
            MediaKind::Audio => "bestaudio/best".to_string(),
            MediaKind::Video => match quality_height_ceiling(quality) {
                Some(h) => {
                    format!("bestvideo[height<={h}]+bestaudio/best[height<={h}]/best")
                }
                None => "best".to_string(),
            },
        }
    }

    async fn run_with_timeout(
        &self,
        mut cmd: Command,
        timeout: Duration,
    ) -> Result<std::process::Output, DownloadError> {
        let output = tokio::time::timeout(timeout, cmd.kill_on_drop(true).output())
            .await
            .map_err(|_| DownloadError::Timeout(timeout.as_secs()))?
            .map_err(|e| DownloadError::ToolFailed(format!("failed to invoke yt-dlp: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DownloadError::ToolFailed(stderr.trim().to_string()));
        }

        Ok(output)
    }

    /// Metadata-only invocation, mapped into a `VideoInfo`.
    pub async fn fetch_video_info(
        &self,
        url: &str,
        platform: Platform,
        content_id: &str,
    ) -> Result<VideoInfo, DownloadError> {
        debug!("Extracting metadata with yt-dlp for: {}", url);

        let mut cmd = Command::new(&self.program);
        cmd.arg("--dump-json")
            .arg("--no-download")
            .arg("--no-warnings")
            .arg(url);

        let output = self.run_with_timeout(cmd, self.metadata_timeout).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);

        parse_video_info(&stdout, platform, content_id)
    }

    /// Probes tool availability. Failure here is not fatal; the fallback
    /// providers still run without it.
    pub async fn is_available(&self) -> bool {
        match Command::new(&self.program).arg("--version").output().await {
            Ok(output) if output.status.success() => {
                let version = String::from_utf8_lossy(&output.stdout);
                info!("yt-dlp is available, version: {}", version.trim());
                true
            }
            Ok(_) => {
                warn!("yt-dlp command failed");
                false
            }
            Err(e) => {
                warn!("yt-dlp not found: {}", e);
                false
            }
        }
    }
}

/// Maps one yt-dlp JSON object into a `VideoInfo`, defaulting missing fields.
/// Unparsable output is a distinct error from a failed invocation.
pub fn parse_video_info(
    raw: &str,
    platform: Platform,
    content_id: &str,
) -> Result<VideoInfo, DownloadError> {
    let json: Value = serde_json::from_str(raw).map_err(DownloadError::ParseFailed)?;

    let duration = json["duration"]
        .as_f64()
        .map(|secs| format_duration(secs as u64))
        .unwrap_or_else(|| "00:00".to_string());

    let formats = json["formats"]
        .as_array()
        .map(|entries| {
            entries
                .iter()
                .filter_map(|f| {
                    let url = f["url"].as_str()?;
                    let quality = f["format_note"]
                        .as_str()
                        .map(|s| s.to_string())
                        .or_else(|| f["height"].as_u64().map(|h| format!("{h}p")))
                        .unwrap_or_else(|| "unknown".to_string());

                    Some(VideoFormat {
                        format_id: f["format_id"].as_str().unwrap_or_default().to_string(),
                        ext: f["ext"].as_str().unwrap_or_default().to_string(),
                        quality,
                        filesize: f["filesize"].as_u64(),
                        url: url.to_string(),
                        note: f["format"].as_str().map(|s| s.to_string()),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(VideoInfo {
        id: json["id"].as_str().unwrap_or(content_id).to_string(),
        title: json["title"]
            .as_str()
            .unwrap_or("Unknown Title")
            .to_string(),
        thumbnail: json["thumbnail"].as_str().unwrap_or_default().to_string(),
        duration,
        uploader: json["uploader"].as_str().unwrap_or("Unknown").to_string(),
        platform,
        formats,
    })
}

#[async_trait]
impl Downloader for YtDlp {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn download(&self, job: &DownloadJob) -> Result<PathBuf, DownloadError> {
        info!("Downloading {} with yt-dlp: {}", job.content_id, job.url);

        let template = job.output_dir.join(format!("{}.%(ext)s", job.stem));

        let mut cmd = Command::new(&self.program);
        cmd.arg("--no-warnings")
            .arg("--no-playlist")
            .arg("--format")
            .arg(Self::format_selector(job.kind, &job.quality))
            .arg("--output")
            .arg(&template);

        match job.kind {
            MediaKind::Audio => {
                // Extract to mp3 at the best VBR setting
                cmd.arg("--extract-audio")
                    .arg("--audio-format")
                    .arg("mp3")
                    .arg("--audio-quality")
                    .arg("0");
            }
            MediaKind::Video => {
                cmd.arg("--merge-output-format").arg("mp4");
            }
        }

        cmd.arg(&job.url);

        self.run_with_timeout(cmd, self.download_timeout).await?;

        // The tool exits zero but may choose its own final extension, so the
        // artifact is located by stem prefix rather than trusted by name.
        job.find_output()
            .ok_or_else(|| DownloadError::OutputMissing(job.stem.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_selector_video_with_ceiling() {
        assert_eq!(
            YtDlp::format_selector(MediaKind::Video, "1080p"),
            "bestvideo[height<=1080]+bestaudio/best[height<=1080]/best"
        );
        assert_eq!(
            YtDlp::format_selector(MediaKind::Video, "2160p (4K)"),
            "bestvideo[height<=2160]+bestaudio/best[height<=2160]/best"
        );
    }

    #[test]
    fn test_format_selector_unrecognized_label_is_unconstrained() {
        assert_eq!(YtDlp::format_selector(MediaKind::Video, "ultra"), "best");
        assert_eq!(YtDlp::format_selector(MediaKind::Video, ""), "best");
    }

    #[test]
    fn test_format_selector_audio() {
        assert_eq!(
            YtDlp::format_selector(MediaKind::Audio, "192kbps"),
            "bestaudio/best"
        );
    }

    #[test]
    fn test_parse_video_info_maps_fields() {
        let raw = r#"{
            "id": "dQw4w9WgXcQ",
            "title": "Some Video",
            "thumbnail": "https://i.ytimg.com/vi/dQw4w9WgXcQ/hq720.jpg",
            "duration": 212.0,
            "uploader": "Some Channel",
            "formats": [
                {"format_id": "18", "ext": "mp4", "height": 360, "url": "https://cdn/18", "filesize": 123456},
                {"format_id": "251", "ext": "webm", "format_note": "audio only", "url": "https://cdn/251"}
            ]
        }"#;

        let info = parse_video_info(raw, Platform::Youtube, "dQw4w9WgXcQ").unwrap();
        assert_eq!(info.title, "Some Video");
        assert_eq!(info.duration, "3:32");
        assert_eq!(info.uploader, "Some Channel");
        assert_eq!(info.formats.len(), 2);
        assert_eq!(info.formats[0].quality, "360p");
        assert_eq!(info.formats[0].filesize, Some(123456));
        assert_eq!(info.formats[1].quality, "audio only");
    }

    #[test]
    fn test_parse_video_info_defaults_missing_fields() {
        let info = parse_video_info("{}", Platform::Youtube, "abc12345678").unwrap();
        assert_eq!(info.id, "abc12345678");
        assert_eq!(info.title, "Unknown Title");
        assert_eq!(info.duration, "00:00");
        assert_eq!(info.uploader, "Unknown");
        assert!(info.formats.is_empty());
    }

    #[test]
    fn test_parse_video_info_broken_json_is_parse_error() {
        let err = parse_video_info("not json at all", Platform::Youtube, "x").unwrap_err();
        assert!(matches!(err, DownloadError::ParseFailed(_)));
    }

    #[tokio::test]
    async fn test_run_with_timeout_reports_timeout() {
        let ytdlp = YtDlp::new(
            Some(PathBuf::from("sleep")),
            Duration::from_millis(100),
            Duration::from_millis(100),
        );

        let mut cmd = Command::new("sleep");
        cmd.arg("5");
        let err = ytdlp
            .run_with_timeout(cmd, Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::Timeout(_)));
    }
}
