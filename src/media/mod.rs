mod cleanup;
mod downloader;
mod error;
mod providers;
mod types;
mod ytdlp;

pub use cleanup::sweep;
pub use downloader::{DownloadJob, Downloader};
pub use error::DownloadError;
pub use types::{DownloadRequest, MediaKind, VideoFormat, VideoInfo};

use crate::classifier;
use crate::config::Config;
use anyhow::Result;
use providers::{CobaltProvider, PipedProvider};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{info, warn};
use ytdlp::YtDlp;

/// A finished download: the artifact on disk plus the name it is served as.
#[derive(Debug, Clone)]
pub struct CompletedDownload {
    pub filename: String,
    pub path: PathBuf,
}

/// Orchestrates one download per request over an ordered adapter chain:
/// yt-dlp first, then the hosted fallback providers. Each adapter is tried
/// at most once; the first success wins.
pub struct MediaDownloader {
    ytdlp: Arc<YtDlp>,
    chain: Vec<Arc<dyn Downloader>>,
    output_dir: PathBuf,
}

impl MediaDownloader {
    pub fn new(config: &Config) -> Result<Self> {
        std::fs::create_dir_all(&config.downloads_dir)?;

        let client = reqwest::Client::new();
        let ytdlp = Arc::new(YtDlp::new(
            config.ytdlp_path.clone(),
            Duration::from_secs(config.metadata_timeout_secs),
            Duration::from_secs(config.download_timeout_secs),
        ));

        let chain: Vec<Arc<dyn Downloader>> = vec![
            ytdlp.clone(),
            Arc::new(CobaltProvider::new(client.clone())),
            Arc::new(PipedProvider::new(client)),
        ];

        info!(
            "Media downloader initialized with {} adapters, output dir {}",
            chain.len(),
            config.downloads_dir.display()
        );

        Ok(Self {
            ytdlp,
            chain,
            output_dir: config.downloads_dir.clone(),
        })
    }

    /// Logs which adapters are usable. The fallback providers need nothing
    /// locally installed, so a missing tool is not fatal.
    pub async fn probe_setup(&self) {
        if !self.ytdlp.is_available().await {
            warn!("yt-dlp unavailable, relying on hosted fallback providers only");
        }
    }

    /// Best-effort metadata for a supported URL. Tool invocation failures
    /// degrade to a placeholder built from the URL alone; a tool response
    /// that cannot be parsed is surfaced distinctly instead.
    pub async fn video_info(&self, url: &str) -> Result<VideoInfo, DownloadError> {
        let classified =
            classifier::classify(url).ok_or_else(|| DownloadError::InvalidUrl(url.to_string()))?;

        match self
            .ytdlp
            .fetch_video_info(url, classified.platform, &classified.content_id)
            .await
        {
            Ok(info) => Ok(info),
            Err(err @ DownloadError::ParseFailed(_)) => Err(err),
            Err(err) => {
                warn!("Metadata extraction failed ({}), using URL-derived info", err);
                Ok(VideoInfo::placeholder(
                    classified.platform,
                    &classified.content_id,
                ))
            }
        }
    }

    pub async fn download(
        &self,
        request: &DownloadRequest,
    ) -> Result<CompletedDownload, DownloadError> {
        let classified = classifier::classify(&request.url)
            .ok_or_else(|| DownloadError::InvalidUrl(request.url.to_string()))?;

        let job = DownloadJob {
            url: request.url.clone(),
            platform: classified.platform,
            content_id: classified.content_id.clone(),
            kind: request.format,
            quality: request.quality.clone(),
            output_dir: self.output_dir.clone(),
            stem: format!("{}_{}", classified.content_id, filename_timestamp()),
        };

        run_chain(&self.chain, &job).await
    }
}

async fn run_chain(
    chain: &[Arc<dyn Downloader>],
    job: &DownloadJob,
) -> Result<CompletedDownload, DownloadError> {
    info!("Starting download for URL: {}", job.url);

    let mut errors = Vec::new();

    for adapter in chain {
        match adapter.download(job).await {
            Ok(path) => {
                info!("Successfully downloaded with {}", adapter.name());
                let filename = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| job.stem.clone());
                return Ok(CompletedDownload { filename, path });
            }
            Err(e) => {
                warn!("{} failed: {}", adapter.name(), e);
                errors.push(format!("{}: {e}", adapter.name()));
            }
        }
    }

    Err(DownloadError::ProvidersExhausted(format!(
        "{}. Please check the URL or try again later.",
        errors.join(". ")
    )))
}

/// Filesystem-safe RFC 3339 timestamp: `:` and `.` are swapped for `-` so
/// the stem stays a single plain token on every platform.
fn filename_timestamp() -> String {
    let now = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "unknown-time".to_string());
    now.replace([':', '.'], "-")
}
