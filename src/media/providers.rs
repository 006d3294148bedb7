use super::downloader::{DownloadJob, Downloader};
use super::error::DownloadError;
use super::types::{quality_height_ceiling, MediaKind};
use crate::classifier::Platform;
use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::{json, Value};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Streams the bytes behind a direct media URL into the job's output
/// directory, named `{stem}.{ext}` for the requested kind.
async fn save_direct_url(
    client: &reqwest::Client,
    direct_url: &str,
    job: &DownloadJob,
) -> Result<PathBuf, DownloadError> {
    let dest = job
        .output_dir
        .join(format!("{}.{}", job.stem, job.kind.extension()));

    // Providers are third parties; don't hand reqwest a URL we can't parse.
    let direct_url = url::Url::parse(direct_url)
        .map_err(|e| DownloadError::ToolFailed(format!("provider returned an invalid URL: {e}")))?;

    let response = client.get(direct_url).send().await?.error_for_status()?;

    let mut file = tokio::fs::File::create(&dest).await?;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        file.write_all(&chunk?).await?;
    }
    file.flush().await?;

    Ok(dest)
}

/// Hosted cobalt instance. One POST per attempt, no retry; a usable response
/// carries a direct or tunneled media URL.
pub struct CobaltProvider {
    client: reqwest::Client,
    endpoint: String,
}

impl CobaltProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            endpoint: "https://api.cobalt.tools/".to_string(),
        }
    }
}

/// Extracts the media URL from a cobalt response body.
fn cobalt_media_url(body: &Value) -> Result<String, DownloadError> {
    match body["status"].as_str() {
        Some("redirect") | Some("tunnel") | Some("stream") => body["url"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| DownloadError::ToolFailed("cobalt response missing url".to_string())),
        Some("error") => {
            let code = body["error"]["code"].as_str().unwrap_or("unknown");
            Err(DownloadError::ToolFailed(format!("cobalt error: {code}")))
        }
        other => Err(DownloadError::ToolFailed(format!(
            "unexpected cobalt status: {other:?}"
        ))),
    }
}

#[async_trait]
impl Downloader for CobaltProvider {
    fn name(&self) -> &'static str {
        "cobalt"
    }

    async fn download(&self, job: &DownloadJob) -> Result<PathBuf, DownloadError> {
        debug!("Trying cobalt for {}", job.url);

        let mode = match job.kind {
            MediaKind::Audio => "audio",
            MediaKind::Video => "auto",
        };
        let quality = quality_height_ceiling(&job.quality)
            .map(|h| h.to_string())
            .unwrap_or_else(|| "max".to_string());

        let body: Value = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&json!({
                "url": job.url,
                "downloadMode": mode,
                "videoQuality": quality,
            }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let direct_url = cobalt_media_url(&body)?;
        info!("cobalt resolved a direct URL for {}", job.content_id);
        save_direct_url(&self.client, &direct_url, job).await
    }
}

/// Piped API instance. YouTube only; other platforms fall through to the
/// next adapter in the chain.
pub struct PipedProvider {
    client: reqwest::Client,
    endpoint: String,
}

impl PipedProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            endpoint: "https://pipedapi.kavin.rocks".to_string(),
        }
    }
}

/// Picks the best matching stream URL from a piped `/streams/{id}` body.
fn piped_stream_url(body: &Value, kind: MediaKind, quality: &str) -> Result<String, DownloadError> {
    let missing = || DownloadError::ToolFailed("piped response has no usable stream".to_string());

    match kind {
        MediaKind::Audio => body["audioStreams"]
            .as_array()
            .and_then(|streams| {
                streams
                    .iter()
                    .max_by_key(|s| s["bitrate"].as_u64().unwrap_or(0))
            })
            .and_then(|s| s["url"].as_str())
            .map(|s| s.to_string())
            .ok_or_else(missing),
        MediaKind::Video => {
            let ceiling = quality_height_ceiling(quality).unwrap_or(u32::MAX);
            body["videoStreams"]
                .as_array()
                .and_then(|streams| {
                    streams
                        .iter()
                        .filter(|s| !s["videoOnly"].as_bool().unwrap_or(false))
                        .filter(|s| stream_height(s).is_some_and(|h| h <= ceiling))
                        .max_by_key(|s| stream_height(s).unwrap_or(0))
                })
                .and_then(|s| s["url"].as_str())
                .map(|s| s.to_string())
                .ok_or_else(missing)
        }
    }
}

fn stream_height(stream: &Value) -> Option<u32> {
    // quality labels look like "720p" or "1080p60"
    let quality = stream["quality"].as_str()?;
    let digits: String = quality.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

#[async_trait]
impl Downloader for PipedProvider {
    fn name(&self) -> &'static str {
        "piped"
    }

    async fn download(&self, job: &DownloadJob) -> Result<PathBuf, DownloadError> {
        if job.platform != Platform::Youtube {
            return Err(DownloadError::ToolFailed(
                "piped only handles YouTube URLs".to_string(),
            ));
        }

        debug!("Trying piped for {}", job.content_id);

        let body: Value = self
            .client
            .get(format!("{}/streams/{}", self.endpoint, job.content_id))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let direct_url = piped_stream_url(&body, job.kind, &job.quality)?;
        info!("piped resolved a direct URL for {}", job.content_id);
        save_direct_url(&self.client, &direct_url, job).await
    }
}
