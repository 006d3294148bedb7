use crate::config::Config;
use crate::media::{self, DownloadError, DownloadRequest, MediaDownloader, VideoInfo};
use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::{Path as AxumPath, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::signal;
use tokio_util::io::ReaderStream;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    downloader: Arc<MediaDownloader>,
    config: Arc<Config>,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
    detail: Option<String>,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            detail: None,
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
            detail: None,
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
            detail: None,
        }
    }
}

impl From<DownloadError> for ApiError {
    fn from(err: DownloadError) -> Self {
        let status = match &err {
            e if e.is_client_error() => StatusCode::BAD_REQUEST,
            DownloadError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = match &err {
            DownloadError::InvalidUrl(_) => {
                "Please provide a valid YouTube or Instagram URL".to_string()
            }
            DownloadError::ParseFailed(_) => "Failed to parse video information".to_string(),
            _ => "Download failed".to_string(),
        };
        Self {
            status,
            message,
            detail: Some(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "success": false,
            "message": self.message,
            "error": self.detail,
        });
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    message: &'static str,
    timestamp: String,
}

#[derive(Deserialize)]
struct VideoInfoRequest {
    #[serde(default)]
    url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VideoInfoResponse {
    success: bool,
    video_info: VideoInfo,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DownloadResponse {
    success: bool,
    message: String,
    download_url: String,
    filename: String,
}

#[derive(Serialize)]
struct CleanupResponse {
    success: bool,
    message: String,
}

fn rfc3339_now() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        message: "Server is running",
        timestamp: rfc3339_now(),
    })
}

async fn video_info(
    State(state): State<AppState>,
    Json(payload): Json<VideoInfoRequest>,
) -> ApiResult<Json<VideoInfoResponse>> {
    if payload.url.trim().is_empty() {
        return Err(ApiError::bad_request("URL is required"));
    }

    let info = state.downloader.video_info(payload.url.trim()).await?;
    Ok(Json(VideoInfoResponse {
        success: true,
        video_info: info,
    }))
}

async fn download(
    State(state): State<AppState>,
    Json(payload): Json<DownloadRequest>,
) -> ApiResult<Json<DownloadResponse>> {
    if payload.url.trim().is_empty() {
        return Err(ApiError::bad_request("URL is required"));
    }

    let done = state.downloader.download(&payload).await?;
    info!("Saved {}", done.path.display());
    Ok(Json(DownloadResponse {
        success: true,
        message: "Download completed".to_string(),
        download_url: format!("/downloads/{}", done.filename),
        filename: done.filename,
    }))
}

async fn cleanup(State(state): State<AppState>) -> ApiResult<Json<CleanupResponse>> {
    let deleted = media::sweep(&state.config.downloads_dir, state.config.cleanup_max_age())
        .map_err(|e| ApiError::internal(e.to_string()))?;

    Ok(Json(CleanupResponse {
        success: true,
        message: format!("Cleaned up {deleted} old file(s)"),
    }))
}

/// A served filename must be a single plain path segment; anything that
/// could climb out of the downloads directory is rejected outright.
fn is_safe_filename(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains('\0')
}

async fn serve_download(
    State(state): State<AppState>,
    AxumPath(filename): AxumPath<String>,
) -> ApiResult<Response> {
    if !is_safe_filename(&filename) {
        return Err(ApiError::not_found("file not found"));
    }

    let path = state.config.downloads_dir.join(&filename);
    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|_| ApiError::not_found("file not found"))?;

    let mime = mime_guess::from_path(&path).first_or_octet_stream();

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        mime.as_ref()
            .parse()
            .unwrap_or(header::HeaderValue::from_static(
                "application/octet-stream",
            )),
    );
    if let Ok(value) = format!("attachment; filename=\"{filename}\"").parse() {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    let body = Body::from_stream(ReaderStream::new(file));
    Ok((headers, body).into_response())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/video-info", post(video_info))
        .route("/api/download", post(download))
        .route("/api/cleanup", post(cleanup))
        .route("/downloads/{filename}", get(serve_download))
        .with_state(state)
}

pub async fn run(config: Config) -> Result<()> {
    let downloader = Arc::new(MediaDownloader::new(&config)?);
    downloader.probe_setup().await;

    let port = config.port;
    let environment = config.environment.clone();
    let state = AppState {
        downloader,
        config: Arc::new(config),
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("Listening on http://{} ({})", addr, environment);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl+C handler: {}", err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaKind;
    use std::fs::{File, FileTimes};
    use std::time::{Duration, SystemTime};

    fn test_state(dir: &std::path::Path) -> AppState {
        let config = Config {
            downloads_dir: dir.to_path_buf(),
            // nonexistent program, so nothing external ever runs in tests
            ytdlp_path: Some("/nonexistent/yt-dlp".into()),
            ..Config::default()
        };
        AppState {
            downloader: Arc::new(MediaDownloader::new(&config).unwrap()),
            config: Arc::new(config),
        }
    }

    #[tokio::test]
    async fn test_health_reports_ok() {
        let res = health().await.0;
        assert_eq!(res.status, "ok");
        assert!(OffsetDateTime::parse(&res.timestamp, &Rfc3339).is_ok());
    }

    #[tokio::test]
    async fn test_video_info_rejects_empty_url() {
        let dir = tempfile::tempdir().unwrap();
        let err = video_info(
            State(test_state(dir.path())),
            Json(VideoInfoRequest { url: "  ".into() }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_video_info_rejects_unsupported_url_before_tool_runs() {
        let dir = tempfile::tempdir().unwrap();
        let err = video_info(
            State(test_state(dir.path())),
            Json(VideoInfoRequest {
                url: "https://vimeo.com/12345678".into(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_download_rejects_invalid_url() {
        let dir = tempfile::tempdir().unwrap();
        let err = download(
            State(test_state(dir.path())),
            Json(DownloadRequest {
                url: "https://example.com/nope".into(),
                format: MediaKind::Video,
                quality: "720p".into(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_cleanup_counts_deletions() {
        let dir = tempfile::tempdir().unwrap();
        let stale = dir.path().join("abc_old.mp4");
        let fresh = dir.path().join("def_new.mp4");
        std::fs::write(&stale, b"x").unwrap();
        std::fs::write(&fresh, b"y").unwrap();

        let file = File::options().write(true).open(&stale).unwrap();
        let past = SystemTime::now() - Duration::from_secs(7200);
        file.set_times(FileTimes::new().set_modified(past)).unwrap();

        let res = cleanup(State(test_state(dir.path()))).await.unwrap().0;
        assert!(res.success);
        assert!(res.message.contains('1'));
        assert!(!stale.exists());
        assert!(fresh.exists());
    }

    #[tokio::test]
    async fn test_serve_download_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let err = serve_download(
            State(test_state(dir.path())),
            AxumPath("../secret.txt".to_string()),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_serve_download_streams_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("clip_123.mp4"), b"bytes").unwrap();

        let res = serve_download(
            State(test_state(dir.path())),
            AxumPath("clip_123.mp4".to_string()),
        )
        .await
        .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers().get(header::CONTENT_TYPE).unwrap(),
            "video/mp4"
        );
    }

    #[test]
    fn test_is_safe_filename() {
        assert!(is_safe_filename("abc_2024.mp4"));
        assert!(!is_safe_filename(""));
        assert!(!is_safe_filename(".."));
        assert!(!is_safe_filename("a/b.mp4"));
        assert!(!is_safe_filename("a\\b.mp4"));
    }
}
