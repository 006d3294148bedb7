use thiserror::Error;

/// Failure categories a caller must be able to tell apart: rejecting bad
/// input, the tool failing to run, the tool running but emitting garbage,
/// and the tool claiming success without producing a file are all reported
/// distinctly.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("invalid or unsupported URL: {0}")]
    InvalidUrl(String),

    #[error("extraction tool failed: {0}")]
    ToolFailed(String),

    #[error("operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("failed to parse video information")]
    ParseFailed(#[source] serde_json::Error),

    #[error("download reported success but no output file was found for {0}")]
    OutputMissing(String),

    #[error("all download providers failed: {0}")]
    ProvidersExhausted(String),

    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DownloadError {
    /// True for errors caused by the caller's input rather than by the
    /// system or its collaborators.
    pub fn is_client_error(&self) -> bool {
        matches!(self, DownloadError::InvalidUrl(_))
    }
}
