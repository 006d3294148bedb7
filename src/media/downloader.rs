use super::error::DownloadError;
use super::types::MediaKind;
use crate::classifier::Platform;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// A single classified download, resolved up front by the orchestrator so
/// every adapter in the chain works from the same inputs.
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub url: String,
    pub platform: Platform,
    pub content_id: String,
    pub kind: MediaKind,
    pub quality: String,
    /// Flat directory all artifacts land in.
    pub output_dir: PathBuf,
    /// Filename stem `{content_id}_{timestamp}`; the adapter appends the
    /// extension it actually produced.
    pub stem: String,
}

impl DownloadJob {
    /// Scans the output directory for a file whose name starts with this
    /// job's stem. The extraction tool may pick its own final extension, so
    /// the stem prefix is the only reliable handle on the artifact.
    pub fn find_output(&self) -> Option<PathBuf> {
        find_by_stem(&self.output_dir, &self.stem)
    }
}

pub fn find_by_stem(dir: &Path, stem: &str) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    for entry in entries.flatten() {
        let name = entry.file_name();
        if name.to_string_lossy().starts_with(stem) && entry.path().is_file() {
            return Some(entry.path());
        }
    }
    None
}

#[async_trait]
pub trait Downloader: Send + Sync {
    /// Human-readable name of the downloader
    fn name(&self) -> &'static str;

    /// Produce the requested media file in the job's output directory and
    /// return its path.
    async fn download(&self, job: &DownloadJob) -> Result<PathBuf, DownloadError>;
}
