use anyhow::{Context, Result};
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::{debug, info};

/// Deletes every regular file in `dir` whose last-modified age exceeds
/// `max_age` and returns the deletion count. Idempotent; a missing directory
/// is treated as already clean.
pub fn sweep(dir: &Path, max_age: Duration) -> Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let now = SystemTime::now();
    let mut deleted = 0;

    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read downloads directory {}", dir.display()))?;

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let modified = match entry.metadata().and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) => {
                debug!("Skipping {}: {}", path.display(), e);
                continue;
            }
        };

        let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
        if age > max_age {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to delete {}", path.display()))?;
            debug!("Deleted stale file {}", path.display());
            deleted += 1;
        }
    }

    if deleted > 0 {
        info!("Cleanup removed {} stale file(s)", deleted);
    }

    Ok(deleted)
}
