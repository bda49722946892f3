//! Periodic cleanup of the uploads directory.
//!
//! Runs independently of jobs. A file that is still waiting to be picked up
//! by a queued job can be reaped if it outlives the maximum age.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Delete regular files in `dir` last modified more than `max_age` ago.
///
/// Returns how many files were removed. A missing directory counts as empty.
pub async fn sweep_expired_files(dir: &Path, max_age: Duration) -> std::io::Result<usize> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let now = SystemTime::now();
    let mut removed = 0;

    while let Some(entry) = entries.next_entry().await? {
        let metadata = match entry.metadata().await {
            Ok(metadata) => metadata,
            Err(e) => {
                debug!("Skipping {}: {}", entry.path().display(), e);
                continue;
            }
        };
        if !metadata.is_file() {
            continue;
        }

        let age = metadata
            .modified()
            .ok()
            .and_then(|modified| now.duration_since(modified).ok());
        if !matches!(age, Some(age) if age > max_age) {
            continue;
        }

        match tokio::fs::remove_file(entry.path()).await {
            Ok(()) => {
                debug!("Reaped {}", entry.path().display());
                removed += 1;
            }
            Err(e) => warn!("Failed to reap {}: {}", entry.path().display(), e),
        }
    }

    Ok(removed)
}

/// Start the reaper loop. Returns `None` when `max_age` is zero.
pub fn spawn_reaper(dir: PathBuf, max_age: Duration, interval: Duration) -> Option<JoinHandle<()>> {
    if max_age.is_zero() {
        info!("Upload cleanup disabled");
        return None;
    }

    info!(
        dir = %dir.display(),
        max_age_secs = max_age.as_secs(),
        "Starting upload cleanup"
    );

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // First tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match sweep_expired_files(&dir, max_age).await {
                Ok(0) => {}
                Ok(n) => info!("Removed {} expired upload(s)", n),
                Err(e) => warn!("Upload cleanup failed: {}", e),
            }
        }
    }))
}
