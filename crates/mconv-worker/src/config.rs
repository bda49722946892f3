//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use mconv_media::probe::DEFAULT_PROBE_TIMEOUT;
use mconv_store::DEFAULT_TASK_TTL;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Parent of the per-task scratch directories
    pub work_root: PathBuf,
    /// Where uploads land and finished outputs are published
    pub uploads_dir: PathBuf,
    /// TTL applied to every status write
    pub task_ttl: Duration,
    /// Maximum concurrent jobs; further submissions wait as `pending`
    pub max_concurrent_jobs: usize,
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
    pub ytdlp_bin: String,
    /// Proxy handed to every yt-dlp call
    pub proxy: Option<String>,
    /// Deadline for ffprobe and yt-dlp metadata calls
    pub probe_timeout: Duration,
    /// Log tool stderr at debug level
    pub diagnostics: bool,
    /// How often the uploads reaper wakes up
    pub cleanup_interval: Duration,
    /// Age after which uploads are reaped; zero disables the reaper
    pub cleanup_max_age: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            work_root: std::env::temp_dir().join("mconv"),
            uploads_dir: PathBuf::from("uploads"),
            task_ttl: DEFAULT_TASK_TTL,
            max_concurrent_jobs: 4,
            ffmpeg_bin: "ffmpeg".to_string(),
            ffprobe_bin: "ffprobe".to_string(),
            ytdlp_bin: "yt-dlp".to_string(),
            proxy: None,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            diagnostics: false,
            cleanup_interval: Duration::from_secs(60),
            cleanup_max_age: Duration::from_secs(5 * 60),
        }
    }
}

impl WorkerConfig {
    /// Scratch directory owned by one task.
    pub fn job_dir(&self, task_id: &str) -> PathBuf {
        self.work_root.join(task_id)
    }
}
