//! Remote media acquisition using yt-dlp.
//!
//! Downloads run in two calls: a deadline-bounded `--get-filename` to learn
//! where the file will land, then the download itself with `--newline` so
//! progress arrives one line at a time.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::command::{RunningTool, ToolCommand, ToolRunner};
use crate::error::{MediaError, MediaResult};

/// Deadline for metadata-only yt-dlp calls.
pub const DEFAULT_INFO_TIMEOUT: Duration = Duration::from_secs(15);

/// Output template relative to the job directory.
const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

/// Basic metadata for a remote URL, read without downloading.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub title: String,
    pub ext: String,
    pub format: String,
    pub filesize: f64,
    pub duration: f64,
    pub width: f64,
    pub height: f64,
    pub fps: f64,
    /// Total bitrate (yt-dlp `tbr`)
    pub bitrate: f64,
}

impl MediaInfo {
    /// Build from `--dump-single-json` output. Playlist wrappers are reduced
    /// to their first entry.
    pub fn from_json(raw: &Value) -> Self {
        let entry = raw
            .get("entries")
            .and_then(Value::as_array)
            .and_then(|entries| entries.first())
            .filter(|first| first.is_object())
            .unwrap_or(raw);

        let text = |key: &str| entry.get(key).and_then(Value::as_str).unwrap_or_default().to_string();
        let number = |keys: &[&str]| {
            keys.iter()
                .find_map(|key| entry.get(*key).and_then(Value::as_f64))
                .unwrap_or(0.0)
        };

        let mut format = text("format");
        if format.is_empty() {
            format = text("format_id");
        }

        Self {
            title: text("title"),
            ext: text("ext"),
            format,
            filesize: number(&["filesize", "filesize_approx"]),
            duration: number(&["duration"]),
            width: number(&["width"]),
            height: number(&["height"]),
            fps: number(&["fps"]),
            bitrate: number(&["tbr"]),
        }
    }
}

/// yt-dlp wrapper.
#[derive(Debug, Clone)]
pub struct Downloader {
    binary: String,
    proxy: Option<String>,
    metadata_runner: ToolRunner,
    runner: ToolRunner,
}

impl Default for Downloader {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

impl Downloader {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            proxy: None,
            metadata_runner: ToolRunner::new().with_timeout(DEFAULT_INFO_TIMEOUT),
            runner: ToolRunner::new(),
        }
    }

    /// Route every call through a proxy. Blank values disable it.
    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy.map(|p| p.trim().to_string()).filter(|p| !p.is_empty());
        self
    }

    pub fn with_metadata_timeout(mut self, timeout: Duration) -> Self {
        self.metadata_runner = self.metadata_runner.with_timeout(timeout);
        self
    }

    pub fn with_diagnostics(mut self, enabled: bool) -> Self {
        self.metadata_runner = self.metadata_runner.with_diagnostics(enabled);
        self.runner = self.runner.with_diagnostics(enabled);
        self
    }

    fn command(&self, url: &str) -> ToolCommand {
        let mut cmd = ToolCommand::new(&self.binary).input(url);
        if let Some(proxy) = &self.proxy {
            cmd = cmd.arg("--proxy").arg(proxy);
        }
        cmd
    }

    fn output_pattern(job_dir: &Path) -> String {
        job_dir.join(OUTPUT_TEMPLATE).to_string_lossy().to_string()
    }

    /// Resolve the local path the download will be written to.
    pub async fn resolve_filename(&self, url: &str, job_dir: &Path) -> MediaResult<PathBuf> {
        let cmd = self
            .command(url)
            .args(["--get-filename", "-o"])
            .arg(Self::output_pattern(job_dir))
            .args(["--restrict-filenames", url]);

        info!("yt-dlp get-filename: {} {}", self.binary, cmd.get_args().join(" "));
        let out = self.metadata_runner.output(&cmd).await?;

        let filename = out.lines().map(str::trim).find(|line| !line.is_empty());
        match filename {
            Some(name) => Ok(PathBuf::from(name)),
            None => Err(MediaError::download_failed("yt-dlp did not report a filename")),
        }
    }

    /// Start the download. Progress lines are read from the returned handle.
    pub fn spawn_download(&self, url: &str, job_dir: &Path) -> MediaResult<RunningTool> {
        let cmd = self
            .command(url)
            .arg("-o")
            .arg(Self::output_pattern(job_dir))
            .args(["--restrict-filenames", "--newline", url]);

        info!("yt-dlp download: {} {}", self.binary, cmd.get_args().join(" "));
        self.runner.spawn(&cmd)
    }

    /// Fetch metadata for a URL without downloading it.
    pub async fn info(&self, url: &str) -> MediaResult<MediaInfo> {
        let cmd = self
            .command(url)
            .args(["--dump-single-json", "--no-playlist", "--skip-download", url]);

        let out = self.metadata_runner.output(&cmd).await?;
        let raw: Value = serde_json::from_str(&out)?;
        Ok(MediaInfo::from_json(&raw))
    }
}
