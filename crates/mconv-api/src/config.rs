//! Service configuration.
//!
//! Values are layered, later sources winning:
//! 1. built-in defaults
//! 2. an optional `config.{json,toml,yaml}` file (or the file named by
//!    `MCONV_CONFIG`)
//! 3. `MCONV_*` environment variables, e.g. `MCONV_PORT=8080`

use std::path::PathBuf;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use mconv_worker::WorkerConfig;

/// Complete service configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    /// Upload landing area and published outputs
    pub uploads_dir: PathBuf,
    /// Parent of per-task scratch directories; system temp dir when unset
    pub work_root: Option<PathBuf>,
    /// Full Redis URL; takes precedence over the address fields
    pub redis_url: Option<String>,
    /// `host:port`; empty disables Redis
    pub redis_addr: String,
    pub redis_db: i64,
    pub redis_password: String,
    /// Proxy for every yt-dlp call; blank disables it
    pub proxy: String,
    /// Minutes after which uploads are reaped; 0 disables the reaper
    pub cleanup_minutes: u64,
    pub log_level: String,
    pub max_concurrent_jobs: usize,
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
    pub ytdlp_bin: String,
    pub probe_timeout_secs: u64,
    /// Log external tool stderr at debug level
    pub diagnostics: bool,
    /// Largest accepted upload request body
    pub max_upload_bytes: usize,
    pub cors_origins: Vec<String>,
    pub metrics_enabled: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            uploads_dir: PathBuf::from("uploads"),
            work_root: None,
            redis_url: None,
            redis_addr: "localhost:6379".to_string(),
            redis_db: 0,
            redis_password: String::new(),
            proxy: String::new(),
            cleanup_minutes: 5,
            log_level: "info".to_string(),
            max_concurrent_jobs: 4,
            ffmpeg_bin: "ffmpeg".to_string(),
            ffprobe_bin: "ffprobe".to_string(),
            ytdlp_bin: "yt-dlp".to_string(),
            probe_timeout_secs: 15,
            diagnostics: false,
            max_upload_bytes: 1024 * 1024 * 1024, // 1GB
            cors_origins: vec!["*".to_string()],
            metrics_enabled: true,
        }
    }
}

impl ServiceConfig {
    /// Load from defaults, the optional config file and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let file = std::env::var("MCONV_CONFIG").unwrap_or_else(|_| "config".to_string());

        Config::builder()
            .add_source(File::with_name(&file).required(false))
            .add_source(
                Environment::with_prefix("MCONV")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("cors_origins"),
            )
            .build()?
            .try_deserialize()
    }

    /// Redis connection URL, or `None` when Redis is not configured.
    pub fn redis_url(&self) -> Option<String> {
        if let Some(url) = self.redis_url.as_deref().map(str::trim) {
            if !url.is_empty() {
                return Some(url.to_string());
            }
        }

        let addr = self.redis_addr.trim();
        if addr.is_empty() {
            return None;
        }
        let auth = if self.redis_password.is_empty() {
            String::new()
        } else {
            format!(":{}@", self.redis_password)
        };
        Some(format!("redis://{}{}/{}", auth, addr, self.redis_db))
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Worker settings derived from this configuration.
    pub fn worker_config(&self) -> WorkerConfig {
        let defaults = WorkerConfig::default();
        WorkerConfig {
            work_root: self.work_root.clone().unwrap_or(defaults.work_root),
            uploads_dir: self.uploads_dir.clone(),
            max_concurrent_jobs: self.max_concurrent_jobs.max(1),
            ffmpeg_bin: self.ffmpeg_bin.clone(),
            ffprobe_bin: self.ffprobe_bin.clone(),
            ytdlp_bin: self.ytdlp_bin.clone(),
            proxy: Some(self.proxy.trim().to_string()).filter(|p| !p.is_empty()),
            probe_timeout: Duration::from_secs(self.probe_timeout_secs),
            diagnostics: self.diagnostics,
            cleanup_max_age: Duration::from_secs(self.cleanup_minutes * 60),
            ..defaults
        }
    }
}
