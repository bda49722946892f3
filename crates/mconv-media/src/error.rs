//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while supervising external tools.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("{0} not found in PATH")]
    ToolNotFound(String),

    #[error("{tool} exited with {}", describe_exit(.exit_code))]
    ExternalTool {
        tool: String,
        args: Vec<String>,
        exit_code: Option<i32>,
    },

    #[error("Probe unavailable: {0}")]
    ProbeUnavailable(String),

    #[error("Download failed: {message}")]
    DownloadFailed { message: String },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit status {code}"),
        None => "no exit status (killed by signal)".to_string(),
    }
}

impl MediaError {
    /// Create an external tool failure error.
    pub fn external_tool(tool: impl Into<String>, args: Vec<String>, exit_code: Option<i32>) -> Self {
        Self::ExternalTool {
            tool: tool.into(),
            args,
            exit_code,
        }
    }

    /// Create a probe failure error.
    pub fn probe_unavailable(message: impl Into<String>) -> Self {
        Self::ProbeUnavailable(message.into())
    }

    /// Create a download failure error.
    pub fn download_failed(message: impl Into<String>) -> Self {
        Self::DownloadFailed {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}
