//! Worker error types.
//!
//! Only two failures end a task. Their `Display` output is what a polling
//! client sees in the `error` field, prefixed with the failing phase.

use std::fmt::Display;

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("download failed: {0}")]
    DownloadFailed(String),

    #[error("processing failed: {0}")]
    ProcessingFailed(String),
}

impl WorkerError {
    pub fn download_failed(cause: impl Display) -> Self {
        Self::DownloadFailed(cause.to_string())
    }

    pub fn processing_failed(cause: impl Display) -> Self {
        Self::ProcessingFailed(cause.to_string())
    }

    /// Phase label used in logs and metrics.
    pub fn phase(&self) -> &'static str {
        match self {
            WorkerError::DownloadFailed(_) => "download",
            WorkerError::ProcessingFailed(_) => "processing",
        }
    }
}

impl From<std::io::Error> for WorkerError {
    fn from(e: std::io::Error) -> Self {
        Self::processing_failed(e)
    }
}

impl From<mconv_media::MediaError> for WorkerError {
    fn from(e: mconv_media::MediaError) -> Self {
        Self::processing_failed(e)
    }
}
