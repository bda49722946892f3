//! Conversion submission requests.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ModelError, ModelResult};
use crate::operation::{ImageFormat, Operation};

/// Bitrate used for audio extraction when the client does not ask for one.
pub const DEFAULT_AUDIO_BITRATE: &str = "128k";

/// Where the source media comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskSource {
    /// File already saved on local disk (uploaded by the client)
    Local(PathBuf),
    /// Remote page/media URL acquired with the fetch tool
    Remote(String),
}

impl TaskSource {
    /// Validate and wrap a remote URL. Only absolute http(s) URLs are accepted.
    pub fn remote(url: &str) -> ModelResult<Self> {
        let parsed = Url::parse(url.trim()).map_err(|e| ModelError::InvalidUrl(e.to_string()))?;
        match parsed.scheme() {
            "http" | "https" => Ok(TaskSource::Remote(parsed.to_string())),
            other => Err(ModelError::UnsupportedScheme(other.to_string())),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, TaskSource::Remote(_))
    }
}

/// Parameters for one conversion, validated upstream.
///
/// Zero values for `width`, `fps` mean "keep the source value".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionRequest {
    pub operation: Operation,
    pub source: TaskSource,
    /// Constant rate factor for video compression
    #[serde(default)]
    pub crf: u32,
    /// Maximum output width in pixels
    #[serde(default)]
    pub width: u32,
    /// Maximum output frame rate
    #[serde(default)]
    pub fps: u32,
    /// Image quality (1-100)
    #[serde(default)]
    pub quality: u32,
    #[serde(default)]
    pub image_format: Option<ImageFormat>,
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,
}

fn default_audio_bitrate() -> String {
    DEFAULT_AUDIO_BITRATE.to_string()
}

impl ConversionRequest {
    pub fn new(operation: Operation, source: TaskSource) -> Self {
        Self {
            operation,
            source,
            crf: 0,
            width: 0,
            fps: 0,
            quality: 0,
            image_format: None,
            audio_bitrate: default_audio_bitrate(),
        }
    }

    pub fn with_crf(mut self, crf: u32) -> Self {
        self.crf = crf;
        self
    }

    pub fn with_width(mut self, width: u32) -> Self {
        self.width = width;
        self
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    pub fn with_quality(mut self, quality: u32) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_image_format(mut self, format: Option<ImageFormat>) -> Self {
        self.image_format = format;
        self
    }
}
