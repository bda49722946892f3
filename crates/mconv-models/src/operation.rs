//! Conversion operations and output naming.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::ModelError;

/// Transform applied to the source media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    VideoCompress,
    VideoToGif,
    VideoToAudio,
    ImageCompress,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::VideoCompress => "video_compress",
            Operation::VideoToGif => "video_to_gif",
            Operation::VideoToAudio => "video_to_audio",
            Operation::ImageCompress => "image_compress",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Operation {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "video_compress" => Ok(Operation::VideoCompress),
            "video_to_gif" => Ok(Operation::VideoToGif),
            "video_to_audio" => Ok(Operation::VideoToAudio),
            "image_compress" => Ok(Operation::ImageCompress),
            other => Err(ModelError::UnknownOperation(other.to_string())),
        }
    }
}

/// Requested target format for image compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ImageFormat {
    Jpg,
    Png,
}

impl ImageFormat {
    /// Parse a client hint. Unrecognized hints mean "keep the original
    /// extension" and yield `None`.
    pub fn from_hint(hint: &str) -> Option<Self> {
        match hint.trim().to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(ImageFormat::Jpg),
            "png" => Some(ImageFormat::Png),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpg => ".jpg",
            ImageFormat::Png => ".png",
        }
    }
}

/// Deterministic name of the promoted output file.
///
/// `input_name` is the base name of the acquired source file.
pub fn output_name(operation: Operation, input_name: &str, image_format: Option<ImageFormat>) -> String {
    let stem = file_stem(input_name);
    match operation {
        Operation::VideoCompress => format!("compressed_{input_name}"),
        Operation::VideoToGif => format!("{stem}.gif"),
        Operation::VideoToAudio => format!("{stem}.mp3"),
        Operation::ImageCompress => match image_format {
            Some(format) => format!("compressed_{stem}{}", format.extension()),
            None => format!("compressed_{input_name}"),
        },
    }
}

/// Name without its last extension (`clip.tar.gz` -> `clip.tar`).
fn file_stem(name: &str) -> &str {
    match Path::new(name).extension() {
        Some(ext) => &name[..name.len() - ext.len() - 1],
        None => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_parse() {
        assert_eq!("video_to_gif".parse::<Operation>().unwrap(), Operation::VideoToGif);
        assert_eq!("image_compress".parse::<Operation>().unwrap(), Operation::ImageCompress);
        assert!("video_to_webp".parse::<Operation>().is_err());
    }

    #[test]
    fn test_output_names() {
        assert_eq!(output_name(Operation::VideoToGif, "clip.mp4", None), "clip.gif");
        assert_eq!(output_name(Operation::VideoCompress, "clip.mp4", None), "compressed_clip.mp4");
        assert_eq!(output_name(Operation::VideoToAudio, "talk.final.mkv", None), "talk.final.mp3");
    }

    #[test]
    fn test_image_output_names() {
        assert_eq!(output_name(Operation::ImageCompress, "photo.jpeg", None), "compressed_photo.jpeg");
        assert_eq!(
            output_name(Operation::ImageCompress, "photo.jpeg", Some(ImageFormat::Png)),
            "compressed_photo.png"
        );
        assert_eq!(
            output_name(Operation::ImageCompress, "shot.png", ImageFormat::from_hint("JPEG")),
            "compressed_shot.jpg"
        );
        assert_eq!(
            output_name(Operation::ImageCompress, "shot.png", ImageFormat::from_hint("webp")),
            "compressed_shot.png"
        );
    }

    #[test]
    fn test_name_without_extension() {
        assert_eq!(output_name(Operation::VideoToGif, "README", None), "README.gif");
    }
}
