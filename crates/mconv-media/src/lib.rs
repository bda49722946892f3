//! External tool supervision for media conversion.
//!
//! This crate provides:
//! - A process invoker that streams child stdout as lines
//! - Progress decoders for `ffmpeg -progress` and `yt-dlp --newline` output
//! - FFprobe duration / video property probing with fallbacks
//! - yt-dlp filename resolution, download and metadata lookup
//! - Argument builders for each conversion operation

pub mod command;
pub mod download;
pub mod error;
pub mod fs_utils;
pub mod probe;
pub mod progress;
pub mod transform;

pub use command::{check_tool, RunningTool, ToolCommand, ToolRunner};
pub use download::{Downloader, MediaInfo};
pub use error::{MediaError, MediaResult};
pub use fs_utils::move_file;
pub use probe::{Prober, VideoProperties};
pub use progress::{fetch_percent, transcode_percent, ProgressDecoder};
pub use transform::{EffectiveParams, TransformSpec};
