//! Shared data models for the mconv conversion service.
//!
//! This crate provides Serde-serializable types for:
//! - Task records, statuses and stages as seen by polling clients
//! - Conversion operations and their output naming rules
//! - Submission requests handed to the worker

pub mod error;
pub mod operation;
pub mod request;
pub mod task;

pub use error::{ModelError, ModelResult};
pub use operation::{output_name, ImageFormat, Operation};
pub use request::{ConversionRequest, TaskSource, DEFAULT_AUDIO_BITRATE};
pub use task::{Stage, TaskId, TaskRecord, TaskStatus};
