//! Conversion job orchestration.
//!
//! This crate provides:
//! - The per-task state machine (fetch, acquire, transform, finalize)
//! - Best-effort progress reporting into the status store
//! - A bounded pool of fire-and-forget background jobs
//! - The uploads directory reaper

pub mod config;
pub mod error;
pub mod logging;
pub mod processor;
pub mod reaper;
pub mod reporter;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use logging::TaskLogger;
pub use processor::TaskProcessor;
pub use reaper::{spawn_reaper, sweep_expired_files};
pub use reporter::ProgressReporter;
