//! Structured task logging.
//!
//! Every lifecycle message for a task carries the same `task_id` and
//! `operation` fields so a single conversion can be followed through the
//! logs regardless of which module emitted them.

use tracing::{error, info, warn, Span};

use mconv_models::TaskId;

/// Lifecycle logger bound to one task.
#[derive(Debug, Clone)]
pub struct TaskLogger {
    task_id: String,
    operation: String,
}

impl TaskLogger {
    pub fn new(task_id: &TaskId, operation: &str) -> Self {
        Self {
            task_id: task_id.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            task_id = %self.task_id,
            operation = %self.operation,
            "Task started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            task_id = %self.task_id,
            operation = %self.operation,
            "Task progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            task_id = %self.task_id,
            operation = %self.operation,
            "Task warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            task_id = %self.task_id,
            operation = %self.operation,
            "Task failed: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            task_id = %self.task_id,
            operation = %self.operation,
            "Task completed: {}", message
        );
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Span the whole job future is instrumented with, so tool and store
    /// logs emitted deeper down inherit the task fields.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "task",
            task_id = %self.task_id,
            operation = %self.operation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_logger_creation() {
        let task_id = TaskId::new();
        let logger = TaskLogger::new(&task_id, "video_to_gif");

        assert_eq!(logger.task_id(), task_id.to_string());
        assert_eq!(logger.operation(), "video_to_gif");
    }

    #[test]
    fn test_logging_without_subscriber() {
        let logger = TaskLogger::new(&TaskId::from_string("t-1"), "image_compress");
        logger.log_start("begin");
        logger.log_progress("halfway");
        logger.log_warning("probe unavailable");
        logger.log_error("boom");
        logger.log_completion("done");
        let _span = logger.create_span();
    }
}
