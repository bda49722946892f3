//! Task records for status polling.
//!
//! A [`TaskRecord`] is the only state a client ever sees for a submitted
//! conversion. It is written by exactly one background job and read by any
//! number of pollers.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    /// Generate a new random task ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Task processing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Accepted, background job not started yet
    #[default]
    Pending,
    /// Background job is running
    Processing,
    /// Output file is available
    Completed,
    /// Job ended with an error
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Coarse phase of a processing task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Init,
    Download,
    Transcode,
    Finalize,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Init => "init",
            Stage::Download => "download",
            Stage::Transcode => "transcode",
            Stage::Finalize => "finalize",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status record stored per task and returned to polling clients.
///
/// Optional fields are omitted from the JSON form rather than serialized
/// as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TaskRecord {
    pub id: TaskId,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent: Option<u8>,
}

impl TaskRecord {
    /// Record written at submission, before the job starts.
    pub fn pending(id: TaskId) -> Self {
        Self {
            id,
            status: TaskStatus::Pending,
            error: None,
            output_file: None,
            stage: None,
            percent: None,
        }
    }

    /// In-flight record for the given stage.
    pub fn processing(id: TaskId, stage: Stage, percent: u8) -> Self {
        Self {
            id,
            status: TaskStatus::Processing,
            error: None,
            output_file: None,
            stage: Some(stage),
            percent: Some(percent.min(100)),
        }
    }

    /// Terminal success record. Always carries percent 100.
    pub fn completed(id: TaskId, output_file: impl Into<String>) -> Self {
        Self {
            id,
            status: TaskStatus::Completed,
            error: None,
            output_file: Some(output_file.into()),
            stage: Some(Stage::Finalize),
            percent: Some(100),
        }
    }

    /// Terminal failure record.
    pub fn failed(id: TaskId, error: impl Into<String>) -> Self {
        Self {
            id,
            status: TaskStatus::Failed,
            error: Some(error.into()),
            output_file: None,
            stage: None,
            percent: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_id_is_unique() {
        assert_ne!(TaskId::new(), TaskId::new());
    }

    #[test]
    fn test_pending_omits_optional_fields() {
        let record = TaskRecord::pending(TaskId::from_string("abc"));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json, serde_json::json!({"id": "abc", "status": "pending"}));
    }

    #[test]
    fn test_processing_serialization() {
        let record = TaskRecord::processing(TaskId::from_string("abc"), Stage::Transcode, 42);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"id": "abc", "status": "processing", "stage": "transcode", "percent": 42})
        );
    }

    #[test]
    fn test_completed_invariants() {
        let record = TaskRecord::completed(TaskId::from_string("abc"), "clip.gif");
        assert!(record.is_terminal());
        assert_eq!(record.percent, Some(100));
        assert_eq!(record.output_file.as_deref(), Some("clip.gif"));
        assert!(record.error.is_none());
    }

    #[test]
    fn test_failed_invariants() {
        let record = TaskRecord::failed(TaskId::from_string("abc"), "download failed: 404");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"id": "abc", "status": "failed", "error": "download failed: 404"})
        );
    }

    #[test]
    fn test_record_deserializes_without_optionals() {
        let record: TaskRecord =
            serde_json::from_str(r#"{"id":"x","status":"processing"}"#).unwrap();
        assert_eq!(record.status, TaskStatus::Processing);
        assert!(record.stage.is_none());
    }
}
