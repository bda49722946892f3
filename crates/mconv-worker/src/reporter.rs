//! Best-effort status writes for a single task.

use std::time::Duration;

use tracing::debug;

use mconv_models::{Stage, TaskId, TaskRecord};
use mconv_store::SharedStatusStore;

/// Sole writer of one task's record.
///
/// Within a stage only increasing percents are written. Once a terminal
/// record is written every later call is ignored. A failed write is logged
/// and dropped; the job keeps running.
pub struct ProgressReporter {
    store: SharedStatusStore,
    task_id: TaskId,
    ttl: Duration,
    last: Option<(Stage, u8)>,
    finished: bool,
}

impl ProgressReporter {
    pub fn new(store: SharedStatusStore, task_id: TaskId, ttl: Duration) -> Self {
        Self {
            store,
            task_id,
            ttl,
            last: None,
            finished: false,
        }
    }

    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    /// Last (stage, percent) written while processing.
    pub fn last(&self) -> Option<(Stage, u8)> {
        self.last
    }

    /// Enter a stage at 0%.
    pub async fn enter(&mut self, stage: Stage) {
        if self.finished {
            return;
        }
        self.last = Some((stage, 0));
        self.write(TaskRecord::processing(self.task_id.clone(), stage, 0))
            .await;
    }

    /// Report progress within `stage`. Regressions and repeats are dropped.
    pub async fn progress(&mut self, stage: Stage, percent: u8) {
        if self.finished {
            return;
        }
        let percent = percent.min(100);
        if let Some((last_stage, last_percent)) = self.last {
            if last_stage == stage && percent <= last_percent {
                return;
            }
        }
        self.last = Some((stage, percent));
        self.write(TaskRecord::processing(self.task_id.clone(), stage, percent))
            .await;
    }

    pub async fn complete(&mut self, output_file: &str) -> TaskRecord {
        let record = TaskRecord::completed(self.task_id.clone(), output_file);
        self.finish(record).await
    }

    pub async fn fail(&mut self, error: &str) -> TaskRecord {
        let record = TaskRecord::failed(self.task_id.clone(), error);
        self.finish(record).await
    }

    async fn finish(&mut self, record: TaskRecord) -> TaskRecord {
        if !self.finished {
            self.finished = true;
            self.write(record.clone()).await;
        }
        record
    }

    async fn write(&self, record: TaskRecord) {
        if let Err(e) = self.store.set(&record, self.ttl).await {
            debug!(
                task_id = %self.task_id,
                backend = self.store.backend(),
                "Status write dropped: {}", e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use mconv_models::TaskStatus;
    use mconv_store::{MemoryStore, StatusStore, StoreError, StoreResult};

    /// Keeps every write so tests can inspect the full history.
    #[derive(Default)]
    struct RecordingStore {
        writes: Mutex<Vec<TaskRecord>>,
        reject: bool,
    }

    #[async_trait]
    impl StatusStore for RecordingStore {
        async fn set(&self, record: &TaskRecord, _ttl: Duration) -> StoreResult<()> {
            if self.reject {
                return Err(StoreError::connection_failed("store offline"));
            }
            self.writes.lock().unwrap().push(record.clone());
            Ok(())
        }

        async fn get(&self, id: &TaskId) -> Option<TaskRecord> {
            self.writes
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|r| &r.id == id)
                .cloned()
        }

        fn backend(&self) -> &'static str {
            "recording"
        }
    }

    fn percents(store: &RecordingStore) -> Vec<(Stage, Option<u8>)> {
        store
            .writes
            .lock()
            .unwrap()
            .iter()
            .map(|r| (r.stage.unwrap_or(Stage::Init), r.percent))
            .collect()
    }

    #[tokio::test]
    async fn test_regressions_within_stage_are_dropped() {
        let store = Arc::new(RecordingStore::default());
        let mut reporter = ProgressReporter::new(store.clone(), TaskId::new(), Duration::from_secs(60));

        reporter.enter(Stage::Transcode).await;
        reporter.progress(Stage::Transcode, 40).await;
        reporter.progress(Stage::Transcode, 30).await;
        reporter.progress(Stage::Transcode, 55).await;

        assert_eq!(
            percents(&store),
            vec![
                (Stage::Transcode, Some(0)),
                (Stage::Transcode, Some(40)),
                (Stage::Transcode, Some(55)),
            ]
        );
        assert_eq!(reporter.last(), Some((Stage::Transcode, 55)));
    }

    #[tokio::test]
    async fn test_repeated_percent_is_written_once() {
        let store = Arc::new(RecordingStore::default());
        let mut reporter = ProgressReporter::new(store.clone(), TaskId::new(), Duration::from_secs(60));

        reporter.enter(Stage::Download).await;
        reporter.progress(Stage::Download, 0).await;
        reporter.progress(Stage::Download, 100).await;
        reporter.progress(Stage::Download, 100).await;

        assert_eq!(
            percents(&store),
            vec![(Stage::Download, Some(0)), (Stage::Download, Some(100))]
        );
    }

    #[tokio::test]
    async fn test_new_stage_restarts_at_zero() {
        let store = Arc::new(RecordingStore::default());
        let mut reporter = ProgressReporter::new(store.clone(), TaskId::new(), Duration::from_secs(60));

        reporter.enter(Stage::Download).await;
        reporter.progress(Stage::Download, 100).await;
        reporter.enter(Stage::Transcode).await;

        assert_eq!(percents(&store).last(), Some(&(Stage::Transcode, Some(0))));
    }

    #[tokio::test]
    async fn test_terminal_record_is_final() {
        let store = Arc::new(MemoryStore::new());
        let id = TaskId::new();
        let mut reporter = ProgressReporter::new(store.clone(), id.clone(), Duration::from_secs(60));

        reporter.complete("clip.gif").await;
        reporter.progress(Stage::Transcode, 10).await;
        reporter.fail("late failure").await;

        let record = store.get(&id).await.unwrap();
        assert_eq!(record.status, TaskStatus::Completed);
        assert_eq!(record.output_file.as_deref(), Some("clip.gif"));
    }

    #[tokio::test]
    async fn test_write_failures_are_swallowed() {
        let store = Arc::new(RecordingStore {
            reject: true,
            ..Default::default()
        });
        let mut reporter = ProgressReporter::new(store, TaskId::new(), Duration::from_secs(60));

        reporter.enter(Stage::Init).await;
        let record = reporter.fail("processing failed: boom").await;
        assert_eq!(record.status, TaskStatus::Failed);
    }
}
