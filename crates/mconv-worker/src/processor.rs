//! Conversion job processing.
//!
//! A submitted task runs as its own tokio task and walks a fixed sequence:
//! fetch (remote sources only), acquire, transform, finalize. Any fatal error
//! jumps straight to `failed`. There is no re-entry and no retry.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn, Instrument};

use mconv_media::{
    move_file, Downloader, EffectiveParams, MediaResult, Prober, ProgressDecoder, RunningTool,
    ToolRunner, TransformSpec,
};
use mconv_models::{output_name, ConversionRequest, Stage, TaskId, TaskRecord, TaskSource};
use mconv_store::SharedStatusStore;

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::TaskLogger;
use crate::reporter::ProgressReporter;

struct ProcessorInner {
    config: WorkerConfig,
    store: SharedStatusStore,
    prober: Prober,
    downloader: Downloader,
    runner: ToolRunner,
    job_slots: Arc<Semaphore>,
}

/// Accepts conversion requests and runs them in the background.
///
/// Cloning is cheap; clones share the store, the tool wrappers and the job
/// slots.
#[derive(Clone)]
pub struct TaskProcessor {
    inner: Arc<ProcessorInner>,
}

impl TaskProcessor {
    pub fn new(config: WorkerConfig, store: SharedStatusStore) -> Self {
        let prober = Prober::new(&config.ffprobe_bin, config.probe_timeout)
            .with_diagnostics(config.diagnostics);
        let downloader = Downloader::new(&config.ytdlp_bin)
            .with_proxy(config.proxy.clone())
            .with_metadata_timeout(config.probe_timeout)
            .with_diagnostics(config.diagnostics);
        let runner = ToolRunner::new().with_diagnostics(config.diagnostics);
        let job_slots = Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1)));

        Self {
            inner: Arc::new(ProcessorInner {
                config,
                store,
                prober,
                downloader,
                runner,
                job_slots,
            }),
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &SharedStatusStore {
        &self.inner.store
    }

    /// The fetch tool wrapper, shared with the metadata endpoint.
    pub fn downloader(&self) -> &Downloader {
        &self.inner.downloader
    }

    /// Record the task as pending and start it in the background.
    ///
    /// Returns as soon as the pending record is written. The job waits for a
    /// free slot and nobody joins it.
    pub async fn submit(&self, request: ConversionRequest) -> TaskId {
        let task_id = TaskId::new();

        let pending = TaskRecord::pending(task_id.clone());
        if let Err(e) = self.inner.store.set(&pending, self.inner.config.task_ttl).await {
            warn!(task_id = %task_id, "Failed to record pending task: {}", e);
        }
        counter!("mconv_tasks_submitted_total", "operation" => request.operation.as_str())
            .increment(1);

        let processor = self.clone();
        let id = task_id.clone();
        tokio::spawn(async move {
            let _permit = match processor.inner.job_slots.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    warn!(task_id = %id, "Job slots closed, task not started");
                    return;
                }
            };
            processor.run(id, request).await;
        });

        task_id
    }

    /// Run one task to its terminal record.
    ///
    /// The task's scratch directory is removed before the terminal record is
    /// written, whatever the outcome.
    pub async fn run(&self, task_id: TaskId, request: ConversionRequest) -> TaskRecord {
        let logger = TaskLogger::new(&task_id, request.operation.as_str());
        let span = logger.create_span();

        async move {
            let started = Instant::now();
            let config = &self.inner.config;
            let mut reporter =
                ProgressReporter::new(self.inner.store.clone(), task_id.clone(), config.task_ttl);

            logger.log_start(match &request.source {
                TaskSource::Remote(url) => url.as_str(),
                TaskSource::Local(_) => "uploaded file",
            });
            reporter.enter(Stage::Init).await;

            let job_dir = config.job_dir(task_id.as_str());
            let result = self.execute(&request, &job_dir, &mut reporter, &logger).await;

            if let Err(e) = tokio::fs::remove_dir_all(&job_dir).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    logger.log_warning(&format!(
                        "failed to remove {}: {}",
                        job_dir.display(),
                        e
                    ));
                }
            }

            let record = match result {
                Ok(file_name) => {
                    logger.log_completion(&file_name);
                    counter!("mconv_tasks_completed_total").increment(1);
                    reporter.complete(&file_name).await
                }
                Err(e) => {
                    logger.log_error(&e.to_string());
                    counter!("mconv_tasks_failed_total", "phase" => e.phase()).increment(1);
                    reporter.fail(&e.to_string()).await
                }
            };

            histogram!("mconv_task_duration_seconds").record(started.elapsed().as_secs_f64());
            record
        }
        .instrument(span)
        .await
    }

    /// Fetch, acquire, transform and publish. Returns the published name.
    async fn execute(
        &self,
        request: &ConversionRequest,
        job_dir: &Path,
        reporter: &mut ProgressReporter,
        logger: &TaskLogger,
    ) -> WorkerResult<String> {
        let config = &self.inner.config;
        tokio::fs::create_dir_all(job_dir).await?;

        let source = match &request.source {
            TaskSource::Remote(url) => self.fetch(url, job_dir, reporter, logger).await?,
            TaskSource::Local(path) => acquire_local(path, job_dir).await?,
        };

        let input_name = source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| {
                WorkerError::processing_failed(format!("no file name in {}", source.display()))
            })?;
        let file_name = output_name(request.operation, &input_name, request.image_format);
        // Published names can equal the source name (`x.mp3` to audio).
        let output = job_dir.join(format!("out_{}", file_name));

        reporter.enter(Stage::Transcode).await;

        let duration = match self.inner.prober.duration(&source).await {
            Ok(duration) => Some(duration),
            Err(e) => {
                logger.log_warning(&format!("duration unknown, using heuristic progress: {}", e));
                None
            }
        };
        let properties = match self.inner.prober.video_properties(&source).await {
            Ok(props) => Some(props),
            Err(e) => {
                debug!("Video properties unavailable: {}", e);
                None
            }
        };

        let params = EffectiveParams::clamp(request.width, request.fps, properties.as_ref());
        if params.width != request.width || params.fps != request.fps {
            info!(
                requested_width = request.width,
                requested_fps = request.fps,
                width = params.width,
                fps = params.fps,
                "Clamped output parameters to source"
            );
        }

        let spec = TransformSpec::new(request, &source, &output, params);
        let cmd = spec.to_command(&config.ffmpeg_bin);
        let running = self
            .inner
            .runner
            .spawn(&cmd)
            .map_err(WorkerError::processing_failed)?;
        drive(
            running,
            ProgressDecoder::Transcode { duration },
            Stage::Transcode,
            reporter,
        )
        .await
        .map_err(WorkerError::processing_failed)?;
        reporter.progress(Stage::Transcode, 100).await;

        move_file(&output, config.uploads_dir.join(&file_name))
            .await
            .map_err(WorkerError::processing_failed)?;

        Ok(file_name)
    }

    /// Download a remote source into the job directory.
    async fn fetch(
        &self,
        url: &str,
        job_dir: &Path,
        reporter: &mut ProgressReporter,
        logger: &TaskLogger,
    ) -> WorkerResult<PathBuf> {
        let downloader = &self.inner.downloader;

        let path = downloader
            .resolve_filename(url, job_dir)
            .await
            .map_err(WorkerError::download_failed)?;

        reporter.enter(Stage::Download).await;
        let running = downloader
            .spawn_download(url, job_dir)
            .map_err(WorkerError::download_failed)?;
        drive(running, ProgressDecoder::Fetch, Stage::Download, reporter)
            .await
            .map_err(WorkerError::download_failed)?;
        reporter.progress(Stage::Download, 100).await;

        if !path.exists() {
            return Err(WorkerError::download_failed(format!(
                "downloaded file not found: {}",
                path.display()
            )));
        }

        logger.log_progress(&format!("downloaded {}", path.display()));
        Ok(path)
    }
}

/// Move an uploaded file into the job directory, keeping its name.
async fn acquire_local(path: &Path, job_dir: &Path) -> WorkerResult<PathBuf> {
    let name = path.file_name().ok_or_else(|| {
        WorkerError::processing_failed(format!("no file name in {}", path.display()))
    })?;
    let dst = job_dir.join(name);
    move_file(path, &dst).await?;
    Ok(dst)
}

/// Forward decoded progress to the reporter until the tool exits.
async fn drive(
    mut running: RunningTool,
    decoder: ProgressDecoder,
    stage: Stage,
    reporter: &mut ProgressReporter,
) -> MediaResult<()> {
    while let Some(percent) = running.next_progress(&decoder).await? {
        reporter.progress(stage, percent).await;
    }
    running.wait().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use mconv_models::{Operation, TaskStatus};
    use mconv_store::{MemoryStore, StatusStore};
    use tempfile::TempDir;

    fn processor(dir: &TempDir) -> (TaskProcessor, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let config = WorkerConfig {
            work_root: dir.path().join("work"),
            uploads_dir: dir.path().join("uploads"),
            ffmpeg_bin: "definitely-not-ffmpeg-mconv".to_string(),
            ffprobe_bin: "definitely-not-ffprobe-mconv".to_string(),
            ..Default::default()
        };
        (TaskProcessor::new(config, store.clone()), store)
    }

    #[tokio::test]
    async fn test_missing_upload_fails_processing() {
        let dir = TempDir::new().unwrap();
        let (processor, store) = processor(&dir);
        let id = TaskId::new();
        let request = ConversionRequest::new(
            Operation::VideoToGif,
            TaskSource::Local(dir.path().join("uploads").join("missing.mp4")),
        );

        let record = processor.run(id.clone(), request).await;

        assert_eq!(record.status, TaskStatus::Failed);
        assert!(record.error.unwrap().starts_with("processing failed: "));
        assert_eq!(store.get(&id).await.unwrap().status, TaskStatus::Failed);
        assert!(!dir.path().join("work").join(id.as_str()).exists());
    }

    #[tokio::test]
    async fn test_missing_transform_tool_fails_processing() {
        let dir = TempDir::new().unwrap();
        let (processor, _store) = processor(&dir);
        let upload = dir.path().join("clip.mp4");
        std::fs::write(&upload, b"not really a video").unwrap();

        let request = ConversionRequest::new(Operation::VideoToAudio, TaskSource::Local(upload));
        let record = processor.run(TaskId::new(), request).await;

        assert_eq!(record.status, TaskStatus::Failed);
        let error = record.error.unwrap();
        assert!(error.starts_with("processing failed: "), "{error}");
        assert!(error.contains("definitely-not-ffmpeg-mconv"), "{error}");
    }

    #[tokio::test]
    async fn test_submit_writes_pending_first() {
        let dir = TempDir::new().unwrap();
        let (processor, store) = processor(&dir);
        let request = ConversionRequest::new(
            Operation::ImageCompress,
            TaskSource::Local(dir.path().join("absent.png")),
        );

        let id = processor.submit(request).await;

        let record = store.get(&id).await.expect("record written on submit");
        assert_eq!(record.id, id);
    }
}
