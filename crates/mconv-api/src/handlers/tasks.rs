//! Conversion submission and status polling.

use std::path::{Path, PathBuf};

use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{Multipart, Path as UrlPath, State};
use axum::Json;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use mconv_models::{ConversionRequest, ImageFormat, Operation, TaskId, TaskRecord, TaskSource};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub task_id: TaskId,
}

/// Text fields of the upload form. Numeric fields that are missing or not
/// a number read as 0.
#[derive(Debug, Default)]
struct UploadForm {
    kind: String,
    crf: u32,
    width: u32,
    fps: u32,
    quality: u32,
    img_format: String,
    url: String,
    file: Option<PathBuf>,
}

impl UploadForm {
    fn set(&mut self, name: &str, value: String) {
        let number = || value.trim().parse().unwrap_or(0);
        match name {
            "type" => self.kind = value.trim().to_string(),
            "crf" => self.crf = number(),
            "width" => self.width = number(),
            "fps" => self.fps = number(),
            "quality" => self.quality = number(),
            "img_format" => self.img_format = value.trim().to_ascii_lowercase(),
            "url" => self.url = value.trim().to_string(),
            _ => {}
        }
    }

    fn into_request(self) -> ApiResult<ConversionRequest> {
        let source = if !self.url.is_empty() {
            TaskSource::remote(&self.url).map_err(|e| ApiError::bad_request(e.to_string()))?
        } else if let Some(path) = self.file {
            TaskSource::Local(path)
        } else {
            return Err(ApiError::bad_request("File or URL is required"));
        };

        let operation: Operation = self
            .kind
            .parse()
            .map_err(|e: mconv_models::ModelError| ApiError::bad_request(e.to_string()))?;

        Ok(ConversionRequest::new(operation, source)
            .with_crf(self.crf)
            .with_width(self.width)
            .with_fps(self.fps)
            .with_quality(self.quality)
            .with_image_format(ImageFormat::from_hint(&self.img_format)))
    }
}

/// Accept a multipart conversion request and start it in the background.
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let mut form = UploadForm::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                discard(form.file.as_deref()).await;
                return Err(multipart_error(e));
            }
        };
        let name = field.name().unwrap_or_default().to_string();

        if name == "file" {
            let Some(file_name) = field.file_name().and_then(sanitize_file_name) else {
                continue;
            };
            let path = state.config.uploads_dir.join(file_name);
            // A repeated file field replaces the earlier one.
            discard(form.file.take().as_deref()).await;
            save_field(field, &path).await?;
            form.file = Some(path);
        } else {
            match field.text().await {
                Ok(value) => form.set(&name, value),
                Err(e) => {
                    discard(form.file.as_deref()).await;
                    return Err(multipart_error(e));
                }
            }
        }
    }

    let uploaded = form.file.clone();
    let request = match form.into_request() {
        Ok(request) => request,
        Err(e) => {
            discard(uploaded.as_deref()).await;
            return Err(e);
        }
    };
    if request.source.is_remote() {
        // The URL wins over an uploaded file.
        discard(uploaded.as_deref()).await;
    }

    let operation = request.operation;
    let task_id = state.processor.submit(request).await;
    info!(task_id = %task_id, operation = %operation.as_str(), "Task submitted");

    Ok(Json(UploadResponse { task_id }))
}

/// Latest status record for a task.
pub async fn get_status(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<String>,
) -> ApiResult<Json<TaskRecord>> {
    state
        .store
        .get(&TaskId::from_string(id))
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found("not found"))
}

/// Keep only the final path component of a client supplied file name.
fn sanitize_file_name(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next()?.trim();
    if base.is_empty() || base == "." || base == ".." {
        return None;
    }
    Some(base.to_string())
}

/// Stream a file field to disk. A partial file is removed on failure.
async fn save_field(mut field: Field<'_>, path: &Path) -> ApiResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::File::create(path).await?;
    let mut written = 0u64;

    loop {
        let chunk = match field.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(e) => {
                drop(file);
                discard(Some(path)).await;
                return Err(multipart_error(e));
            }
        };
        if let Err(e) = file.write_all(&chunk).await {
            drop(file);
            discard(Some(path)).await;
            return Err(e.into());
        }
        written += chunk.len() as u64;
    }
    file.flush().await?;

    metrics::record_upload_bytes(written);
    Ok(())
}

async fn discard(path: Option<&Path>) {
    if let Some(path) = path {
        if let Err(e) = tokio::fs::remove_file(path).await {
            warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}

fn multipart_error(e: MultipartError) -> ApiError {
    ApiError::bad_request(e.body_text())
}
