//! Remote URL metadata.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use tracing::warn;

use mconv_media::{MediaError, MediaInfo};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct InfoQuery {
    pub url: Option<String>,
}

/// Describe a remote URL without downloading it.
pub async fn get_info(
    State(state): State<AppState>,
    Query(query): Query<InfoQuery>,
) -> ApiResult<Json<MediaInfo>> {
    let url = query.url.as_deref().map(str::trim).unwrap_or_default();
    if url.is_empty() {
        return Err(ApiError::bad_request("url is required"));
    }

    match state.downloader().info(url).await {
        Ok(info) => Ok(Json(info)),
        Err(MediaError::JsonParse(e)) => {
            warn!(url = %url, "yt-dlp returned unreadable metadata: {}", e);
            Err(ApiError::bad_gateway("invalid info format"))
        }
        Err(e) => {
            warn!(url = %url, "yt-dlp info failed: {}", e);
            Err(ApiError::bad_gateway("failed to fetch info"))
        }
    }
}
