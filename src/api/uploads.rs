//! Standalone image upload endpoints: store files through the configured
//! object storage backend and hand back URLs.

use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::ApiError;
use crate::AppState;

const MAX_FILES: usize = 5;
const MAX_FILE_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    /// Optional folder the object lands under (e.g. a salon name)
    pub folder: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct MultiUploadResponse {
    pub urls: Vec<String>,
}

async fn store_fields(
    state: &AppState,
    mut multipart: Multipart,
    folder: Option<&str>,
    max_files: usize,
) -> Result<Vec<String>, ApiError> {
    let prefix = folder.map(crate::storage::sanitize_segment);
    let mut urls = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart payload: {e}")))?
    {
        if urls.len() >= max_files {
            return Err(ApiError::validation_field(
                "files",
                format!("At most {max_files} files per upload"),
            ));
        }

        let is_image = field
            .content_type()
            .map(|ct| ct.starts_with("image/"))
            .unwrap_or(false);
        if !is_image {
            return Err(ApiError::validation_field("files", "Only image files are allowed"));
        }

        let original = field.file_name().unwrap_or("image").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {e}")))?;
        if data.len() > MAX_FILE_BYTES {
            return Err(ApiError::validation_field("files", "File exceeds the 5 MB limit"));
        }

        let name = crate::storage::unique_name(&original);
        let url = state
            .storage
            .put(data, &name, prefix.as_deref())
            .await
            .map_err(|e| ApiError::internal(format!("Failed to store file: {e}")))?;
        urls.push(url);
    }

    if urls.is_empty() {
        return Err(ApiError::validation_field("files", "No files in upload"));
    }
    Ok(urls)
}

/// POST /api/admin/uploads/single
pub async fn upload_single(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UploadQuery>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    let urls = store_fields(&state, multipart, query.folder.as_deref(), 1).await?;
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            url: urls.into_iter().next().expect("one stored file"),
        }),
    ))
}

/// POST /api/admin/uploads/multiple
pub async fn upload_multiple(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UploadQuery>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<MultiUploadResponse>), ApiError> {
    let urls = store_fields(&state, multipart, query.folder.as_deref(), MAX_FILES).await?;
    Ok((StatusCode::CREATED, Json(MultiUploadResponse { urls })))
}
