//! Source photo upload handlers.
//!
//! Image bytes never pass through the API: the browser uploads directly to
//! storage via a presigned PUT, then submits the resulting key when
//! recording the generation.

use std::time::Duration;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use plushify_storage::{plushie_image_key, source_image_key};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// What the upload will hold.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadKind {
    /// The user's uploaded photo.
    #[default]
    Source,
    /// The generated plushie image, persisted for durable gallery serving.
    Result,
}

/// Body for `POST /api/uploads/presign`.
#[derive(Debug, Deserialize)]
pub struct PresignUploadRequest {
    /// MIME type of the upload; defaults by kind.
    pub content_type: Option<String>,
    #[serde(default)]
    pub kind: UploadKind,
}

/// Presigned upload response.
#[derive(Debug, Serialize)]
pub struct PresignUploadResponse {
    /// Storage key to reference when recording the generation.
    pub key: String,
    /// URL to PUT the image bytes to.
    pub upload_url: String,
    pub expires_in_secs: u64,
}

/// Issue a presigned PUT URL for a source photo upload.
pub async fn presign_upload(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<PresignUploadRequest>,
) -> ApiResult<Json<PresignUploadResponse>> {
    let content_type = body.content_type.unwrap_or_else(|| {
        match body.kind {
            UploadKind::Source => "image/jpeg",
            UploadKind::Result => "image/png",
        }
        .to_string()
    });
    if !content_type.starts_with("image/") {
        return Err(ApiError::bad_request("Only image uploads are allowed"));
    }

    let upload_id = Uuid::new_v4().to_string();
    let key = match body.kind {
        UploadKind::Source => source_image_key(&user.uid, &upload_id)?,
        UploadKind::Result => plushie_image_key(&user.uid, &upload_id)?,
    };

    let expiry = Duration::from_secs(state.config.presign_expiry_secs);
    let upload_url = state.storage.presign_put(&key, &content_type, expiry).await?;

    Ok(Json(PresignUploadResponse {
        key,
        upload_url,
        expires_in_secs: state.config.presign_expiry_secs,
    }))
}
