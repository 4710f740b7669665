//! Generation recording and gallery handlers.

use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use plushify_models::{GalleryFilter, Generation, GenerationId, NewGeneration};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::services::validate_credits_to_spend;
use crate::state::AppState;

/// Body for `POST /api/generations`.
#[derive(Debug, Deserialize)]
pub struct RecordGenerationRequest {
    /// Credits to debit for this generation.
    pub credits_to_spend: u32,
    #[serde(flatten)]
    pub generation: NewGeneration,
}

/// Stable response shape for record-generation, success or failure.
#[derive(Debug, Serialize)]
pub struct RecordGenerationResponse {
    pub success: bool,
    pub new_balance: Option<u32>,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation: Option<Generation>,
}

impl RecordGenerationResponse {
    fn ok(new_balance: u32, generation: Generation) -> Self {
        Self {
            success: true,
            new_balance: Some(new_balance),
            error: None,
            generation: Some(generation),
        }
    }

    fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            new_balance: None,
            error: Some(message.into()),
            generation: None,
        }
    }
}

/// Record one paid-for generation.
///
/// Both branches return the same JSON shape; the user-facing error strings
/// are stable and deliberately uninformative for infrastructure failures.
/// Validation and authentication are resolved here, before any storage
/// access, so rejected requests are side-effect free.
pub async fn record_generation(
    State(state): State<AppState>,
    auth: Result<AuthUser, ApiError>,
    body: Result<Json<RecordGenerationRequest>, JsonRejection>,
) -> (StatusCode, Json<RecordGenerationResponse>) {
    // A malformed body (non-integer or negative credits, unknown style)
    // never reaches validation, let alone the store.
    let Ok(Json(body)) = body else {
        return failure(ApiError::bad_request("Invalid credit amount"));
    };
    if let Err(e) = validate_credits_to_spend(body.credits_to_spend) {
        return failure(e);
    }

    let user = match auth {
        Ok(user) => user,
        Err(_) => return failure(ApiError::unauthorized("Not authenticated")),
    };

    // First authenticated contact provisions the account (signup credits).
    if let Err(e) = state
        .user_service
        .get_or_create_account(&user.uid, user.email.as_deref())
        .await
    {
        return failure(e);
    }

    match state
        .generation_service
        .record_generation(&user.uid, body.credits_to_spend, body.generation)
        .await
    {
        Ok(recorded) => (
            StatusCode::OK,
            Json(RecordGenerationResponse::ok(
                recorded.new_balance,
                recorded.generation,
            )),
        ),
        Err(e) => failure(e),
    }
}

fn failure(err: ApiError) -> (StatusCode, Json<RecordGenerationResponse>) {
    let (status, message) = match &err {
        ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "Not authenticated".to_string()),
        ApiError::Ledger(e) if e.is_insufficient_credits() => {
            (StatusCode::PAYMENT_REQUIRED, "Insufficient credits".to_string())
        }
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "An error occurred".to_string(),
        ),
    };
    (status, Json(RecordGenerationResponse::err(message)))
}

/// Query parameters for gallery listing.
#[derive(Debug, Deserialize)]
pub struct GalleryQuery {
    pub filter: Option<String>,
    pub limit: Option<u32>,
    pub cursor: Option<String>,
}

/// Gallery listing response.
#[derive(Debug, Serialize)]
pub struct GalleryResponse {
    pub generations: Vec<Generation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// List the caller's generations, newest first.
pub async fn list_generations(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<GalleryQuery>,
) -> ApiResult<Json<GalleryResponse>> {
    let filter = match query.filter.as_deref() {
        Some(s) => s
            .parse::<GalleryFilter>()
            .map_err(|_| ApiError::bad_request(format!("Unknown gallery filter: {}", s)))?,
        None => GalleryFilter::All,
    };

    let (generations, next_cursor) = state
        .generation_service
        .list_gallery(&user.uid, filter, query.limit, query.cursor.as_deref())
        .await?;

    Ok(Json(GalleryResponse {
        generations,
        next_cursor,
    }))
}

/// Favorite toggle response.
#[derive(Debug, Serialize)]
pub struct FavoriteResponse {
    pub id: GenerationId,
    pub is_favorite: bool,
}

/// Toggle a generation's favorite flag.
pub async fn toggle_favorite(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<FavoriteResponse>> {
    let id = GenerationId::from_string(id);
    let generation = state
        .generation_service
        .toggle_favorite(&user.uid, &id)
        .await?;

    Ok(Json(FavoriteResponse {
        id: generation.id,
        is_favorite: generation.is_favorite,
    }))
}

/// Signed image URLs for one generation.
#[derive(Debug, Serialize)]
pub struct ImageUrlsResponse {
    pub source_url: String,
    pub result_url: String,
    pub expires_in_secs: u64,
}

/// Short-lived viewable URLs for a generation's images.
pub async fn get_image_urls(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<ImageUrlsResponse>> {
    let id = GenerationId::from_string(id);
    let expiry = Duration::from_secs(state.config.presign_expiry_secs);
    let urls = state
        .generation_service
        .image_urls(&user.uid, &id, expiry)
        .await?;

    Ok(Json(ImageUrlsResponse {
        source_url: urls.source_url,
        result_url: urls.result_url,
        expires_in_secs: state.config.presign_expiry_secs,
    }))
}

/// Delete a generation. Historical counters are unaffected.
pub async fn delete_generation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = GenerationId::from_string(id);
    state
        .generation_service
        .delete_generation(&user.uid, &id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_shape_carries_balance_and_record() {
        let generation = Generation::from_new(
            "user-1",
            NewGeneration {
                style: plushify_models::PlushieStyle::Classic,
                category: plushify_models::GenerationCategory::People,
                source_image_url: "accounts/user-1/source/a.jpg".into(),
                result_image_url: "accounts/user-1/plushie/a.png".into(),
                metadata: None,
            },
            1,
        );
        let response = RecordGenerationResponse::ok(49, generation);
        assert!(response.success);
        assert_eq!(response.new_balance, Some(49));
        assert!(response.error.is_none());
        assert!(response.generation.is_some());
    }

    #[test]
    fn test_failure_shape_nulls_balance() {
        let (status, Json(response)) =
            failure(ApiError::bad_request("Credit amount exceeds maximum allowed"));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!response.success);
        assert_eq!(response.new_balance, None);
        assert_eq!(
            response.error.as_deref(),
            Some("Credit amount exceeds maximum allowed")
        );
    }

    #[test]
    fn test_insufficient_credits_maps_to_exact_message() {
        let err = ApiError::Ledger(plushify_firestore::LedgerError::InsufficientCredits {
            requested: 1,
            available: 0,
        });
        let (status, Json(response)) = failure(err);
        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(response.error.as_deref(), Some("Insufficient credits"));
    }

    #[test]
    fn test_unknown_failures_stay_opaque() {
        let (status, Json(response)) = failure(ApiError::internal("store exploded"));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.error.as_deref(), Some("An error occurred"));
    }
}
