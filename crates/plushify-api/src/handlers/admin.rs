//! Admin handlers (credit grants, account inspection).

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use plushify_models::AccountRecord;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Get any account record (admin only).
pub async fn get_account(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(uid): Path<String>,
) -> ApiResult<Json<AccountRecord>> {
    state.user_service.require_admin(&caller.uid).await?;

    let record = state
        .user_service
        .ledger(&uid)
        .get_record()
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Account {} not found", uid)))?;

    Ok(Json(record))
}

/// Body for `POST /api/admin/users/:uid/credits`.
#[derive(Debug, Deserialize)]
pub struct GrantCreditsRequest {
    pub amount: u32,
    pub reason: Option<String>,
}

/// Credit grant response.
#[derive(Debug, Serialize)]
pub struct GrantCreditsResponse {
    pub uid: String,
    pub new_balance: u32,
}

/// Grant credits to an account (admin only).
pub async fn grant_credits(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(uid): Path<String>,
    Json(body): Json<GrantCreditsRequest>,
) -> ApiResult<Json<GrantCreditsResponse>> {
    state.user_service.require_admin(&caller.uid).await?;

    let new_balance = state
        .credit_service
        .grant(&uid, body.amount, body.reason.as_deref(), &caller.uid)
        .await?;

    Ok(Json(GrantCreditsResponse { uid, new_balance }))
}
