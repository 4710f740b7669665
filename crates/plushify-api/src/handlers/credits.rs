//! Account and credit handlers.

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use plushify_models::{AccountRecord, AccountStats, CreditOperationType, CreditPack, CreditTransaction};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Get the caller's account record, provisioning it on first contact.
pub async fn get_me(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<AccountRecord>> {
    let record = state
        .user_service
        .get_or_create_account(&user.uid, user.email.as_deref())
        .await?;
    Ok(Json(record))
}

/// Get the caller's credit counters.
///
/// A pure read for existing accounts; only first contact provisions.
pub async fn get_credits(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<AccountStats>> {
    if let Some(stats) = state.credit_service.stats(&user.uid).await? {
        return Ok(Json(stats));
    }

    let record = state
        .user_service
        .get_or_create_account(&user.uid, user.email.as_deref())
        .await?;
    Ok(Json(record.stats()))
}

/// Query parameters for credit history.
#[derive(Debug, Deserialize)]
pub struct CreditHistoryQuery {
    pub limit: Option<u32>,
    /// Timestamp (RFC3339) of the last item of the previous page.
    pub cursor: Option<String>,
    /// Filter by operation type.
    pub operation_type: Option<String>,
}

/// Credit history response.
#[derive(Debug, Serialize)]
pub struct CreditHistoryResponse {
    pub transactions: Vec<CreditTransaction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Get the caller's credit transaction history.
pub async fn get_credit_history(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<CreditHistoryQuery>,
) -> ApiResult<Json<CreditHistoryResponse>> {
    let operation_type = query
        .operation_type
        .as_deref()
        .map(|s| {
            CreditOperationType::from_str(s).ok_or_else(|| {
                ApiError::bad_request(format!(
                    "Invalid operation_type '{}'. Must be one of: generation, purchase, refund, admin_adjustment",
                    s
                ))
            })
        })
        .transpose()?;

    let (transactions, next_cursor) = state
        .credit_service
        .history(&user.uid, query.limit, query.cursor.as_deref(), operation_type)
        .await?;

    Ok(Json(CreditHistoryResponse {
        transactions,
        next_cursor,
    }))
}

/// Body for `POST /api/credits/purchase`.
#[derive(Debug, Deserialize)]
pub struct PurchaseRequest {
    /// Pack identifier: basic, pro or elite.
    pub pack: String,
}

/// Purchase fulfillment response.
#[derive(Debug, Serialize)]
pub struct PurchaseResponse {
    pub pack: String,
    pub credits_added: u32,
    pub new_balance: u32,
}

/// Fulfill a completed credit pack purchase.
pub async fn purchase_credits(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<PurchaseRequest>,
) -> ApiResult<Json<PurchaseResponse>> {
    let pack: CreditPack = body
        .pack
        .parse()
        .map_err(|_| ApiError::bad_request(format!("Unknown credit pack: {}", body.pack)))?;

    // Provision on first contact so a purchase can be the account's first
    // authenticated action.
    state
        .user_service
        .get_or_create_account(&user.uid, user.email.as_deref())
        .await?;

    let new_balance = state.credit_service.purchase(&user.uid, pack).await?;

    Ok(Json(PurchaseResponse {
        pack: pack.as_str().to_string(),
        credits_added: pack.credits(),
        new_balance,
    }))
}
