//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use plushify_firestore::LedgerError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Storage error: {0}")]
    Storage(#[from] plushify_storage::StorageError),

    #[error("Firestore error: {0}")]
    Firestore(#[from] plushify_firestore::FirestoreError),

    #[error("{0}")]
    Ledger(#[from] LedgerError),
}

impl ApiError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Ledger(ledger) => match ledger {
                LedgerError::InsufficientCredits { .. } => StatusCode::PAYMENT_REQUIRED,
                LedgerError::InvalidAmount(_) => StatusCode::BAD_REQUEST,
                LedgerError::AccountNotFound(_) => StatusCode::NOT_FOUND,
                LedgerError::Contention { .. } | LedgerError::Store(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ApiError::Internal(_) | ApiError::Storage(_) | ApiError::Firestore(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn is_internal(&self) -> bool {
        self.status_code() == StatusCode::INTERNAL_SERVER_ERROR
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Don't expose internal error details in production
        let detail = if self.is_internal() {
            tracing::error!(error = %self, "Internal error");
            if std::env::var("ENVIRONMENT").unwrap_or_default() == "production" {
                "An error occurred".to_string()
            } else {
                self.to_string()
            }
        } else {
            self.to_string()
        };

        (status, Json(ErrorResponse { detail })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_credits_maps_to_payment_required() {
        let err = ApiError::Ledger(LedgerError::InsufficientCredits {
            requested: 1,
            available: 0,
        });
        assert_eq!(err.status_code(), StatusCode::PAYMENT_REQUIRED);
        assert!(!err.is_internal());
    }

    #[test]
    fn test_contention_is_internal() {
        let err = ApiError::Ledger(LedgerError::Contention { attempts: 5 });
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.is_internal());
    }

    #[test]
    fn test_bad_request_passes_message_through() {
        let err = ApiError::bad_request("Invalid credit amount");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Bad request: Invalid credit amount");
    }
}
