//! Session token verification.
//!
//! Sessions are issued by the external identity service; this module only
//! verifies the bearer JWT (HS256, shared secret) and extracts the caller's
//! identity. Account provisioning happens lazily in the user service.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::AuthConfig;
use crate::error::ApiError;
use crate::state::AppState;

/// JWT claims issued by the identity service.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Account id
    pub sub: String,
    /// Email, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub exp: usize,
    pub iat: usize,
    pub iss: String,
    pub aud: String,
}

/// The authenticated caller.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub uid: String,
    pub email: Option<String>,
}

/// Verify a bearer token and return its claims.
pub fn verify_token(config: &AuthConfig, token: &str) -> Result<Claims, ApiError> {
    if config.jwt_secret.is_empty() {
        return Err(ApiError::internal("JWT_SECRET is not configured"));
    }

    let mut validation = Validation::default();
    validation.set_issuer(std::slice::from_ref(&config.issuer));
    validation.set_audience(std::slice::from_ref(&config.audience));

    let key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
    decode::<Claims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            warn!(error = %e, "Rejected session token");
            ApiError::unauthorized("Not authenticated")
        })
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("Not authenticated"))?;

        let token = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .ok_or_else(|| ApiError::unauthorized("Not authenticated"))?;

        let claims = verify_token(&state.config.auth, token)?;

        Ok(AuthUser {
            uid: claims.sub,
            email: claims.email,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn test_config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "test-secret".to_string(),
            issuer: "plushify".to_string(),
            audience: "plushify-users".to_string(),
        }
    }

    fn sign(config: &AuthConfig, sub: &str, ttl_secs: i64) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: sub.to_string(),
            email: Some("a@example.com".to_string()),
            iat: now as usize,
            exp: (now + ttl_secs) as usize,
            iss: config.issuer.clone(),
            aud: config.audience.clone(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
        )
        .expect("sign token")
    }

    #[test]
    fn test_verify_roundtrip() {
        let config = test_config();
        let token = sign(&config, "user-1", 300);
        let claims = verify_token(&config, &token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.email.as_deref(), Some("a@example.com"));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let config = test_config();
        let token = sign(&config, "user-1", -300);
        assert!(verify_token(&config, &token).is_err());
    }

    #[test]
    fn test_wrong_audience_is_rejected() {
        let config = test_config();
        let mut other = test_config();
        other.audience = "other-app".to_string();
        let token = sign(&other, "user-1", 300);
        assert!(verify_token(&config, &token).is_err());
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let config = test_config();
        let mut other = test_config();
        other.jwt_secret = "different".to_string();
        let token = sign(&other, "user-1", 300);
        assert!(verify_token(&config, &token).is_err());
    }

    #[test]
    fn test_missing_secret_is_an_internal_error() {
        let mut config = test_config();
        let token = sign(&config, "user-1", 300);
        config.jwt_secret = String::new();
        let err = verify_token(&config, &token).unwrap_err();
        assert!(matches!(err, ApiError::Internal(_)));
    }
}
