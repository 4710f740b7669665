//! Service-account token caching.
//!
//! Thread-safe, async-aware token cache with a refresh margin, single-flight
//! refresh, and graceful fallback to a still-usable token when refresh fails.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use gcp_auth::TokenProvider;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{FirestoreError, FirestoreResult};

/// Refresh this long before the token actually expires.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Conservative TTL when the provider reports no usable expiry.
/// OAuth access tokens are typically valid for 60 minutes.
const FALLBACK_TTL: Duration = Duration::from_secs(50 * 60);

/// OAuth scope for Firestore/Datastore access.
pub const FIRESTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    /// Valid with the refresh margin applied.
    fn is_fresh(&self) -> bool {
        Instant::now() + REFRESH_MARGIN < self.expires_at
    }

    /// Technically still accepted by the server, even if refresh is due.
    fn is_usable(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Thread-safe token cache with single-flight refresh.
pub struct TokenCache {
    auth: Arc<dyn TokenProvider>,
    cache: RwLock<Option<CachedToken>>,
}

impl TokenCache {
    /// Create a new token cache.
    pub fn new(auth: Arc<dyn TokenProvider>) -> Self {
        Self {
            auth,
            cache: RwLock::new(None),
        }
    }

    /// Drop the cached token, forcing a refresh on the next request.
    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
    }

    /// Get a valid access token, refreshing if necessary.
    pub async fn get_token(&self) -> FirestoreResult<String> {
        // Fast path under the read lock
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_fresh() {
                    return Ok(cached.access_token.clone());
                }
            }
        }

        // Slow path: take the write lock; whoever gets it first refreshes,
        // everyone else sees the refreshed token on the double-check.
        let mut cache = self.cache.write().await;
        if let Some(cached) = cache.as_ref() {
            if cached.is_fresh() {
                return Ok(cached.access_token.clone());
            }
        }

        match self.auth.token(&[FIRESTORE_SCOPE]).await {
            Ok(token) => {
                let access_token = token.as_str().to_string();
                let expires_at = expiry_instant(token.expires_at());

                *cache = Some(CachedToken {
                    access_token: access_token.clone(),
                    expires_at,
                });
                debug!("Refreshed Firestore auth token");
                Ok(access_token)
            }
            Err(e) => {
                // Refresh failed: fall back to the existing token if the
                // server would still accept it.
                if let Some(cached) = cache.as_ref() {
                    if cached.is_usable() {
                        warn!("Token refresh failed, using existing token: {}", e);
                        return Ok(cached.access_token.clone());
                    }
                }
                Err(FirestoreError::auth_error(format!(
                    "Failed to obtain auth token: {}",
                    e
                )))
            }
        }
    }
}

/// Translate the provider's wall-clock expiry into a monotonic instant.
fn expiry_instant(expires_at: chrono::DateTime<Utc>) -> Instant {
    let now = Utc::now();
    if expires_at <= now {
        // Already expired: force refresh on next request.
        return Instant::now();
    }
    match (expires_at - now).to_std() {
        Ok(ttl) => Instant::now() + ttl,
        Err(_) => Instant::now() + FALLBACK_TTL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expired_token_refreshes_immediately() {
        let instant = expiry_instant(Utc::now() - chrono::Duration::seconds(10));
        assert!(instant <= Instant::now() + Duration::from_millis(1));
    }

    #[test]
    fn test_future_expiry_is_preserved() {
        let instant = expiry_instant(Utc::now() + chrono::Duration::seconds(3600));
        let remaining = instant - Instant::now();
        assert!(remaining > Duration::from_secs(3500));
        assert!(remaining < Duration::from_secs(3700));
    }

    #[test]
    fn test_scope_targets_datastore() {
        assert!(FIRESTORE_SCOPE.contains("datastore"));
    }
}
