//! Firestore REST API client.
//!
//! Production client with:
//! - Service-account token caching with refresh margin
//! - HTTP client tuning (pooling, timeouts)
//! - Retry with exponential backoff on transient failures (reads)
//! - Atomic multi-document commits for the credit ledger
//! - Observability (tracing spans, metrics)

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use gcp_auth::{CustomServiceAccount, TokenProvider};
use reqwest::{Client, Method, StatusCode};
use tracing::{debug, info_span, Instrument};

use crate::error::{FirestoreError, FirestoreResult};
use crate::metrics::record_request;
use crate::retry::{with_retry, RetryConfig};
use crate::token_cache::TokenCache;
use crate::types::{
    CommitRequest, CommitResponse, Document, RunQueryRequest, RunQueryResponse, StructuredQuery,
    Value, Write,
};

// =============================================================================
// Configuration
// =============================================================================

/// Firestore client configuration.
#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    /// GCP project ID
    pub project_id: String,
    /// Database ID (usually "(default)")
    pub database_id: String,
    /// Request timeout
    pub timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Retry configuration
    pub retry: RetryConfig,
}

impl FirestoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> FirestoreResult<Self> {
        let project_id = std::env::var("GCP_PROJECT_ID")
            .or_else(|_| std::env::var("FIREBASE_PROJECT_ID"))
            .map_err(|_| {
                FirestoreError::auth_error(
                    "GCP_PROJECT_ID or FIREBASE_PROJECT_ID must be set to access Firestore",
                )
            })?;

        if project_id.is_empty() {
            return Err(FirestoreError::auth_error(
                "GCP_PROJECT_ID or FIREBASE_PROJECT_ID cannot be empty",
            ));
        }

        let connect_timeout_secs: u64 = std::env::var("FIRESTORE_CONNECT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        Ok(Self {
            project_id,
            database_id: std::env::var("FIRESTORE_DATABASE_ID")
                .unwrap_or_else(|_| "(default)".to_string()),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(connect_timeout_secs),
            retry: RetryConfig::from_env(),
        })
    }
}

// =============================================================================
// Client
// =============================================================================

/// Firestore REST API client.
pub struct FirestoreClient {
    http: Client,
    config: FirestoreConfig,
    base_url: String,
    document_root: String,
    token_cache: Arc<TokenCache>,
}

impl Clone for FirestoreClient {
    fn clone(&self) -> Self {
        Self {
            http: self.http.clone(),
            config: self.config.clone(),
            base_url: self.base_url.clone(),
            document_root: self.document_root.clone(),
            token_cache: Arc::clone(&self.token_cache),
        }
    }
}

impl FirestoreClient {
    /// Create a new Firestore client.
    pub async fn new(config: FirestoreConfig) -> FirestoreResult<Self> {
        let auth = Self::create_auth_provider()?;

        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("plushify-firestore/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(FirestoreError::Network)?;

        let document_root = format!(
            "projects/{}/databases/{}/documents",
            config.project_id, config.database_id
        );
        let base_url = format!("https://firestore.googleapis.com/v1/{}", document_root);

        Ok(Self {
            http,
            config,
            base_url,
            document_root,
            token_cache: Arc::new(TokenCache::new(auth)),
        })
    }

    fn create_auth_provider() -> FirestoreResult<Arc<dyn TokenProvider>> {
        let service_account = CustomServiceAccount::from_env().map_err(|e| {
            FirestoreError::auth_error(format!("Failed to load service account: {}", e))
        })?;

        match service_account {
            Some(sa) => Ok(Arc::new(sa)),
            None => Err(FirestoreError::auth_error(
                "GOOGLE_APPLICATION_CREDENTIALS not set. \
                 Set it to the path of your service account JSON file.",
            )),
        }
    }

    /// Create from environment variables.
    pub async fn from_env() -> FirestoreResult<Self> {
        let config = FirestoreConfig::from_env()?;
        Self::new(config).await
    }

    /// Full resource name prefix for documents in this database, as used
    /// in commit writes.
    pub fn document_root(&self) -> &str {
        &self.document_root
    }

    /// REST URL for a document.
    fn document_url(&self, collection: &str, doc_id: &str) -> String {
        format!("{}/{}/{}", self.base_url, collection, doc_id)
    }

    async fn get_token(&self) -> FirestoreResult<String> {
        self.token_cache.get_token().await
    }

    fn is_access_token_expired(body: &str) -> bool {
        body.contains("ACCESS_TOKEN_EXPIRED") || body.contains("\"UNAUTHENTICATED\"")
    }

    /// Send one request, transparently refreshing an expired access token.
    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
    ) -> FirestoreResult<reqwest::Response> {
        let build = |token: &str| {
            let mut req = self.http.request(method.clone(), url).bearer_auth(token);
            if let Some(json) = body {
                req = req.json(json);
            }
            req
        };

        let token = self.get_token().await?;
        let response = build(&token).send().await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        if !Self::is_access_token_expired(&text) {
            return Err(FirestoreError::from_http_status(
                401,
                format!("{} failed: {}", url, text),
            ));
        }

        debug!("Access token expired mid-flight, refreshing");
        self.token_cache.invalidate().await;
        let token = self.get_token().await?;
        Ok(build(&token).send().await?)
    }

    async fn error_from(url: &str, response: reqwest::Response) -> FirestoreError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if body.contains("FAILED_PRECONDITION") {
            return FirestoreError::PreconditionFailed(format!("{} failed: {}", url, body));
        }
        FirestoreError::from_http_status(status.as_u16(), format!("{} failed: {}", url, body))
    }

    // =========================================================================
    // Document operations
    // =========================================================================

    /// Get a document. Returns `None` if it does not exist.
    pub async fn get_document(
        &self,
        collection: &str,
        doc_id: &str,
    ) -> FirestoreResult<Option<Document>> {
        let url = self.document_url(collection, doc_id);

        self.execute_request("get_document", collection, Some(doc_id), async {
            with_retry(&self.config.retry, "get_document", || async {
                let response = self.send(Method::GET, &url, None).await?;
                match response.status() {
                    StatusCode::OK => Ok(Some(response.json::<Document>().await?)),
                    StatusCode::NOT_FOUND => Ok(None),
                    _ => Err(Self::error_from(&url, response).await),
                }
            })
            .await
        })
        .await
    }

    /// Create a document. Fails with `AlreadyExists` if the id is taken.
    pub async fn create_document(
        &self,
        collection: &str,
        doc_id: &str,
        fields: HashMap<String, Value>,
    ) -> FirestoreResult<Document> {
        let url = format!("{}/{}?documentId={}", self.base_url, collection, doc_id);
        let body = serde_json::to_value(Document::new(fields))?;

        self.execute_request("create_document", collection, Some(doc_id), async {
            let response = self.send(Method::POST, &url, Some(&body)).await?;
            match response.status() {
                StatusCode::OK | StatusCode::CREATED => Ok(response.json::<Document>().await?),
                StatusCode::CONFLICT => Err(FirestoreError::AlreadyExists(format!(
                    "{}/{}",
                    collection, doc_id
                ))),
                _ => Err(Self::error_from(&url, response).await),
            }
        })
        .await
    }

    /// Merge-update a document's masked fields.
    ///
    /// Unconditional; counter mutations never go through here, they are
    /// committed with preconditions via [`FirestoreClient::commit`].
    pub async fn update_document(
        &self,
        collection: &str,
        doc_id: &str,
        fields: HashMap<String, Value>,
        update_mask: Vec<String>,
    ) -> FirestoreResult<Document> {
        let params: Vec<String> = update_mask
            .iter()
            .map(|f| format!("updateMask.fieldPaths={}", urlencoding::encode(f)))
            .collect();

        let mut url = self.document_url(collection, doc_id);
        if !params.is_empty() {
            url = format!("{}?{}", url, params.join("&"));
        }

        let body = serde_json::to_value(Document::new(fields))?;

        self.execute_request("update_document", collection, Some(doc_id), async {
            let response = self.send(Method::PATCH, &url, Some(&body)).await?;
            match response.status() {
                StatusCode::OK => Ok(response.json::<Document>().await?),
                StatusCode::NOT_FOUND => Err(FirestoreError::not_found(format!(
                    "{}/{}",
                    collection, doc_id
                ))),
                _ => Err(Self::error_from(&url, response).await),
            }
        })
        .await
    }

    // =========================================================================
    // Atomic commit
    // =========================================================================

    /// Apply a set of writes atomically (`documents:commit`).
    ///
    /// Either every write applies or none does. A failed precondition on any
    /// write (stale `updateTime`, unexpected existence) aborts the whole
    /// commit with `PreconditionFailed`.
    pub async fn commit(&self, writes: Vec<Write>) -> FirestoreResult<CommitResponse> {
        if writes.is_empty() {
            return Err(FirestoreError::request_failed("Empty commit"));
        }
        if writes.len() > 500 {
            return Err(FirestoreError::request_failed(
                "Commit exceeds 500 write limit",
            ));
        }

        let url = format!("{}:commit", self.base_url);
        let body = serde_json::to_value(CommitRequest { writes })?;

        self.execute_request("commit", "commit", None, async {
            let response = self.send(Method::POST, &url, Some(&body)).await?;
            match response.status() {
                StatusCode::OK => Ok(response.json::<CommitResponse>().await?),
                StatusCode::PRECONDITION_FAILED | StatusCode::CONFLICT => {
                    let text = response.text().await.unwrap_or_default();
                    Err(FirestoreError::PreconditionFailed(format!(
                        "Commit precondition failed: {}",
                        text
                    )))
                }
                _ => Err(Self::error_from(&url, response).await),
            }
        })
        .await
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Run a structured query on a collection.
    ///
    /// The `parent_path` is the path containing the collection, e.g.
    /// "accounts/UID" for querying "accounts/UID/generations".
    pub async fn run_query(
        &self,
        parent_path: &str,
        query: StructuredQuery,
    ) -> FirestoreResult<Vec<Document>> {
        let url = format!("{}/{}:runQuery", self.base_url, parent_path);
        let body = serde_json::to_value(RunQueryRequest {
            structured_query: query,
        })?;

        self.execute_request("run_query", parent_path, None, async {
            with_retry(&self.config.retry, "run_query", || async {
                let response = self.send(Method::POST, &url, Some(&body)).await?;
                if response.status() != StatusCode::OK {
                    return Err(Self::error_from(&url, response).await);
                }

                let text = response.text().await.unwrap_or_default();
                // runQuery returns a JSON array of per-document responses
                let responses: Vec<RunQueryResponse> =
                    serde_json::from_str(&text).map_err(|e| {
                        FirestoreError::invalid_response(format!(
                            "Failed to parse runQuery response: {} (body prefix: {})",
                            e,
                            &text[..text.len().min(200)]
                        ))
                    })?;

                Ok(responses.into_iter().filter_map(|r| r.document).collect())
            })
            .await
        })
        .await
    }

    // =========================================================================
    // Internal helpers
    // =========================================================================

    /// Execute a request with tracing and metrics.
    async fn execute_request<T, F>(
        &self,
        operation: &str,
        collection: &str,
        doc_id: Option<&str>,
        fut: F,
    ) -> FirestoreResult<T>
    where
        F: std::future::Future<Output = FirestoreResult<T>>,
    {
        let span = if let Some(id) = doc_id {
            info_span!("firestore_request", operation = %operation, collection = %collection, doc_id = %id)
        } else {
            info_span!("firestore_request", operation = %operation, collection = %collection)
        };

        let start = Instant::now();
        let result = fut.instrument(span).await;
        let latency_ms = start.elapsed().as_millis() as f64;

        let status = match &result {
            Ok(_) => 200,
            Err(e) => e.http_status().unwrap_or(500),
        };
        record_request(operation, status, latency_ms);

        result
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_config_from_env_requires_project_id() {
        std::env::remove_var("GCP_PROJECT_ID");
        std::env::remove_var("FIREBASE_PROJECT_ID");
        assert!(FirestoreConfig::from_env().is_err());
    }

    #[test]
    #[serial]
    fn test_config_rejects_empty_project_id() {
        std::env::set_var("GCP_PROJECT_ID", "");
        std::env::remove_var("FIREBASE_PROJECT_ID");
        assert!(FirestoreConfig::from_env().is_err());
        std::env::remove_var("GCP_PROJECT_ID");
    }

    #[test]
    #[serial]
    fn test_config_accepts_firebase_project_id() {
        std::env::remove_var("GCP_PROJECT_ID");
        std::env::set_var("FIREBASE_PROJECT_ID", "firebase-project");
        let config = FirestoreConfig::from_env().unwrap();
        assert_eq!(config.project_id, "firebase-project");
        std::env::remove_var("FIREBASE_PROJECT_ID");
    }

    #[test]
    #[serial]
    fn test_config_default_timeouts() {
        std::env::set_var("GCP_PROJECT_ID", "test-project");
        std::env::remove_var("FIRESTORE_CONNECT_TIMEOUT_SECS");
        let config = FirestoreConfig::from_env().unwrap();
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.database_id, "(default)");
        std::env::remove_var("GCP_PROJECT_ID");
    }

    #[test]
    #[serial]
    fn test_config_handles_invalid_env_values() {
        std::env::set_var("GCP_PROJECT_ID", "test-project");
        std::env::set_var("FIRESTORE_CONNECT_TIMEOUT_SECS", "not-a-number");
        let config = FirestoreConfig::from_env().unwrap();
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        std::env::remove_var("GCP_PROJECT_ID");
        std::env::remove_var("FIRESTORE_CONNECT_TIMEOUT_SECS");
    }
}
