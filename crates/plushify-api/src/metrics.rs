//! Prometheus metrics for the API server.

use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder")
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "plushify_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "plushify_http_request_duration_seconds";

    // Credit ledger metrics
    pub const GENERATIONS_RECORDED_TOTAL: &str = "plushify_generations_recorded_total";
    pub const CREDITS_DEBITED_TOTAL: &str = "plushify_credits_debited_total";
    pub const CREDITS_GRANTED_TOTAL: &str = "plushify_credits_granted_total";
    pub const INSUFFICIENT_CREDITS_TOTAL: &str = "plushify_insufficient_credits_total";

    // Rate limiting metrics
    pub const RATE_LIMIT_HITS_TOTAL: &str = "plushify_rate_limit_hits_total";
}

/// HTTP metrics middleware.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = sanitize_path(request.uri().path());
    let start = Instant::now();

    let response = next.run(request).await;

    let labels = [
        ("method", method),
        ("path", path),
        ("status", response.status().as_u16().to_string()),
    ];
    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels)
        .record(start.elapsed().as_secs_f64());

    response
}

/// Record a successfully recorded generation.
pub fn record_generation_recorded(style: &str) {
    counter!(
        names::GENERATIONS_RECORDED_TOTAL,
        "style" => style.to_string()
    )
    .increment(1);
}

/// Record debited credits.
pub fn record_credits_debited(amount: u32) {
    counter!(names::CREDITS_DEBITED_TOTAL).increment(amount as u64);
}

/// Record granted credits (purchases, refunds, admin grants).
pub fn record_credits_granted(amount: u32, operation: &str) {
    counter!(
        names::CREDITS_GRANTED_TOTAL,
        "operation" => operation.to_string()
    )
    .increment(amount as u64);
}

/// Record a rejected debit due to insufficient balance.
pub fn record_insufficient_credits() {
    counter!(names::INSUFFICIENT_CREDITS_TOTAL).increment(1);
}

/// Record a rate limit rejection.
pub fn record_rate_limit_hit(path: &str) {
    counter!(
        names::RATE_LIMIT_HITS_TOTAL,
        "path" => sanitize_path(path)
    )
    .increment(1);
}

/// Collapse path segments that look like ids so metric cardinality stays
/// bounded.
fn sanitize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            let id_like = segment.len() >= 16
                || (!segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit()));
            if id_like {
                ":id"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path_collapses_ids() {
        assert_eq!(
            sanitize_path("/api/generations/7f9c0e62-1b2d-4c3a-9e88-aa00bb11cc22/favorite"),
            "/api/generations/:id/favorite"
        );
        assert_eq!(sanitize_path("/api/credits"), "/api/credits");
        assert_eq!(sanitize_path("/api/admin/users/12345/credits"), "/api/admin/users/:id/credits");
    }
}
