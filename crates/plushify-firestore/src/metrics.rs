//! Metrics for Firestore operations.

use metrics::{counter, histogram};

/// Metric name constants for consistency.
pub mod names {
    /// Total Firestore requests by operation and status.
    pub const REQUESTS_TOTAL: &str = "plushify_store_requests_total";

    /// Total retry attempts by operation.
    pub const RETRIES_TOTAL: &str = "plushify_store_retries_total";

    /// Ledger commit conflicts (optimistic-lock losers) by operation.
    pub const LEDGER_CONFLICTS_TOTAL: &str = "plushify_ledger_conflicts_total";

    /// Request latency in seconds by operation.
    pub const LATENCY_SECONDS: &str = "plushify_store_latency_seconds";
}

/// Record metrics for a completed Firestore request.
pub fn record_request(operation: &str, status: u16, latency_ms: f64) {
    counter!(
        names::REQUESTS_TOTAL,
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        names::LATENCY_SECONDS,
        "operation" => operation.to_string()
    )
    .record(latency_ms / 1000.0);
}

/// Record a retry attempt.
pub fn record_retry(operation: &str) {
    counter!(
        names::RETRIES_TOTAL,
        "operation" => operation.to_string()
    )
    .increment(1);
}

/// Record a ledger commit conflict.
pub fn record_ledger_conflict(operation: &str) {
    counter!(
        names::LEDGER_CONFLICTS_TOTAL,
        "operation" => operation.to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        assert!(names::REQUESTS_TOTAL.starts_with("plushify_store"));
        assert!(names::RETRIES_TOTAL.contains("retries"));
        assert!(names::LEDGER_CONFLICTS_TOTAL.contains("conflicts"));
    }
}
