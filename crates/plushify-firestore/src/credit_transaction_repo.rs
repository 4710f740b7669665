//! Typed read access and field mapping for credit transaction history.
//!
//! History records are written atomically with the balance change they
//! describe: creation is staged into the same ledger commit, so the history
//! always reconciles with the account counters. This module only reads and
//! maps fields.

use std::collections::HashMap;

use tracing::warn;

use plushify_models::{CreditOperationType, CreditTransaction, GenerationId};

use crate::client::FirestoreClient;
use crate::error::{FirestoreError, FirestoreResult};
use crate::types::{
    CollectionSelector, Cursor, Filter, FieldReference, FromFirestoreValue, Order,
    StructuredQuery, ToFirestoreValue, Value,
};

/// Default page size for history listings.
const DEFAULT_PAGE_SIZE: u32 = 50;

/// Maximum page size for history listings.
const MAX_PAGE_SIZE: u32 = 100;

/// Collection path for an account's credit transactions.
pub fn credit_transactions_collection(uid: &str) -> String {
    format!("accounts/{}/credit_transactions", uid)
}

/// Repository for credit transaction documents.
pub struct CreditTransactionRepository {
    client: FirestoreClient,
    user_id: String,
}

impl CreditTransactionRepository {
    /// Create a new credit transaction repository.
    pub fn new(client: FirestoreClient, user_id: impl Into<String>) -> Self {
        Self {
            client,
            user_id: user_id.into(),
        }
    }

    /// List credit transactions, newest first, with optional operation-type
    /// filtering and cursor pagination.
    ///
    /// The cursor is the `timestamp` (RFC3339) of the last item of the
    /// previous page.
    pub async fn list_page(
        &self,
        limit: Option<u32>,
        cursor: Option<&str>,
        operation_type: Option<CreditOperationType>,
    ) -> FirestoreResult<(Vec<CreditTransaction>, Option<String>)> {
        let query = build_history_query(limit, cursor, operation_type);

        let parent_path = format!("accounts/{}", self.user_id);
        let docs = self.client.run_query(&parent_path, query).await?;

        let mut transactions = Vec::with_capacity(docs.len());
        for doc in docs {
            let Some(id) = doc.doc_id().map(str::to_string) else {
                continue;
            };
            match document_to_transaction(&doc, &id) {
                Ok(tx) => transactions.push(tx),
                Err(e) => {
                    warn!(
                        user_id = %self.user_id,
                        tx_id = %id,
                        error = %e,
                        "Failed to parse credit transaction document"
                    );
                }
            }
        }

        let next_cursor = transactions.last().map(|tx| tx.timestamp.to_rfc3339());
        Ok((transactions, next_cursor))
    }
}

/// Build the history listing query.
fn build_history_query(
    limit: Option<u32>,
    cursor: Option<&str>,
    operation_type: Option<CreditOperationType>,
) -> StructuredQuery {
    let effective_limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE) as i32;

    let mut filters = Vec::new();
    if let Some(op) = operation_type {
        filters.push(Filter::field(
            "operation_type",
            "EQUAL",
            Value::StringValue(op.as_str().to_string()),
        ));
    }

    StructuredQuery {
        from: vec![CollectionSelector {
            collection_id: "credit_transactions".to_string(),
            all_descendants: None,
        }],
        filter: Filter::and(filters),
        order_by: Some(vec![Order {
            field: FieldReference {
                field_path: "timestamp".to_string(),
            },
            direction: "DESCENDING".to_string(),
        }]),
        start_at: cursor.map(|ts| Cursor {
            values: vec![Value::TimestampValue(ts.to_string())],
            before: Some(false),
        }),
        limit: Some(effective_limit),
    }
}

// =============================================================================
// Field mapping
// =============================================================================

/// Convert a credit transaction to Firestore fields.
pub fn credit_transaction_to_fields(tx: &CreditTransaction) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert("id".to_string(), tx.id.to_firestore_value());
    fields.insert("user_id".to_string(), tx.user_id.to_firestore_value());
    fields.insert("timestamp".to_string(), tx.timestamp.to_firestore_value());
    fields.insert(
        "operation_type".to_string(),
        tx.operation_type.as_str().to_firestore_value(),
    );
    fields.insert(
        "credits_amount".to_string(),
        tx.credits_amount.to_firestore_value(),
    );
    fields.insert(
        "description".to_string(),
        tx.description.to_firestore_value(),
    );
    fields.insert(
        "balance_after".to_string(),
        tx.balance_after.to_firestore_value(),
    );
    if let Some(ref generation_id) = tx.generation_id {
        fields.insert(
            "generation_id".to_string(),
            generation_id.as_str().to_firestore_value(),
        );
    }
    fields.insert("created_at".to_string(), tx.created_at.to_firestore_value());
    fields
}

/// Parse a credit transaction from a Firestore document.
pub fn document_to_transaction(
    doc: &crate::types::Document,
    id: &str,
) -> FirestoreResult<CreditTransaction> {
    let fields = doc.fields.as_ref().ok_or_else(|| {
        FirestoreError::invalid_response(format!("Transaction {} has no fields", id))
    })?;

    let get_string =
        |key: &str| -> Option<String> { fields.get(key).and_then(String::from_firestore_value) };
    let get_u32 = |key: &str| -> u32 {
        fields
            .get(key)
            .and_then(u32::from_firestore_value)
            .unwrap_or(0)
    };

    let operation_type = get_string("operation_type")
        .as_deref()
        .and_then(CreditOperationType::from_str)
        .ok_or_else(|| {
            FirestoreError::invalid_response(format!(
                "Transaction {} has invalid operation_type",
                id
            ))
        })?;

    let timestamp = fields
        .get("timestamp")
        .and_then(chrono::DateTime::from_firestore_value)
        .unwrap_or_else(chrono::Utc::now);

    Ok(CreditTransaction {
        id: id.to_string(),
        user_id: get_string("user_id").unwrap_or_default(),
        timestamp,
        operation_type,
        credits_amount: get_u32("credits_amount"),
        description: get_string("description").unwrap_or_default(),
        balance_after: get_u32("balance_after"),
        generation_id: get_string("generation_id").map(GenerationId::from_string),
        created_at: fields
            .get("created_at")
            .and_then(chrono::DateTime::from_firestore_value)
            .unwrap_or(timestamp),
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_parse_back_to_the_same_record() {
        let tx = CreditTransaction::new(
            "tx-1".into(),
            "user-1".into(),
            CreditOperationType::Generation,
            1,
            "Plushie generation (kawaii)".into(),
            9,
        )
        .with_generation_id(GenerationId::from_string("gen-1"));

        let doc = crate::types::Document::new(credit_transaction_to_fields(&tx));
        let parsed = document_to_transaction(&doc, "tx-1").unwrap();

        assert_eq!(parsed.operation_type, CreditOperationType::Generation);
        assert_eq!(parsed.credits_amount, 1);
        assert_eq!(parsed.balance_after, 9);
        assert_eq!(parsed.generation_id.unwrap().as_str(), "gen-1");
    }

    #[test]
    fn test_unknown_operation_type_is_rejected() {
        let tx = CreditTransaction::new(
            "tx-2".into(),
            "user-1".into(),
            CreditOperationType::Purchase,
            30,
            "Basic pack".into(),
            40,
        );
        let mut fields = credit_transaction_to_fields(&tx);
        fields.insert("operation_type".to_string(), "levitation".to_firestore_value());
        let doc = crate::types::Document::new(fields);
        assert!(document_to_transaction(&doc, "tx-2").is_err());
    }

    #[test]
    fn test_history_query_filter_and_order() {
        let query = build_history_query(Some(25), None, Some(CreditOperationType::Purchase));
        assert_eq!(query.limit, Some(25));
        let field_filter = query.filter.unwrap().field_filter.unwrap();
        assert_eq!(field_filter.field.field_path, "operation_type");
        let order = query.order_by.unwrap();
        assert_eq!(order[0].field.field_path, "timestamp");
        assert_eq!(order[0].direction, "DESCENDING");
    }
}
