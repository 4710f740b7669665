//! Firestore REST API client and the Plushify credit ledger.
//!
//! This crate provides:
//! - The account ledger: atomic, race-safe credit accounting
//! - Typed repositories for generations and credit history
//! - Service account authentication via gcp_auth
//! - Atomic multi-document commits, preconditions and retry logic

pub mod client;
pub mod credit_transaction_repo;
pub mod error;
pub mod generation_repo;
pub mod ledger;
pub mod metrics;
pub mod retry;
pub mod token_cache;
pub mod types;

pub use client::{FirestoreClient, FirestoreConfig};
pub use credit_transaction_repo::{
    credit_transaction_to_fields, credit_transactions_collection, CreditTransactionRepository,
};
pub use error::{FirestoreError, FirestoreResult};
pub use generation_repo::{
    generation_to_fields, generations_collection, GenerationRepository,
};
pub use ledger::{
    AccountLedger, DebitReceipt, LedgerError, LedgerResult, LedgerTransaction,
    ACCOUNTS_COLLECTION,
};
pub use retry::RetryConfig;
pub use types::{Document, FromFirestoreValue, ToFirestoreValue, Value, Write};
