//! Account ledger: atomic, race-safe credit accounting.
//!
//! The ledger owns every mutation of an account's credit counters
//! (`credits`, `credits_used`, `total_generations`, `favorite_count`).
//! No other code path writes these fields.
//!
//! # Concurrency
//!
//! Mutations run as optimistic transactions: read the account document and
//! its `updateTime`, stage changes in memory, then apply everything in one
//! atomic `documents:commit` whose account write carries an `updateTime`
//! precondition. A concurrent writer invalidates the precondition, the
//! commit applies nothing, and the operation re-reads and retries with
//! backoff. Two concurrent debits against a balance of 1 credit therefore
//! resolve to exactly one success and one `InsufficientCredits`.
//!
//! Subordinate documents (generation records, credit-transaction history)
//! are staged into the same commit, so "debited but not recorded" is never
//! an observable state.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use plushify_models::{AccountRecord, AccountStats, PlatformRole};

use crate::client::FirestoreClient;
use crate::error::{FirestoreError, FirestoreResult};
use crate::metrics::record_ledger_conflict;
use crate::types::{
    Document, FromFirestoreValue, Precondition, ToFirestoreValue, Value, Write,
};

/// Collection holding account documents.
pub const ACCOUNTS_COLLECTION: &str = "accounts";

/// Maximum attempts for an optimistic transaction before giving up.
const MAX_COMMIT_ATTEMPTS: u32 = 5;

/// Base delay between conflict retries (milliseconds, scales linearly).
const CONFLICT_BASE_DELAY_MS: u64 = 50;

// =============================================================================
// Errors
// =============================================================================

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Errors surfaced by ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The balance cannot cover the requested debit. Nothing was written.
    #[error("Insufficient credits: requested {requested}, available {available}")]
    InsufficientCredits { requested: u32, available: u32 },

    /// Debit amounts must be positive integers.
    #[error("Invalid debit amount: {0}")]
    InvalidAmount(u32),

    /// The account document does not exist.
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Concurrent writers kept invalidating the transaction.
    #[error("Account update contention after {attempts} attempts")]
    Contention { attempts: u32 },

    /// Underlying store failure.
    #[error(transparent)]
    Store(#[from] FirestoreError),
}

impl LedgerError {
    /// True when a concurrent writer invalidated the commit precondition;
    /// the operation can re-read and try again.
    pub fn is_conflict(&self) -> bool {
        matches!(self, LedgerError::Store(e) if e.is_precondition_failed())
    }

    pub fn is_insufficient_credits(&self) -> bool {
        matches!(self, LedgerError::InsufficientCredits { .. })
    }
}

/// Outcome of a successful debit.
#[derive(Debug, Clone, Copy)]
pub struct DebitReceipt {
    /// Spendable balance after the debit.
    pub new_balance: u32,
    /// Lifetime credits used after the debit.
    pub credits_used: u32,
}

// =============================================================================
// Staged transaction
// =============================================================================

/// An in-memory staged mutation of one account plus any subordinate writes.
///
/// Staging is pure: nothing touches the store until the owning
/// [`AccountLedger`] commits, and a staging error (insufficient balance)
/// means zero writes are issued.
pub struct LedgerTransaction {
    document_root: String,
    uid: String,
    account: AccountRecord,
    update_time: String,
    extra_writes: Vec<Write>,
}

impl LedgerTransaction {
    /// Build a transaction from an account snapshot.
    ///
    /// `update_time` is the snapshot's server `updateTime`; the commit is
    /// preconditioned on it.
    pub fn new(
        document_root: impl Into<String>,
        account: AccountRecord,
        update_time: impl Into<String>,
    ) -> Self {
        Self {
            document_root: document_root.into(),
            uid: account.uid.clone(),
            account,
            update_time: update_time.into(),
            extra_writes: Vec::new(),
        }
    }

    /// Current (staged) spendable balance.
    pub fn credits(&self) -> u32 {
        self.account.credits
    }

    /// Current (staged) counters.
    pub fn stats(&self) -> AccountStats {
        self.account.stats()
    }

    /// The snapshot `updateTime` this transaction is preconditioned on.
    pub fn snapshot_update_time(&self) -> &str {
        &self.update_time
    }

    /// Stage a debit: fails with `InsufficientCredits` when the staged
    /// balance cannot cover it, leaving the transaction unchanged.
    pub fn debit(&mut self, amount: u32) -> LedgerResult<u32> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        if self.account.credits < amount {
            return Err(LedgerError::InsufficientCredits {
                requested: amount,
                available: self.account.credits,
            });
        }
        self.account.credits -= amount;
        self.account.credits_used += amount;
        Ok(self.account.credits)
    }

    /// Stage an unconditional credit. Returns the new balance.
    pub fn credit(&mut self, amount: u32) -> u32 {
        self.account.credits = self.account.credits.saturating_add(amount);
        self.account.credits
    }

    /// Stage `total_generations += 1`. Returns the new count.
    pub fn count_generation(&mut self) -> u32 {
        self.account.total_generations += 1;
        self.account.total_generations
    }

    /// Stage a favorite-count adjustment, clamped at zero.
    pub fn adjust_favorites(&mut self, delta: i64) -> u32 {
        let current = self.account.favorite_count as i64;
        self.account.favorite_count = current.saturating_add(delta).max(0) as u32;
        self.account.favorite_count
    }

    /// Stage creation of a subordinate document in the same commit.
    /// Fails the commit if the document already exists.
    pub fn stage_create(
        &mut self,
        collection: &str,
        doc_id: &str,
        fields: HashMap<String, Value>,
    ) {
        let name = self.doc_name(collection, doc_id);
        self.extra_writes.push(Write::create(name, fields));
    }

    /// Stage a partial update of an existing subordinate document.
    pub fn stage_update(
        &mut self,
        collection: &str,
        doc_id: &str,
        fields: HashMap<String, Value>,
        mask: Vec<String>,
    ) {
        let name = self.doc_name(collection, doc_id);
        self.extra_writes
            .push(Write::update(name, fields, mask, Precondition::must_exist()));
    }

    /// Stage deletion of a subordinate document.
    pub fn stage_delete(&mut self, collection: &str, doc_id: &str) {
        let name = self.doc_name(collection, doc_id);
        self.extra_writes.push(Write::delete(name));
    }

    fn doc_name(&self, collection: &str, doc_id: &str) -> String {
        format!("{}/{}/{}", self.document_root, collection, doc_id)
    }

    /// The writes this transaction will commit.
    ///
    /// The account write always leads and carries the `updateTime`
    /// precondition: it is the serialization anchor for every ledger
    /// transaction, including ones that only touch subordinate documents.
    pub fn into_writes(self) -> Vec<Write> {
        let account_name = format!(
            "{}/{}/{}",
            self.document_root, ACCOUNTS_COLLECTION, self.uid
        );

        let mut fields = HashMap::new();
        fields.insert("credits".to_string(), self.account.credits.to_firestore_value());
        fields.insert(
            "credits_used".to_string(),
            self.account.credits_used.to_firestore_value(),
        );
        fields.insert(
            "total_generations".to_string(),
            self.account.total_generations.to_firestore_value(),
        );
        fields.insert(
            "favorite_count".to_string(),
            self.account.favorite_count.to_firestore_value(),
        );
        fields.insert("updated_at".to_string(), Utc::now().to_firestore_value());

        let mask = vec![
            "credits".to_string(),
            "credits_used".to_string(),
            "total_generations".to_string(),
            "favorite_count".to_string(),
            "updated_at".to_string(),
        ];

        let mut writes = Vec::with_capacity(1 + self.extra_writes.len());
        writes.push(Write::update(
            account_name,
            fields,
            mask,
            Precondition::update_time(self.update_time),
        ));
        writes.extend(self.extra_writes);
        writes
    }
}

// =============================================================================
// Ledger
// =============================================================================

/// Credit ledger bound to one account.
pub struct AccountLedger {
    client: FirestoreClient,
    uid: String,
}

impl AccountLedger {
    /// Create a ledger for an account.
    pub fn new(client: FirestoreClient, uid: impl Into<String>) -> Self {
        Self {
            client,
            uid: uid.into(),
        }
    }

    /// The account this ledger operates on.
    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Read the account record, if it exists.
    pub async fn get_record(&self) -> LedgerResult<Option<AccountRecord>> {
        Ok(self.fetch().await?.map(|(record, _)| record))
    }

    /// Read-committed snapshot of the credit counters.
    pub async fn get_stats(&self) -> LedgerResult<Option<AccountStats>> {
        Ok(self.fetch().await?.map(|(record, _)| record.stats()))
    }

    /// Create the account document. Fails with `AlreadyExists` when the
    /// account was created concurrently; callers treat that as success.
    pub async fn create_account(&self, record: &AccountRecord) -> LedgerResult<()> {
        self.client
            .create_document(ACCOUNTS_COLLECTION, &self.uid, account_to_fields(record))
            .await?;
        info!(uid = %self.uid, credits = record.credits, "Created account");
        Ok(())
    }

    /// Open a transaction on the current account snapshot.
    pub async fn begin(&self) -> LedgerResult<LedgerTransaction> {
        let (record, update_time) = self
            .fetch()
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(self.uid.clone()))?;
        Ok(LedgerTransaction::new(
            self.client.document_root(),
            record,
            update_time,
        ))
    }

    /// Atomically apply a staged transaction.
    ///
    /// Fails with a conflict (see [`LedgerError::is_conflict`]) when a
    /// concurrent writer updated the account since `begin`.
    pub async fn commit(&self, tx: LedgerTransaction) -> LedgerResult<()> {
        self.client.commit(tx.into_writes()).await?;
        Ok(())
    }

    /// Run a staging closure as an optimistic transaction, retrying on
    /// commit conflicts with a fresh snapshot each attempt.
    ///
    /// The closure is pure staging: a business error (e.g.
    /// `InsufficientCredits`) aborts immediately with zero writes issued.
    pub async fn transact<T, F>(&self, operation: &str, stage: F) -> LedgerResult<T>
    where
        F: Fn(&mut LedgerTransaction) -> LedgerResult<T>,
    {
        with_conflict_retry(&self.uid, operation, || async {
            let mut tx = self.begin().await?;
            let value = stage(&mut tx)?;
            self.commit(tx).await?;
            Ok(value)
        })
        .await
    }

    /// Atomic conditional debit: decrement `credits` and increment
    /// `credits_used` as one unit, or fail with `InsufficientCredits`
    /// leaving the balance unchanged.
    pub async fn debit(&self, amount: u32) -> LedgerResult<DebitReceipt> {
        let receipt = self
            .transact("debit", |tx| {
                let new_balance = tx.debit(amount)?;
                Ok(DebitReceipt {
                    new_balance,
                    credits_used: tx.stats().credits_used,
                })
            })
            .await?;
        info!(
            uid = %self.uid,
            amount,
            new_balance = receipt.new_balance,
            "Debited credits"
        );
        Ok(receipt)
    }

    /// Unconditionally add credits (purchases, refunds, admin grants).
    /// Returns the new balance.
    pub async fn credit(&self, amount: u32) -> LedgerResult<u32> {
        let new_balance = self.transact("credit", |tx| Ok(tx.credit(amount))).await?;
        info!(uid = %self.uid, amount, new_balance, "Credited account");
        Ok(new_balance)
    }

    /// Increment the lifetime generation count by exactly one.
    ///
    /// Not idempotent on its own; at-most-once per generation is the
    /// orchestrator's responsibility (it stages this inside the same commit
    /// as the debit).
    pub async fn increment_generation_count(&self) -> LedgerResult<u32> {
        self.transact("increment_generation_count", |tx| Ok(tx.count_generation()))
            .await
    }

    /// Adjust the favorite counter (gallery collaborator). Never touches
    /// `credits`, `credits_used` or `total_generations`.
    pub async fn adjust_favorite_count(&self, delta: i64) -> LedgerResult<u32> {
        self.transact("adjust_favorite_count", |tx| Ok(tx.adjust_favorites(delta)))
            .await
    }

    async fn fetch(&self) -> LedgerResult<Option<(AccountRecord, String)>> {
        let doc = self
            .client
            .get_document(ACCOUNTS_COLLECTION, &self.uid)
            .await?;

        match doc {
            Some(d) => {
                let update_time = d.update_time.clone().ok_or_else(|| {
                    FirestoreError::invalid_response(format!(
                        "Account {} has no updateTime",
                        self.uid
                    ))
                })?;
                let record = document_to_account(&d, &self.uid)?;
                Ok(Some((record, update_time)))
            }
            None => Ok(None),
        }
    }
}

/// Retry loop for optimistic-transaction conflicts.
///
/// Each attempt must re-read its inputs; only commit conflicts are retried,
/// everything else propagates immediately.
pub async fn with_conflict_retry<T, F, Fut>(
    uid: &str,
    operation: &str,
    run: F,
) -> LedgerResult<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = LedgerResult<T>>,
{
    let mut last_conflict = None;

    for attempt in 0..MAX_COMMIT_ATTEMPTS {
        match run().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_conflict() => {
                debug!(
                    uid = %uid,
                    operation = %operation,
                    attempt = attempt + 1,
                    "Ledger commit conflicted, retrying"
                );
                record_ledger_conflict(operation);
                last_conflict = Some(e);

                if attempt + 1 < MAX_COMMIT_ATTEMPTS {
                    let delay = CONFLICT_BASE_DELAY_MS * (attempt as u64 + 1);
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
            }
            Err(e) => return Err(e),
        }
    }

    warn!(
        uid = %uid,
        operation = %operation,
        attempts = MAX_COMMIT_ATTEMPTS,
        error = ?last_conflict,
        "Ledger operation failed after conflict retries"
    );
    Err(LedgerError::Contention {
        attempts: MAX_COMMIT_ATTEMPTS,
    })
}

// =============================================================================
// Field mapping
// =============================================================================

fn account_to_fields(account: &AccountRecord) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert("uid".to_string(), account.uid.to_firestore_value());
    if let Some(ref email) = account.email {
        fields.insert("email".to_string(), email.to_firestore_value());
    }
    fields.insert(
        "platform_role".to_string(),
        account.platform_role.as_str().to_firestore_value(),
    );
    fields.insert("credits".to_string(), account.credits.to_firestore_value());
    fields.insert(
        "credits_used".to_string(),
        account.credits_used.to_firestore_value(),
    );
    fields.insert(
        "total_generations".to_string(),
        account.total_generations.to_firestore_value(),
    );
    fields.insert(
        "favorite_count".to_string(),
        account.favorite_count.to_firestore_value(),
    );
    fields.insert(
        "created_at".to_string(),
        account.created_at.to_firestore_value(),
    );
    fields.insert(
        "updated_at".to_string(),
        account.updated_at.to_firestore_value(),
    );
    fields
}

fn document_to_account(doc: &Document, uid: &str) -> FirestoreResult<AccountRecord> {
    let fields = doc.fields.as_ref().ok_or_else(|| {
        FirestoreError::invalid_response(format!("Account {} has no fields", uid))
    })?;

    let get_string =
        |key: &str| -> Option<String> { fields.get(key).and_then(String::from_firestore_value) };
    let get_u32 = |key: &str| -> u32 {
        fields
            .get(key)
            .and_then(u32::from_firestore_value)
            .unwrap_or(0)
    };

    Ok(AccountRecord {
        uid: get_string("uid").unwrap_or_else(|| uid.to_string()),
        email: get_string("email"),
        platform_role: get_string("platform_role")
            .map(|s| PlatformRole::from_str_lossy(&s))
            .unwrap_or_default(),
        credits: get_u32("credits"),
        credits_used: get_u32("credits_used"),
        total_generations: get_u32("total_generations"),
        favorite_count: get_u32("favorite_count"),
        created_at: fields
            .get("created_at")
            .and_then(chrono::DateTime::from_firestore_value)
            .unwrap_or_else(Utc::now),
        updated_at: fields
            .get("updated_at")
            .and_then(chrono::DateTime::from_firestore_value)
            .unwrap_or_else(Utc::now),
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const DOC_ROOT: &str = "projects/test/databases/(default)/documents";
    const UPDATE_TIME: &str = "2025-06-01T12:00:00.000000Z";

    fn account_with_credits(credits: u32) -> AccountRecord {
        let mut account = AccountRecord::new("user-1", None);
        account.credits = credits;
        account
    }

    fn tx_with_credits(credits: u32) -> LedgerTransaction {
        LedgerTransaction::new(DOC_ROOT, account_with_credits(credits), UPDATE_TIME)
    }

    #[test]
    fn test_debit_moves_balance_into_usage() {
        let mut tx = tx_with_credits(50);
        assert_eq!(tx.snapshot_update_time(), UPDATE_TIME);
        let new_balance = tx.debit(3).unwrap();
        assert_eq!(new_balance, 47);
        assert_eq!(tx.credits(), 47);
        assert_eq!(tx.stats().credits_used, 3);
    }

    #[test]
    fn test_debit_insufficient_is_side_effect_free() {
        let mut tx = tx_with_credits(2);
        let err = tx.debit(5).unwrap_err();
        match err {
            LedgerError::InsufficientCredits {
                requested,
                available,
            } => {
                assert_eq!(requested, 5);
                assert_eq!(available, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
        // Nothing staged, nothing changed.
        assert_eq!(tx.stats().credits, 2);
        assert_eq!(tx.stats().credits_used, 0);
    }

    #[test]
    fn test_debit_zero_is_invalid() {
        let mut tx = tx_with_credits(10);
        assert!(matches!(tx.debit(0), Err(LedgerError::InvalidAmount(0))));
        assert_eq!(tx.stats().credits, 10);
    }

    #[test]
    fn test_last_credit_can_be_spent_once() {
        let mut tx = tx_with_credits(1);
        assert_eq!(tx.debit(1).unwrap(), 0);
        assert!(tx.debit(1).unwrap_err().is_insufficient_credits());
        assert_eq!(tx.stats().credits, 0);
        assert_eq!(tx.stats().credits_used, 1);
    }

    #[test]
    fn test_compound_staging_is_one_guarded_commit() {
        let mut tx = tx_with_credits(10);
        tx.debit(1).unwrap();
        tx.count_generation();
        tx.stage_create(
            "accounts/user-1/generations",
            "gen-1",
            HashMap::from([("owner_id".to_string(), "user-1".to_firestore_value())]),
        );

        let writes = tx.into_writes();
        assert_eq!(writes.len(), 2);

        // The account write leads and is preconditioned on the snapshot.
        let account_write = &writes[0];
        let precondition = account_write.current_document.as_ref().unwrap();
        assert_eq!(precondition.update_time.as_deref(), Some(UPDATE_TIME));

        let fields = account_write
            .update
            .as_ref()
            .unwrap()
            .fields
            .as_ref()
            .unwrap();
        assert!(matches!(&fields["credits"], Value::IntegerValue(s) if s == "9"));
        assert!(matches!(&fields["credits_used"], Value::IntegerValue(s) if s == "1"));
        assert!(matches!(&fields["total_generations"], Value::IntegerValue(s) if s == "1"));

        let mask = &account_write.update_mask.as_ref().unwrap().field_paths;
        for field in ["credits", "credits_used", "total_generations", "favorite_count"] {
            assert!(mask.iter().any(|f| f == field), "mask missing {field}");
        }

        // The generation create rides the same commit and must not exist yet.
        let create = &writes[1];
        assert_eq!(
            create.current_document.as_ref().unwrap().exists,
            Some(false)
        );
        assert!(create
            .update
            .as_ref()
            .unwrap()
            .name
            .as_deref()
            .unwrap()
            .ends_with("accounts/user-1/generations/gen-1"));
    }

    #[test]
    fn test_failed_staging_leaves_no_writes_to_commit() {
        let mut tx = tx_with_credits(0);
        assert!(tx.debit(1).is_err());
        // The transaction would still commit only the untouched account
        // anchor; counters carry their original values.
        let writes = tx.into_writes();
        let fields = writes[0].update.as_ref().unwrap().fields.as_ref().unwrap();
        assert!(matches!(&fields["credits"], Value::IntegerValue(s) if s == "0"));
        assert!(matches!(&fields["credits_used"], Value::IntegerValue(s) if s == "0"));
    }

    #[test]
    fn test_credit_is_unconditional_and_saturating() {
        let mut tx = tx_with_credits(u32::MAX - 1);
        assert_eq!(tx.credit(10), u32::MAX);
    }

    #[test]
    fn test_favorites_clamp_at_zero() {
        let mut tx = tx_with_credits(5);
        assert_eq!(tx.adjust_favorites(-3), 0);
        assert_eq!(tx.adjust_favorites(2), 2);
        assert_eq!(tx.adjust_favorites(-1), 1);
    }

    #[test]
    fn test_stage_delete_produces_delete_write() {
        let mut tx = tx_with_credits(5);
        tx.stage_delete("accounts/user-1/generations", "gen-9");
        let writes = tx.into_writes();
        assert_eq!(writes.len(), 2);
        assert!(writes[1]
            .delete
            .as_deref()
            .unwrap()
            .ends_with("generations/gen-9"));
    }

    #[tokio::test]
    async fn test_conflict_retry_gives_up_with_contention() {
        let result: LedgerResult<()> = with_conflict_retry("user-1", "test", || async {
            Err(LedgerError::Store(FirestoreError::PreconditionFailed(
                "stale".into(),
            )))
        })
        .await;
        assert!(matches!(
            result,
            Err(LedgerError::Contention {
                attempts: MAX_COMMIT_ATTEMPTS
            })
        ));
    }

    #[tokio::test]
    async fn test_business_errors_are_not_retried() {
        let calls = std::sync::atomic::AtomicU32::new(0);
        let result: LedgerResult<()> = with_conflict_retry("user-1", "test", || {
            calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            async {
                Err(LedgerError::InsufficientCredits {
                    requested: 1,
                    available: 0,
                })
            }
        })
        .await;
        assert!(result.unwrap_err().is_insufficient_credits());
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
