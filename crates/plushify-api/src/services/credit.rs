//! Credit stats, history and fulfillment flows.
//!
//! Purchases and grants add credits; payment processing itself happens in
//! an external collaborator. Every balance change stages its history
//! record into the same atomic commit.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use plushify_firestore::{
    credit_transaction_to_fields, credit_transactions_collection, AccountLedger,
    CreditTransactionRepository, FirestoreClient,
};
use plushify_models::{AccountStats, CreditOperationType, CreditPack, CreditTransaction};

use crate::error::{ApiError, ApiResult};
use crate::metrics;

/// Service for credit operations outside the generation flow.
#[derive(Clone)]
pub struct CreditService {
    firestore: Arc<FirestoreClient>,
}

impl CreditService {
    /// Create a new credit service.
    pub fn new(firestore: Arc<FirestoreClient>) -> Self {
        Self { firestore }
    }

    fn ledger(&self, uid: &str) -> AccountLedger {
        AccountLedger::new((*self.firestore).clone(), uid)
    }

    fn history_repo(&self, uid: &str) -> CreditTransactionRepository {
        CreditTransactionRepository::new((*self.firestore).clone(), uid)
    }

    /// Read-committed snapshot of the account's credit counters.
    pub async fn stats(&self, uid: &str) -> ApiResult<Option<AccountStats>> {
        Ok(self.ledger(uid).get_stats().await?)
    }

    /// Paginated credit transaction history, newest first.
    pub async fn history(
        &self,
        uid: &str,
        limit: Option<u32>,
        cursor: Option<&str>,
        operation_type: Option<CreditOperationType>,
    ) -> ApiResult<(Vec<CreditTransaction>, Option<String>)> {
        Ok(self
            .history_repo(uid)
            .list_page(limit, cursor, operation_type)
            .await?)
    }

    /// Fulfill a completed pack purchase. Returns the new balance.
    pub async fn purchase(&self, uid: &str, pack: CreditPack) -> ApiResult<u32> {
        let new_balance = self
            .apply_credit(
                uid,
                pack.credits(),
                CreditOperationType::Purchase,
                format!("Credit pack purchase ({})", pack),
                "purchase",
            )
            .await?;

        info!(
            uid = %uid,
            pack = %pack,
            credits = pack.credits(),
            new_balance,
            "Fulfilled credit pack purchase"
        );
        Ok(new_balance)
    }

    /// Admin grant or refund. Returns the new balance.
    pub async fn grant(
        &self,
        uid: &str,
        amount: u32,
        reason: Option<&str>,
        granted_by: &str,
    ) -> ApiResult<u32> {
        if amount == 0 {
            return Err(ApiError::bad_request("Invalid credit amount"));
        }

        let description = match reason {
            Some(reason) => format!("Admin adjustment: {}", reason),
            None => "Admin adjustment".to_string(),
        };

        let new_balance = self
            .apply_credit(
                uid,
                amount,
                CreditOperationType::AdminAdjustment,
                description,
                "admin_adjustment",
            )
            .await?;

        info!(
            uid = %uid,
            amount,
            new_balance,
            granted_by = %granted_by,
            "Granted credits"
        );
        Ok(new_balance)
    }

    /// Credit the account and stage the history record in one commit.
    async fn apply_credit(
        &self,
        uid: &str,
        amount: u32,
        operation_type: CreditOperationType,
        description: String,
        metric_label: &str,
    ) -> ApiResult<u32> {
        let ledger = self.ledger(uid);
        let history_collection = credit_transactions_collection(uid);

        let new_balance = ledger
            .transact("apply_credit", |tx| {
                let new_balance = tx.credit(amount);

                let history = CreditTransaction::new(
                    Uuid::new_v4().to_string(),
                    uid.to_string(),
                    operation_type,
                    amount,
                    description.clone(),
                    new_balance,
                );
                tx.stage_create(
                    &history_collection,
                    &history.id,
                    credit_transaction_to_fields(&history),
                );

                Ok(new_balance)
            })
            .await?;

        metrics::record_credits_granted(amount, metric_label);
        Ok(new_balance)
    }
}
