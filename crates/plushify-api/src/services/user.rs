//! Account provisioning and role checks.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use plushify_firestore::{
    AccountLedger, FirestoreClient, FirestoreError, LedgerError, ToFirestoreValue,
    ACCOUNTS_COLLECTION,
};
use plushify_models::AccountRecord;

use crate::error::{ApiError, ApiResult};

/// Service for account records.
#[derive(Clone)]
pub struct UserService {
    firestore: Arc<FirestoreClient>,
}

impl UserService {
    /// Create a new user service.
    pub fn new(firestore: Arc<FirestoreClient>) -> Self {
        Self { firestore }
    }

    /// Ledger bound to one account.
    pub fn ledger(&self, uid: &str) -> AccountLedger {
        AccountLedger::new((*self.firestore).clone(), uid)
    }

    /// Get an account record, creating it with signup credits on first
    /// authenticated contact.
    pub async fn get_or_create_account(
        &self,
        uid: &str,
        email: Option<&str>,
    ) -> ApiResult<AccountRecord> {
        let ledger = self.ledger(uid);

        if let Some(mut record) = ledger.get_record().await? {
            // Keep the stored email in sync with the identity provider.
            if email.is_some() && record.email.as_deref() != email {
                record.email = email.map(String::from);
                record.updated_at = Utc::now();
                self.refresh_email(&record).await;
            }
            return Ok(record);
        }

        let record = AccountRecord::new(uid, email.map(String::from));
        match ledger.create_account(&record).await {
            Ok(()) => {
                info!(uid = %uid, "Provisioned account with signup credits");
                Ok(record)
            }
            Err(LedgerError::Store(FirestoreError::AlreadyExists(_))) => {
                // Lost a creation race; the concurrent writer's record wins.
                ledger
                    .get_record()
                    .await?
                    .ok_or_else(|| ApiError::internal("Account missing after creation race"))
            }
            Err(e) => {
                warn!(uid = %uid, error = %e, "Failed to provision account");
                Err(e.into())
            }
        }
    }

    /// Best-effort email sync; a failure only delays the refresh.
    async fn refresh_email(&self, record: &AccountRecord) {
        let mut fields = HashMap::new();
        fields.insert("email".to_string(), record.email.to_firestore_value());
        fields.insert(
            "updated_at".to_string(),
            record.updated_at.to_firestore_value(),
        );

        if let Err(e) = self
            .firestore
            .update_document(
                ACCOUNTS_COLLECTION,
                &record.uid,
                fields,
                vec!["email".to_string(), "updated_at".to_string()],
            )
            .await
        {
            warn!(uid = %record.uid, error = %e, "Failed to refresh account email");
        }
    }

    /// Fail with `Forbidden` unless the account has the admin role.
    pub async fn require_admin(&self, uid: &str) -> ApiResult<()> {
        let record = self
            .ledger(uid)
            .get_record()
            .await?
            .ok_or_else(|| ApiError::forbidden("Admin access required"))?;

        if !record.is_admin() {
            return Err(ApiError::forbidden("Admin access required"));
        }
        Ok(())
    }
}
