//! Generation orchestration: spend credits, record the result.
//!
//! `record_generation` is the one place where a user is charged. It
//! composes validation and a single atomic ledger commit so that a user is
//! never debited without a recorded generation and never gets a recorded
//! generation without being debited. The external AI call is the caller's
//! collaborator: credits are spent only after it has already produced a
//! result reference.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;

use plushify_firestore::{
    credit_transaction_to_fields, credit_transactions_collection, generation_to_fields,
    generations_collection, ledger::with_conflict_retry, AccountLedger, FirestoreClient,
    GenerationRepository, LedgerError, ToFirestoreValue,
};
use plushify_models::{
    CreditOperationType, CreditTransaction, GalleryFilter, Generation, GenerationId,
    NewGeneration, MAX_CREDITS_PER_OPERATION,
};
use plushify_storage::{key_belongs_to, R2Client};

use crate::error::{ApiError, ApiResult};
use crate::metrics;

/// Validate a caller-supplied debit amount before any storage access.
///
/// Non-integers never get here: the request type is integral, so `3.5`
/// fails JSON deserialization without side effects.
pub fn validate_credits_to_spend(amount: u32) -> ApiResult<()> {
    if amount == 0 {
        return Err(ApiError::bad_request("Invalid credit amount"));
    }
    if amount > MAX_CREDITS_PER_OPERATION {
        return Err(ApiError::bad_request("Credit amount exceeds maximum allowed"));
    }
    Ok(())
}

/// Outcome of a successful record-generation call.
#[derive(Debug, Clone)]
pub struct RecordedGeneration {
    pub generation: Generation,
    pub new_balance: u32,
}

/// Presentable image URLs for one generation.
#[derive(Debug, Clone)]
pub struct GenerationImageUrls {
    pub source_url: String,
    pub result_url: String,
}

/// Service orchestrating generation recording and gallery operations.
#[derive(Clone)]
pub struct GenerationService {
    firestore: Arc<FirestoreClient>,
    storage: Arc<R2Client>,
}

impl GenerationService {
    /// Create a new generation service.
    pub fn new(firestore: Arc<FirestoreClient>, storage: Arc<R2Client>) -> Self {
        Self { firestore, storage }
    }

    fn ledger(&self, uid: &str) -> AccountLedger {
        AccountLedger::new((*self.firestore).clone(), uid)
    }

    fn repo(&self, uid: &str) -> GenerationRepository {
        GenerationRepository::new((*self.firestore).clone(), uid)
    }

    /// Record one paid-for generation.
    ///
    /// Debit, generation count, the generation record and the credit
    /// history record commit as one atomic unit; any failure leaves the
    /// account untouched.
    pub async fn record_generation(
        &self,
        uid: &str,
        credits_to_spend: u32,
        input: NewGeneration,
    ) -> ApiResult<RecordedGeneration> {
        validate_credits_to_spend(credits_to_spend)?;

        let generation = Generation::from_new(uid, input, credits_to_spend);
        let gen_collection = generations_collection(uid);
        let history_collection = credit_transactions_collection(uid);
        let ledger = self.ledger(uid);

        let result = ledger
            .transact("record_generation", |tx| {
                let new_balance = tx.debit(credits_to_spend)?;
                tx.count_generation();

                tx.stage_create(
                    &gen_collection,
                    generation.id.as_str(),
                    generation_to_fields(&generation),
                );

                let history = CreditTransaction::new(
                    Uuid::new_v4().to_string(),
                    uid.to_string(),
                    CreditOperationType::Generation,
                    credits_to_spend,
                    format!("Plushie generation ({})", generation.style),
                    new_balance,
                )
                .with_generation_id(generation.id.clone());
                tx.stage_create(
                    &history_collection,
                    &history.id,
                    credit_transaction_to_fields(&history),
                );

                Ok(new_balance)
            })
            .await;

        match result {
            Ok(new_balance) => {
                info!(
                    uid = %uid,
                    amount = credits_to_spend,
                    new_balance,
                    generation_id = %generation.id,
                    style = %generation.style,
                    "Recorded generation"
                );
                metrics::record_generation_recorded(generation.style.as_str());
                metrics::record_credits_debited(credits_to_spend);
                Ok(RecordedGeneration {
                    generation,
                    new_balance,
                })
            }
            Err(e) => {
                if e.is_insufficient_credits() {
                    info!(uid = %uid, amount = credits_to_spend, "Insufficient credits");
                    metrics::record_insufficient_credits();
                } else {
                    warn!(
                        uid = %uid,
                        amount = credits_to_spend,
                        error = %e,
                        "Failed to record generation"
                    );
                }
                Err(e.into())
            }
        }
    }

    /// List the gallery, newest first.
    pub async fn list_gallery(
        &self,
        uid: &str,
        filter: GalleryFilter,
        limit: Option<u32>,
        cursor: Option<&str>,
    ) -> ApiResult<(Vec<Generation>, Option<String>)> {
        Ok(self.repo(uid).list_page(filter, limit, cursor).await?)
    }

    /// Short-lived signed URLs for one generation's images.
    ///
    /// References outside this account's storage prefix (e.g. an external
    /// result URL) are passed through unsigned.
    pub async fn image_urls(
        &self,
        uid: &str,
        id: &GenerationId,
        expiry: Duration,
    ) -> ApiResult<GenerationImageUrls> {
        let generation = self
            .repo(uid)
            .get(id)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("Generation {} not found", id)))?;

        Ok(GenerationImageUrls {
            source_url: self
                .presentable_url(uid, &generation.source_image_url, expiry)
                .await?,
            result_url: self
                .presentable_url(uid, &generation.result_image_url, expiry)
                .await?,
        })
    }

    async fn presentable_url(
        &self,
        uid: &str,
        image_ref: &str,
        expiry: Duration,
    ) -> ApiResult<String> {
        if key_belongs_to(image_ref, uid) {
            Ok(self.storage.presign_get(image_ref, expiry).await?)
        } else {
            Ok(image_ref.to_string())
        }
    }

    /// Toggle the favorite flag; the account's `favorite_count` moves in
    /// the same atomic commit as the flag.
    pub async fn toggle_favorite(&self, uid: &str, id: &GenerationId) -> ApiResult<Generation> {
        let ledger = self.ledger(uid);
        let repo = self.repo(uid);
        let collection = generations_collection(uid);

        let updated = with_conflict_retry(uid, "toggle_favorite", || async {
            let mut tx = ledger.begin().await?;

            let Some(mut generation) = repo.get(id).await.map_err(LedgerError::from)? else {
                return Ok(None);
            };

            let now_favorite = !generation.is_favorite;
            tx.adjust_favorites(if now_favorite { 1 } else { -1 });

            let mut fields = HashMap::new();
            fields.insert("is_favorite".to_string(), now_favorite.to_firestore_value());
            tx.stage_update(
                &collection,
                id.as_str(),
                fields,
                vec!["is_favorite".to_string()],
            );

            ledger.commit(tx).await?;
            generation.is_favorite = now_favorite;
            Ok(Some(generation))
        })
        .await?;

        updated.ok_or_else(|| ApiError::not_found(format!("Generation {} not found", id)))
    }

    /// Delete a generation.
    ///
    /// `credits_used` and `total_generations` are historical counters and
    /// stay untouched; only `favorite_count` is adjusted when the deleted
    /// record was a favorite. Stored images are cleaned up best-effort
    /// after the commit.
    pub async fn delete_generation(&self, uid: &str, id: &GenerationId) -> ApiResult<()> {
        let ledger = self.ledger(uid);
        let repo = self.repo(uid);
        let collection = generations_collection(uid);

        let deleted = with_conflict_retry(uid, "delete_generation", || async {
            let mut tx = ledger.begin().await?;

            let Some(generation) = repo.get(id).await.map_err(LedgerError::from)? else {
                return Ok(None);
            };

            if generation.is_favorite {
                tx.adjust_favorites(-1);
            }
            tx.stage_delete(&collection, id.as_str());

            ledger.commit(tx).await?;
            Ok(Some(generation))
        })
        .await?;

        let generation =
            deleted.ok_or_else(|| ApiError::not_found(format!("Generation {} not found", id)))?;

        for image_ref in [&generation.source_image_url, &generation.result_image_url] {
            if key_belongs_to(image_ref, uid) {
                if let Err(e) = self.storage.delete_object(image_ref).await {
                    warn!(
                        uid = %uid,
                        key = %image_ref,
                        error = %e,
                        "Failed to delete stored image"
                    );
                }
            }
        }

        info!(uid = %uid, generation_id = %id, "Deleted generation");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_credits_rejected() {
        let err = validate_credits_to_spend(0).unwrap_err();
        assert_eq!(err.to_string(), "Bad request: Invalid credit amount");
    }

    #[test]
    fn test_over_cap_rejected() {
        let err = validate_credits_to_spend(MAX_CREDITS_PER_OPERATION + 1).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Bad request: Credit amount exceeds maximum allowed"
        );
        assert!(validate_credits_to_spend(150).is_err());
    }

    #[test]
    fn test_valid_range_accepted() {
        assert!(validate_credits_to_spend(1).is_ok());
        assert!(validate_credits_to_spend(MAX_CREDITS_PER_OPERATION).is_ok());
    }
}
