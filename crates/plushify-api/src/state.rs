//! Application state.

use std::sync::Arc;

use anyhow::Context;

use plushify_firestore::FirestoreClient;
use plushify_storage::R2Client;

use crate::config::ApiConfig;
use crate::services::{CreditService, GenerationService, UserService};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub storage: Arc<R2Client>,
    pub firestore: Arc<FirestoreClient>,
    pub user_service: UserService,
    pub generation_service: GenerationService,
    pub credit_service: CreditService,
}

impl AppState {
    /// Create new application state.
    pub async fn new(config: ApiConfig) -> anyhow::Result<Self> {
        let storage = Arc::new(
            R2Client::from_env()
                .await
                .context("initialize R2 storage client")?,
        );
        let firestore = Arc::new(
            FirestoreClient::from_env()
                .await
                .context("initialize Firestore client")?,
        );

        let user_service = UserService::new(Arc::clone(&firestore));
        let generation_service =
            GenerationService::new(Arc::clone(&firestore), Arc::clone(&storage));
        let credit_service = CreditService::new(Arc::clone(&firestore));

        Ok(Self {
            config,
            storage,
            firestore,
            user_service,
            generation_service,
            credit_service,
        })
    }
}
