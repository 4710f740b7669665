//! Shared data models for the Plushify backend.
//!
//! This crate provides Serde-serializable types for:
//! - Plushie styles, categories and gallery filters
//! - Account records and credit stats
//! - Generation records
//! - Credit packs and credit transaction history

pub mod account;
pub mod credit_pack;
pub mod credit_transaction;
pub mod generation;
pub mod style;

// Re-export common types
pub use account::{
    AccountRecord, AccountStats, PlatformRole, MAX_CREDITS_PER_OPERATION, SIGNUP_CREDITS,
};
pub use credit_pack::CreditPack;
pub use credit_transaction::{CreditOperationType, CreditTransaction};
pub use generation::{Generation, GenerationId, GenerationMetadata, NewGeneration};
pub use style::{GalleryFilter, GenerationCategory, PlushieStyle};
