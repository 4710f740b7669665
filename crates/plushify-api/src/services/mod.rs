//! Business logic services.

pub mod credit;
pub mod generation;
pub mod user;

pub use credit::CreditService;
pub use generation::{validate_credits_to_spend, GenerationService, RecordedGeneration};
pub use user::UserService;
