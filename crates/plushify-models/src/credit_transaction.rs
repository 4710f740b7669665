//! Credit transaction history models.
//!
//! Every balance mutation writes a transaction record alongside it, so the
//! history always reconciles with the account counters.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::generation::GenerationId;

/// Type of credit operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CreditOperationType {
    /// Debit paying for one plushie generation
    Generation,
    /// Credit from a completed pack purchase
    Purchase,
    /// Credit returned to the user
    Refund,
    /// Manual admin grant or correction
    AdminAdjustment,
}

impl CreditOperationType {
    /// Returns the operation type as stored.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generation => "generation",
            Self::Purchase => "purchase",
            Self::Refund => "refund",
            Self::AdminAdjustment => "admin_adjustment",
        }
    }

    /// Returns a human-readable label for the operation type.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Generation => "Plushie Generation",
            Self::Purchase => "Credit Purchase",
            Self::Refund => "Refund",
            Self::AdminAdjustment => "Admin Adjustment",
        }
    }

    /// Parse from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "generation" => Some(Self::Generation),
            "purchase" => Some(Self::Purchase),
            "refund" => Some(Self::Refund),
            "admin_adjustment" => Some(Self::AdminAdjustment),
            _ => None,
        }
    }

    /// Whether this operation removes credits from the balance.
    pub fn is_debit(&self) -> bool {
        matches!(self, Self::Generation)
    }
}

/// A credit transaction record.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CreditTransaction {
    /// Unique identifier for this transaction (UUID)
    pub id: String,

    /// Account whose balance changed
    pub user_id: String,

    /// When the transaction occurred
    pub timestamp: DateTime<Utc>,

    /// Type of operation
    pub operation_type: CreditOperationType,

    /// Number of credits moved (always positive; direction comes from the
    /// operation type)
    pub credits_amount: u32,

    /// Human-readable description
    pub description: String,

    /// Spendable balance after this transaction
    pub balance_after: u32,

    /// Associated generation (for `generation` debits)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_id: Option<GenerationId>,

    /// When the record was created (same as timestamp for new transactions)
    pub created_at: DateTime<Utc>,
}

impl CreditTransaction {
    /// Create a new credit transaction.
    pub fn new(
        id: String,
        user_id: String,
        operation_type: CreditOperationType,
        credits_amount: u32,
        description: String,
        balance_after: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id,
            timestamp: now,
            operation_type,
            credits_amount,
            description,
            balance_after,
            generation_id: None,
            created_at: now,
        }
    }

    /// Set the generation ID.
    pub fn with_generation_id(mut self, generation_id: GenerationId) -> Self {
        self.generation_id = Some(generation_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_type_roundtrip() {
        for op in [
            CreditOperationType::Generation,
            CreditOperationType::Purchase,
            CreditOperationType::Refund,
            CreditOperationType::AdminAdjustment,
        ] {
            assert_eq!(CreditOperationType::from_str(op.as_str()), Some(op));
        }
        assert_eq!(CreditOperationType::from_str("levitation"), None);
    }

    #[test]
    fn test_labels_are_human_readable() {
        assert_eq!(CreditOperationType::Generation.label(), "Plushie Generation");
        assert_eq!(CreditOperationType::Purchase.label(), "Credit Purchase");
    }

    #[test]
    fn test_only_generation_debits() {
        assert!(CreditOperationType::Generation.is_debit());
        assert!(!CreditOperationType::Purchase.is_debit());
        assert!(!CreditOperationType::Refund.is_debit());
        assert!(!CreditOperationType::AdminAdjustment.is_debit());
    }

    #[test]
    fn test_builder_attaches_generation() {
        let tx = CreditTransaction::new(
            "tx-1".into(),
            "u1".into(),
            CreditOperationType::Generation,
            1,
            "Plushie generation (kawaii)".into(),
            9,
        )
        .with_generation_id(GenerationId::from_string("gen-1"));

        assert_eq!(tx.generation_id.as_ref().unwrap().as_str(), "gen-1");
        assert_eq!(tx.balance_after, 9);
        assert_eq!(tx.timestamp, tx.created_at);
    }
}
