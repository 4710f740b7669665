//! Account records and credit counters.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Credits granted to a newly created account.
pub const SIGNUP_CREDITS: u32 = 10;

/// Upper bound on the credits a single operation may debit.
///
/// Caller-supplied amounts above this are rejected before any storage
/// access, bounding abuse from a single call.
pub const MAX_CREDITS_PER_OPERATION: u32 = 100;

/// Platform role of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlatformRole {
    #[default]
    User,
    Admin,
}

impl PlatformRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformRole::User => "user",
            PlatformRole::Admin => "admin",
        }
    }

    /// Parse from string, defaulting to `User` for unknown values.
    pub fn from_str_lossy(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "admin" => PlatformRole::Admin,
            _ => PlatformRole::User,
        }
    }
}

impl fmt::Display for PlatformRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Account document stored in Firestore.
///
/// The credit counters on this record are mutated exclusively through the
/// account ledger; no other code path writes them.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AccountRecord {
    /// Account id from the identity provider.
    pub uid: String,

    /// Email, if the identity provider supplied one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Platform role (`user` or `admin`).
    #[serde(default)]
    pub platform_role: PlatformRole,

    /// Spendable balance. Never negative.
    pub credits: u32,

    /// Lifetime total debited. Monotonically non-decreasing.
    pub credits_used: u32,

    /// Lifetime count of recorded generations.
    pub total_generations: u32,

    /// Count of generations currently marked favorite.
    pub favorite_count: u32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AccountRecord {
    /// Create a fresh account with signup credits.
    pub fn new(uid: impl Into<String>, email: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            uid: uid.into(),
            email,
            platform_role: PlatformRole::User,
            credits: SIGNUP_CREDITS,
            credits_used: 0,
            total_generations: 0,
            favorite_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Credit counters as a stats snapshot.
    pub fn stats(&self) -> AccountStats {
        AccountStats {
            credits: self.credits,
            total_generations: self.total_generations,
            credits_used: self.credits_used,
            favorite_count: self.favorite_count,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.platform_role == PlatformRole::Admin
    }
}

/// Read-only snapshot of an account's credit counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AccountStats {
    pub credits: u32,
    pub total_generations: u32,
    pub credits_used: u32,
    pub favorite_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_account_starts_with_signup_credits() {
        let account = AccountRecord::new("user-1", Some("a@example.com".into()));
        assert_eq!(account.credits, SIGNUP_CREDITS);
        assert_eq!(account.credits_used, 0);
        assert_eq!(account.total_generations, 0);
        assert_eq!(account.favorite_count, 0);
        assert_eq!(account.platform_role, PlatformRole::User);
        assert!(!account.is_admin());
    }

    #[test]
    fn test_stats_snapshot_mirrors_counters() {
        let mut account = AccountRecord::new("user-2", None);
        account.credits = 42;
        account.credits_used = 8;
        account.total_generations = 8;
        account.favorite_count = 3;

        let stats = account.stats();
        assert_eq!(stats.credits, 42);
        assert_eq!(stats.credits_used, 8);
        assert_eq!(stats.total_generations, 8);
        assert_eq!(stats.favorite_count, 3);
    }

    #[test]
    fn test_role_parse_is_lossy() {
        assert_eq!(PlatformRole::from_str_lossy("admin"), PlatformRole::Admin);
        assert_eq!(PlatformRole::from_str_lossy("ADMIN"), PlatformRole::Admin);
        assert_eq!(PlatformRole::from_str_lossy("moderator"), PlatformRole::User);
    }
}
