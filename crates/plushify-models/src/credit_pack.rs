//! Purchasable credit packs.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Purchasable credit pack tiers.
///
/// Payment processing happens in an external collaborator; the backend only
/// fulfills a completed purchase by crediting the pack amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum CreditPack {
    Basic,
    Pro,
    Elite,
}

impl CreditPack {
    pub const ALL: &'static [CreditPack] = &[CreditPack::Basic, CreditPack::Pro, CreditPack::Elite];

    /// Credits granted by this pack.
    pub fn credits(&self) -> u32 {
        match self {
            CreditPack::Basic => 30,
            CreditPack::Pro => 100,
            CreditPack::Elite => 200,
        }
    }

    /// List price in US cents.
    pub fn price_cents(&self) -> u32 {
        match self {
            CreditPack::Basic => 900,
            CreditPack::Pro => 1900,
            CreditPack::Elite => 2900,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CreditPack::Basic => "basic",
            CreditPack::Pro => "pro",
            CreditPack::Elite => "elite",
        }
    }
}

impl fmt::Display for CreditPack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CreditPack {
    type Err = CreditPackParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "basic" => Ok(CreditPack::Basic),
            "pro" => Ok(CreditPack::Pro),
            "elite" => Ok(CreditPack::Elite),
            _ => Err(CreditPackParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown credit pack: {0}")]
pub struct CreditPackParseError(String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_credits() {
        assert_eq!(CreditPack::Basic.credits(), 30);
        assert_eq!(CreditPack::Pro.credits(), 100);
        assert_eq!(CreditPack::Elite.credits(), 200);
    }

    #[test]
    fn test_pack_parse() {
        assert_eq!("pro".parse::<CreditPack>().unwrap(), CreditPack::Pro);
        assert_eq!("ELITE".parse::<CreditPack>().unwrap(), CreditPack::Elite);
        assert!("mega".parse::<CreditPack>().is_err());
    }

    #[test]
    fn test_larger_packs_cost_more() {
        assert!(CreditPack::Basic.price_cents() < CreditPack::Pro.price_cents());
        assert!(CreditPack::Pro.price_cents() < CreditPack::Elite.price_cents());
    }
}
