//! Generation records.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::style::{GenerationCategory, PlushieStyle};

/// Unique identifier for a recorded generation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct GenerationId(pub String);

impl GenerationId {
    /// Generate a new random generation ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for GenerationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GenerationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for GenerationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for GenerationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Optional details captured at generation time.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct GenerationMetadata {
    /// Source image size in bytes, as reported by the uploader.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_size_bytes: Option<u64>,

    /// Wall-clock seconds the external generation took.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_secs: Option<f64>,
}

impl GenerationMetadata {
    pub fn is_empty(&self) -> bool {
        self.source_size_bytes.is_none() && self.processing_time_secs.is_none()
    }
}

/// A completed photo-to-plushie transformation.
///
/// Created exactly once, atomically with the credit debit that paid for it.
/// Only `is_favorite` is mutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Generation {
    /// Unique generation ID.
    pub id: GenerationId,

    /// Owning account.
    pub owner_id: String,

    /// Rendering style.
    pub style: PlushieStyle,

    /// Subject category.
    pub category: GenerationCategory,

    /// Storage reference to the uploaded source photo.
    pub source_image_url: String,

    /// Storage reference to the generated plushie image.
    pub result_image_url: String,

    /// Whether the owner marked this generation a favorite.
    #[serde(default)]
    pub is_favorite: bool,

    /// Credits debited for this generation.
    pub credits_spent: u32,

    /// Immutable creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Optional details captured at generation time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<GenerationMetadata>,
}

/// Input for recording a new generation.
///
/// The external AI service has already produced `result_image_url` by the
/// time this is submitted; recording only persists the outcome.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct NewGeneration {
    pub style: PlushieStyle,
    pub category: GenerationCategory,
    pub source_image_url: String,
    pub result_image_url: String,
    #[serde(default)]
    pub metadata: Option<GenerationMetadata>,
}

impl Generation {
    /// Materialize a generation record from its input, minting the id and
    /// timestamp.
    pub fn from_new(owner_id: impl Into<String>, new: NewGeneration, credits_spent: u32) -> Self {
        Self {
            id: GenerationId::new(),
            owner_id: owner_id.into(),
            style: new.style,
            category: new.category,
            source_image_url: new.source_image_url,
            result_image_url: new.result_image_url,
            is_favorite: false,
            credits_spent,
            created_at: Utc::now(),
            metadata: new.metadata.filter(|m| !m.is_empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_input() -> NewGeneration {
        NewGeneration {
            style: PlushieStyle::Kawaii,
            category: GenerationCategory::Pets,
            source_image_url: "accounts/u1/source/abc.jpg".into(),
            result_image_url: "accounts/u1/plushie/abc.png".into(),
            metadata: None,
        }
    }

    #[test]
    fn test_from_new_mints_identity() {
        let a = Generation::from_new("u1", sample_input(), 1);
        let b = Generation::from_new("u1", sample_input(), 1);
        assert_ne!(a.id, b.id);
        assert_eq!(a.owner_id, "u1");
        assert_eq!(a.credits_spent, 1);
        assert!(!a.is_favorite);
    }

    #[test]
    fn test_empty_metadata_is_dropped() {
        let mut input = sample_input();
        input.metadata = Some(GenerationMetadata::default());
        let generation = Generation::from_new("u1", input, 1);
        assert!(generation.metadata.is_none());
    }

    #[test]
    fn test_generation_id_display() {
        let id = GenerationId::from_string("gen-123");
        assert_eq!(id.to_string(), "gen-123");
        assert_eq!(id.as_str(), "gen-123");
    }
}
