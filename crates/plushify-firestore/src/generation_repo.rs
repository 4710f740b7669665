//! Typed read access and field mapping for generation documents.
//!
//! This repository is read-only by design: every generation write (create,
//! favorite flag, delete) is staged into an account-ledger commit so that
//! the account counters and the generation documents move atomically.

use std::collections::HashMap;

use tracing::warn;

use plushify_models::{
    GalleryFilter, Generation, GenerationId, GenerationMetadata,
};

use crate::client::FirestoreClient;
use crate::error::{FirestoreError, FirestoreResult};
use crate::types::{
    CollectionSelector, Cursor, Filter, FieldReference, FromFirestoreValue, MapValue, Order,
    StructuredQuery, ToFirestoreValue, Value,
};

/// Default page size for gallery listings.
const DEFAULT_PAGE_SIZE: u32 = 50;

/// Maximum page size for gallery listings.
const MAX_PAGE_SIZE: u32 = 100;

/// Collection path for an account's generations.
pub fn generations_collection(uid: &str) -> String {
    format!("accounts/{}/generations", uid)
}

/// Repository for generation documents.
pub struct GenerationRepository {
    client: FirestoreClient,
    user_id: String,
}

impl GenerationRepository {
    /// Create a new generation repository.
    pub fn new(client: FirestoreClient, user_id: impl Into<String>) -> Self {
        Self {
            client,
            user_id: user_id.into(),
        }
    }

    fn collection(&self) -> String {
        generations_collection(&self.user_id)
    }

    /// Get a generation by ID.
    pub async fn get(&self, id: &GenerationId) -> FirestoreResult<Option<Generation>> {
        let doc = self.client.get_document(&self.collection(), id.as_str()).await?;
        match doc {
            Some(d) => Ok(Some(document_to_generation(&d, id.as_str())?)),
            None => Ok(None),
        }
    }

    /// List generations, newest first, with optional gallery filtering and
    /// cursor pagination.
    ///
    /// The cursor is the `created_at` timestamp (RFC3339) of the last item
    /// of the previous page.
    pub async fn list_page(
        &self,
        filter: GalleryFilter,
        limit: Option<u32>,
        cursor: Option<&str>,
    ) -> FirestoreResult<(Vec<Generation>, Option<String>)> {
        let query = build_gallery_query(filter, limit, cursor);

        let parent_path = format!("accounts/{}", self.user_id);
        let docs = self.client.run_query(&parent_path, query).await?;

        let mut generations = Vec::with_capacity(docs.len());
        for doc in docs {
            let Some(id) = doc.doc_id().map(str::to_string) else {
                continue;
            };
            match document_to_generation(&doc, &id) {
                Ok(generation) => generations.push(generation),
                Err(e) => {
                    warn!(
                        user_id = %self.user_id,
                        generation_id = %id,
                        error = %e,
                        "Failed to parse generation document"
                    );
                }
            }
        }

        let next_cursor = generations.last().map(|g| g.created_at.to_rfc3339());
        Ok((generations, next_cursor))
    }
}

/// Build the gallery listing query.
fn build_gallery_query(
    filter: GalleryFilter,
    limit: Option<u32>,
    cursor: Option<&str>,
) -> StructuredQuery {
    let effective_limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE) as i32;

    let mut filters = Vec::new();
    if let Some(category) = filter.category() {
        filters.push(Filter::field(
            "category",
            "EQUAL",
            Value::StringValue(category.as_str().to_string()),
        ));
    }
    if filter.favorites_only() {
        filters.push(Filter::field(
            "is_favorite",
            "EQUAL",
            Value::BooleanValue(true),
        ));
    }

    StructuredQuery {
        from: vec![CollectionSelector {
            collection_id: "generations".to_string(),
            all_descendants: None,
        }],
        filter: Filter::and(filters),
        order_by: Some(vec![Order {
            field: FieldReference {
                field_path: "created_at".to_string(),
            },
            direction: "DESCENDING".to_string(),
        }]),
        start_at: cursor.map(|ts| Cursor {
            values: vec![Value::TimestampValue(ts.to_string())],
            before: Some(false),
        }),
        limit: Some(effective_limit),
    }
}

// =============================================================================
// Field mapping
// =============================================================================

/// Convert a generation record to Firestore fields.
pub fn generation_to_fields(generation: &Generation) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert("id".to_string(), generation.id.as_str().to_firestore_value());
    fields.insert(
        "owner_id".to_string(),
        generation.owner_id.to_firestore_value(),
    );
    fields.insert(
        "style".to_string(),
        generation.style.as_str().to_firestore_value(),
    );
    fields.insert(
        "category".to_string(),
        generation.category.as_str().to_firestore_value(),
    );
    fields.insert(
        "source_image_url".to_string(),
        generation.source_image_url.to_firestore_value(),
    );
    fields.insert(
        "result_image_url".to_string(),
        generation.result_image_url.to_firestore_value(),
    );
    fields.insert(
        "is_favorite".to_string(),
        generation.is_favorite.to_firestore_value(),
    );
    fields.insert(
        "credits_spent".to_string(),
        generation.credits_spent.to_firestore_value(),
    );
    fields.insert(
        "created_at".to_string(),
        generation.created_at.to_firestore_value(),
    );

    if let Some(ref metadata) = generation.metadata {
        let mut map = HashMap::new();
        if let Some(bytes) = metadata.source_size_bytes {
            map.insert("source_size_bytes".to_string(), bytes.to_firestore_value());
        }
        if let Some(secs) = metadata.processing_time_secs {
            map.insert(
                "processing_time_secs".to_string(),
                secs.to_firestore_value(),
            );
        }
        fields.insert(
            "metadata".to_string(),
            Value::MapValue(MapValue { fields: Some(map) }),
        );
    }

    fields
}

/// Parse a generation record from a Firestore document.
pub fn document_to_generation(
    doc: &crate::types::Document,
    id: &str,
) -> FirestoreResult<Generation> {
    let fields = doc.fields.as_ref().ok_or_else(|| {
        FirestoreError::invalid_response(format!("Generation {} has no fields", id))
    })?;

    let get_string =
        |key: &str| -> Option<String> { fields.get(key).and_then(String::from_firestore_value) };

    let style = get_string("style")
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| {
            FirestoreError::invalid_response(format!("Generation {} has invalid style", id))
        })?;
    let category = get_string("category")
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| {
            FirestoreError::invalid_response(format!("Generation {} has invalid category", id))
        })?;

    let metadata = fields.get("metadata").and_then(|v| match v {
        Value::MapValue(map) => map.fields.as_ref().map(|f| GenerationMetadata {
            source_size_bytes: f.get("source_size_bytes").and_then(u64::from_firestore_value),
            processing_time_secs: f
                .get("processing_time_secs")
                .and_then(f64::from_firestore_value),
        }),
        _ => None,
    });

    Ok(Generation {
        id: GenerationId::from_string(id),
        owner_id: get_string("owner_id").unwrap_or_default(),
        style,
        category,
        source_image_url: get_string("source_image_url").unwrap_or_default(),
        result_image_url: get_string("result_image_url").unwrap_or_default(),
        is_favorite: fields
            .get("is_favorite")
            .and_then(bool::from_firestore_value)
            .unwrap_or(false),
        credits_spent: fields
            .get("credits_spent")
            .and_then(u32::from_firestore_value)
            .unwrap_or(0),
        created_at: fields
            .get("created_at")
            .and_then(chrono::DateTime::from_firestore_value)
            .unwrap_or_else(chrono::Utc::now),
        metadata: metadata.filter(|m| !m.is_empty()),
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use plushify_models::{GenerationCategory, NewGeneration, PlushieStyle};

    fn sample_generation() -> Generation {
        Generation::from_new(
            "user-1",
            NewGeneration {
                style: PlushieStyle::Kawaii,
                category: GenerationCategory::Pets,
                source_image_url: "accounts/user-1/source/g.jpg".into(),
                result_image_url: "accounts/user-1/plushie/g.png".into(),
                metadata: Some(GenerationMetadata {
                    source_size_bytes: Some(2_100_000),
                    processing_time_secs: Some(3.2),
                }),
            },
            1,
        )
    }

    #[test]
    fn test_fields_parse_back_to_the_same_record() {
        let generation = sample_generation();
        let doc = crate::types::Document::new(generation_to_fields(&generation));
        let parsed = document_to_generation(&doc, generation.id.as_str()).unwrap();

        assert_eq!(parsed.id, generation.id);
        assert_eq!(parsed.owner_id, "user-1");
        assert_eq!(parsed.style, PlushieStyle::Kawaii);
        assert_eq!(parsed.category, GenerationCategory::Pets);
        assert_eq!(parsed.credits_spent, 1);
        assert!(!parsed.is_favorite);
        let metadata = parsed.metadata.unwrap();
        assert_eq!(metadata.source_size_bytes, Some(2_100_000));
        assert_eq!(metadata.processing_time_secs, Some(3.2));
    }

    #[test]
    fn test_invalid_style_is_rejected() {
        let mut fields = generation_to_fields(&sample_generation());
        fields.insert("style".to_string(), "velvet".to_firestore_value());
        let doc = crate::types::Document::new(fields);
        assert!(document_to_generation(&doc, "gen-x").is_err());
    }

    #[test]
    fn test_gallery_query_filters() {
        let query = build_gallery_query(GalleryFilter::Pets, Some(10), None);
        let filter = query.filter.unwrap();
        let field_filter = filter.field_filter.unwrap();
        assert_eq!(field_filter.field.field_path, "category");
        assert_eq!(query.limit, Some(10));

        let query = build_gallery_query(GalleryFilter::Favorites, None, None);
        let field_filter = query.filter.unwrap().field_filter.unwrap();
        assert_eq!(field_filter.field.field_path, "is_favorite");

        let query = build_gallery_query(GalleryFilter::All, None, None);
        assert!(query.filter.is_none());
        assert_eq!(query.limit, Some(DEFAULT_PAGE_SIZE as i32));
    }

    #[test]
    fn test_gallery_query_clamps_limit_and_sets_cursor() {
        let query = build_gallery_query(GalleryFilter::All, Some(10_000), Some("2025-06-01T00:00:00Z"));
        assert_eq!(query.limit, Some(MAX_PAGE_SIZE as i32));
        let cursor = query.start_at.unwrap();
        assert_eq!(cursor.before, Some(false));
        assert!(matches!(&cursor.values[0], Value::TimestampValue(ts) if ts == "2025-06-01T00:00:00Z"));
    }
}
