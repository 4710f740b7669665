//! Object key layout for stored images.
//!
//! Keys are always built here so handler code can never smuggle arbitrary
//! paths into the bucket:
//! - `accounts/{uid}/source/{generation_id}.jpg` for uploaded photos
//! - `accounts/{uid}/plushie/{generation_id}.png` for generated results

use crate::error::{StorageError, StorageResult};

/// Maximum length for a single key segment.
const MAX_SEGMENT_LEN: usize = 128;

/// Validate a caller-supplied key segment (uid or generation id).
///
/// Segments are restricted to a safe charset so keys never escape their
/// prefix or need escaping in URLs.
pub fn validate_segment(segment: &str) -> StorageResult<()> {
    if segment.is_empty() || segment.len() > MAX_SEGMENT_LEN {
        return Err(StorageError::invalid_key(format!(
            "Segment length must be 1..={}",
            MAX_SEGMENT_LEN
        )));
    }
    if !segment
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(StorageError::invalid_key(format!(
            "Segment contains unsafe characters: {}",
            segment
        )));
    }
    Ok(())
}

/// Key for an uploaded source photo.
pub fn source_image_key(uid: &str, generation_id: &str) -> StorageResult<String> {
    validate_segment(uid)?;
    validate_segment(generation_id)?;
    Ok(format!("accounts/{}/source/{}.jpg", uid, generation_id))
}

/// Key for a generated plushie image.
pub fn plushie_image_key(uid: &str, generation_id: &str) -> StorageResult<String> {
    validate_segment(uid)?;
    validate_segment(generation_id)?;
    Ok(format!("accounts/{}/plushie/{}.png", uid, generation_id))
}

/// True if the key belongs to the given account's prefix.
pub fn key_belongs_to(key: &str, uid: &str) -> bool {
    key.starts_with(&format!("accounts/{}/", uid))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        assert_eq!(
            source_image_key("user-1", "abc123").unwrap(),
            "accounts/user-1/source/abc123.jpg"
        );
        assert_eq!(
            plushie_image_key("user-1", "abc123").unwrap(),
            "accounts/user-1/plushie/abc123.png"
        );
    }

    #[test]
    fn test_unsafe_segments_are_rejected() {
        assert!(source_image_key("../etc", "x").is_err());
        assert!(source_image_key("user-1", "a/b").is_err());
        assert!(source_image_key("", "x").is_err());
        assert!(source_image_key("user 1", "x").is_err());
    }

    #[test]
    fn test_ownership_prefix_check() {
        assert!(key_belongs_to("accounts/user-1/source/a.jpg", "user-1"));
        assert!(!key_belongs_to("accounts/user-2/source/a.jpg", "user-1"));
        assert!(!key_belongs_to("accounts/user-10/source/a.jpg", "user-1"));
    }
}
