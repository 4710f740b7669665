//! Cloudflare R2 storage client for plushie images.
//!
//! This crate provides:
//! - Presigned PUT URLs for browser photo uploads
//! - Presigned GET URLs for gallery display
//! - Object deletion and connectivity checks
//! - Object key layout and validation

pub mod client;
pub mod error;
pub mod keys;

pub use client::{R2Client, R2Config};
pub use error::{StorageError, StorageResult};
pub use keys::{key_belongs_to, plushie_image_key, source_image_key, validate_segment};
