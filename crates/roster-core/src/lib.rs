//! # roster-core
//!
//! Core types, traits, and abstractions for the roster ingestion pipeline.
//!
//! This crate provides the foundational data structures and trait definitions
//! that other roster crates depend on.

pub mod content;
pub mod defaults;
pub mod error;
pub mod keys;
pub mod logging;
pub mod models;
pub mod traits;
pub mod uuid_utils;

// Re-export commonly used types at crate root
pub use content::{
    classify_format, detect_content_type, filename_from_url, normalize_mime, screen_document,
    ScreenResult,
};
pub use error::{Error, Result};
pub use keys::{normalize_key, require_key, require_slug, slugify};
pub use models::*;
pub use traits::*;
pub use uuid_utils::{extract_timestamp, is_v7, new_v7};
