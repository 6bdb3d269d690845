//! Natural-key normalization for entity deduplication.
//!
//! Every dedup key in the store (company slugs, role titles, skill names)
//! goes through the same normalization before lookup or insert: trim,
//! case-fold, collapse internal whitespace. Slugs additionally reduce to
//! `[a-z0-9-]`. A key that is empty after normalization is a validation
//! error, caught before any relational work happens.

use crate::{Error, Result};

/// Normalize a natural-key component: trim, lowercase, collapse whitespace.
pub fn normalize_key(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Reduce a name to a URL-safe slug: normalized, non-alphanumeric runs
/// become single hyphens, no leading/trailing hyphen.
pub fn slugify(raw: &str) -> String {
    let mut slug = String::with_capacity(raw.len());
    let mut last_hyphen = true; // suppress a leading hyphen
    for ch in raw.trim().chars() {
        if ch.is_alphanumeric() {
            for lower in ch.to_lowercase() {
                slug.push(lower);
            }
            last_hyphen = false;
        } else if !last_hyphen {
            slug.push('-');
            last_hyphen = true;
        }
    }
    if slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Normalize a key field, rejecting values that are blank afterwards.
pub fn require_key(raw: &str, field: &str) -> Result<String> {
    let normalized = normalize_key(raw);
    if normalized.is_empty() {
        return Err(Error::Validation(format!("{} must not be blank", field)));
    }
    Ok(normalized)
}

/// Slugify a name, rejecting values that produce an empty slug.
pub fn require_slug(raw: &str, field: &str) -> Result<String> {
    let slug = slugify(raw);
    if slug.is_empty() {
        return Err(Error::Validation(format!(
            "{} must contain at least one alphanumeric character",
            field
        )));
    }
    Ok(slug)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_key_basic() {
        assert_eq!(normalize_key("Senior Engineer"), "senior engineer");
    }

    #[test]
    fn test_normalize_key_collapses_whitespace() {
        assert_eq!(
            normalize_key("  Senior\t\tSoftware   Engineer \n"),
            "senior software engineer"
        );
    }

    #[test]
    fn test_normalize_key_idempotent() {
        let once = normalize_key("APS6  Policy Officer");
        assert_eq!(normalize_key(&once), once);
    }

    #[test]
    fn test_normalize_key_blank() {
        assert_eq!(normalize_key("   \t \n "), "");
        assert_eq!(normalize_key(""), "");
    }

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("Acme Corp"), "acme-corp");
    }

    #[test]
    fn test_slugify_punctuation_runs() {
        assert_eq!(slugify("Dept. of Finance & Admin"), "dept-of-finance-admin");
    }

    #[test]
    fn test_slugify_trims_hyphens() {
        assert_eq!(slugify("  --Acme-- "), "acme");
    }

    #[test]
    fn test_slugify_unicode_casefold() {
        assert_eq!(slugify("Büro Köln"), "büro-köln");
    }

    #[test]
    fn test_slugify_idempotent() {
        let once = slugify("Attorney-General's Department");
        assert_eq!(slugify(&once), once);
    }

    #[test]
    fn test_require_key_ok() {
        assert_eq!(require_key(" Acme ", "company name").unwrap(), "acme");
    }

    #[test]
    fn test_require_key_blank_is_validation_error() {
        let err = require_key("   ", "company name").unwrap_err();
        match err {
            Error::Validation(msg) => assert!(msg.contains("company name")),
            other => panic!("Expected Validation, got {:?}", other),
        }
    }

    #[test]
    fn test_require_slug_symbols_only_is_validation_error() {
        let err = require_slug("!!!", "division name").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_require_slug_ok() {
        assert_eq!(require_slug("Digital & Data", "division").unwrap(), "digital-data");
    }
}
