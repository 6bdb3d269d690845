//! Office document extraction — converts word-processor and markup postings
//! to plain text using `pandoc`.
//!
//! Handles docx, rtf, odt, and html. Legacy binary formats pandoc cannot
//! read (old-style .doc) fail extraction; text-like data in an unmapped
//! format falls back to a lossy UTF-8 read.

use std::io::Write;

use async_trait::async_trait;
use serde_json::json;
use tokio::process::Command;
use tracing::debug;

use roster_core::defaults::EXTRACTION_CMD_TIMEOUT_SECS;
use roster_core::{DocumentFormat, Error, ExtractedText, Result, TextExtractor};

use crate::pdf::run_cmd_with_timeout;

pub struct OfficeTextExtractor;

/// Determine the pandoc input format from the detected MIME type.
fn pandoc_format_from_mime(mime_type: &str) -> Option<&'static str> {
    match mime_type {
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => Some("docx"),
        "application/rtf" | "text/rtf" => Some("rtf"),
        "application/vnd.oasis.opendocument.text" => Some("odt"),
        "text/html" | "application/xhtml+xml" => Some("html"),
        _ => None,
    }
}

/// Determine the pandoc input format from the filename extension.
fn pandoc_format_from_extension(filename: &str) -> Option<&'static str> {
    let ext = filename.rsplit('.').next()?.to_lowercase();
    match ext.as_str() {
        "docx" => Some("docx"),
        "rtf" => Some("rtf"),
        "odt" => Some("odt"),
        "html" | "htm" => Some("html"),
        _ => None,
    }
}

/// True when the data has NUL bytes near the start. Lossy UTF-8 fallback is
/// only safe for text-like data.
fn looks_binary(data: &[u8]) -> bool {
    data.iter().take(512).any(|b| *b == 0)
}

#[async_trait]
impl TextExtractor for OfficeTextExtractor {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Office
    }

    async fn extract(
        &self,
        data: &[u8],
        filename: &str,
        mime_type: &str,
    ) -> Result<ExtractedText> {
        if data.is_empty() {
            return Err(Error::Validation(
                "Cannot convert empty document".to_string(),
            ));
        }

        // MIME first: filenames derived from posting URLs often carry no
        // usable extension, while the MIME type has been settled against
        // magic bytes by the time extraction runs.
        let format =
            pandoc_format_from_mime(mime_type).or_else(|| pandoc_format_from_extension(filename));

        let format = match format {
            Some(f) => f,
            None => {
                if looks_binary(data) {
                    return Err(Error::Extraction(format!(
                        "No pandoc input format for '{}' ({})",
                        filename, mime_type
                    )));
                }
                let text = String::from_utf8_lossy(data).into_owned();
                return Ok(ExtractedText {
                    metadata: json!({
                        "fallback": true,
                        "reason": "unsupported_format",
                        "char_count": text.len(),
                        "line_count": text.lines().count(),
                    }),
                    text,
                });
            }
        };

        // pandoc sniffs by extension too, so keep the original suffix on the
        // temp file.
        let suffix = filename
            .rsplit('.')
            .next()
            .map(|e| format!(".{}", e))
            .unwrap_or_default();
        let mut tmpfile = tempfile::Builder::new()
            .suffix(&suffix)
            .tempfile()
            .map_err(|e| Error::Extraction(format!("Failed to create temp file: {}", e)))?;
        tmpfile
            .write_all(data)
            .map_err(|e| Error::Extraction(format!("Failed to write temp file: {}", e)))?;
        let tmp_path = tmpfile.path().to_string_lossy().to_string();

        debug!(filename, format, "Converting with pandoc");

        let text = run_cmd_with_timeout(
            Command::new("pandoc")
                .arg("-f")
                .arg(format)
                .arg("-t")
                .arg("plain")
                .arg("--wrap=none")
                .arg(&tmp_path),
            EXTRACTION_CMD_TIMEOUT_SECS,
        )
        .await?;

        let char_count = text.len();
        let line_count = text.lines().count();

        Ok(ExtractedText {
            text,
            metadata: json!({
                "format": format,
                "char_count": char_count,
                "line_count": line_count,
                "converter": "pandoc",
            }),
        })
    }

    async fn health_check(&self) -> Result<bool> {
        match Command::new("pandoc").arg("--version").output().await {
            Ok(output) => Ok(output.status.success()),
            Err(_) => Ok(false),
        }
    }

    fn name(&self) -> &str {
        "office_text"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCX_MIME: &str =
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

    #[test]
    fn test_office_format() {
        let extractor = OfficeTextExtractor;
        assert_eq!(extractor.format(), DocumentFormat::Office);
    }

    #[test]
    fn test_office_name() {
        let extractor = OfficeTextExtractor;
        assert_eq!(extractor.name(), "office_text");
    }

    #[tokio::test]
    async fn test_office_health_check() {
        let extractor = OfficeTextExtractor;
        let result = extractor.health_check().await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_office_empty_input() {
        let extractor = OfficeTextExtractor;
        let result = extractor.extract(b"", "empty.docx", DOCX_MIME).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_office_text_fallback_for_unmapped_format() {
        let extractor = OfficeTextExtractor;
        let result = extractor
            .extract(b"plain text content", "file.xyz", "application/octet-stream")
            .await;
        assert!(result.is_ok());
        let extracted = result.unwrap();
        assert_eq!(extracted.metadata["fallback"], true);
        assert_eq!(extracted.text, "plain text content");
    }

    #[tokio::test]
    async fn test_office_binary_unmapped_format_fails() {
        let extractor = OfficeTextExtractor;
        // Legacy .doc header bytes: OLE compound file magic plus padding.
        let data = b"\xD0\xCF\x11\xE0\xA1\xB1\x1A\xE1\x00\x00\x00\x00";
        let result = extractor
            .extract(data, "legacy.doc", "application/msword")
            .await;
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(
            err.contains("No pandoc input format"),
            "Error should name the missing format mapping: {}",
            err
        );
    }

    #[test]
    fn test_pandoc_format_from_mime() {
        assert_eq!(pandoc_format_from_mime(DOCX_MIME), Some("docx"));
        assert_eq!(pandoc_format_from_mime("application/rtf"), Some("rtf"));
        assert_eq!(pandoc_format_from_mime("text/rtf"), Some("rtf"));
        assert_eq!(
            pandoc_format_from_mime("application/vnd.oasis.opendocument.text"),
            Some("odt")
        );
        assert_eq!(pandoc_format_from_mime("text/html"), Some("html"));
        assert_eq!(pandoc_format_from_mime("application/octet-stream"), None);
    }

    #[test]
    fn test_pandoc_format_from_extension() {
        assert_eq!(pandoc_format_from_extension("offer.docx"), Some("docx"));
        assert_eq!(pandoc_format_from_extension("offer.rtf"), Some("rtf"));
        assert_eq!(pandoc_format_from_extension("offer.odt"), Some("odt"));
        assert_eq!(pandoc_format_from_extension("listing.html"), Some("html"));
        assert_eq!(pandoc_format_from_extension("listing.htm"), Some("html"));
        assert_eq!(pandoc_format_from_extension("unknown.bin"), None);
    }

    #[tokio::test]
    async fn test_office_html_extraction() {
        let extractor = OfficeTextExtractor;
        if !extractor.health_check().await.unwrap_or(false) {
            eprintln!("Skipping test_office_html_extraction: pandoc not installed");
            return;
        }

        let html = b"<html><body><h1>Data Engineer</h1><p>Build pipelines</p></body></html>";
        let result = extractor.extract(html, "posting.html", "text/html").await;
        assert!(result.is_ok(), "Extraction failed: {:?}", result.err());
        let extracted = result.unwrap();
        assert!(
            extracted.text.contains("Data Engineer"),
            "Should contain title, got: {}",
            extracted.text
        );
        assert!(
            extracted.text.contains("Build pipelines"),
            "Should contain body text, got: {}",
            extracted.text
        );
        assert_eq!(extracted.metadata["converter"], "pandoc");
    }
}
