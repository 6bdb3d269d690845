//! PDF extraction — pulls the text layer out of posting PDFs using
//! `pdftotext` (poppler-utils).

use std::io::Write;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::{debug, warn};

use roster_core::defaults::{
    EXTRACTION_CMD_TIMEOUT_SECS, LARGE_PDF_PAGE_THRESHOLD, PDF_BATCH_PAGES,
    PDF_OCR_CHARS_PER_PAGE,
};
use roster_core::{DocumentFormat, Error, ExtractedText, Result, TextExtractor};

/// Extracts text from PDF postings using `pdftotext` (poppler-utils).
///
/// PDFs over [`LARGE_PDF_PAGE_THRESHOLD`] pages are extracted in
/// [`PDF_BATCH_PAGES`]-page batches so each invocation stays under the
/// per-command timeout. Scanned postings with no usable text layer get
/// `metadata["needs_ocr"] = true` so downstream consumers know the parsed
/// text is not the whole document.
pub struct PdfTextExtractor;

/// Parse `pdfinfo` output into a JSON metadata object.
fn parse_pdfinfo(output: &str) -> JsonValue {
    let mut metadata = serde_json::Map::new();

    for line in output.lines() {
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim().to_lowercase().replace(' ', "_");
            let value = value.trim();
            if !value.is_empty() {
                // Page count is the one field read back as a number.
                if key == "pages" {
                    if let Ok(pages) = value.parse::<u64>() {
                        metadata.insert(key, JsonValue::Number(pages.into()));
                        continue;
                    }
                }
                metadata.insert(key, JsonValue::String(value.to_string()));
            }
        }
    }

    JsonValue::Object(metadata)
}

/// Page count from pdfinfo metadata, defaulting to 0 when unknown.
fn page_count(metadata: &JsonValue) -> usize {
    metadata.get("pages").and_then(|v| v.as_u64()).unwrap_or(0) as usize
}

/// Run a command with a timeout, returning stdout as a string.
pub(crate) async fn run_cmd_with_timeout(cmd: &mut Command, timeout_secs: u64) -> Result<String> {
    let output = tokio::time::timeout(std::time::Duration::from_secs(timeout_secs), cmd.output())
        .await
        .map_err(|_| {
            Error::Extraction(format!("External command timed out after {}s", timeout_secs))
        })?
        .map_err(|e| Error::Extraction(format!("Failed to execute command: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Extraction(format!(
            "Command failed (exit {}): {}",
            output.status,
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[async_trait]
impl TextExtractor for PdfTextExtractor {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Pdf
    }

    async fn extract(
        &self,
        data: &[u8],
        filename: &str,
        _mime_type: &str,
    ) -> Result<ExtractedText> {
        if data.is_empty() {
            return Err(Error::Validation(
                "Cannot extract text from empty PDF data".to_string(),
            ));
        }

        if data.len() < 4 || &data[0..4] != b"%PDF" {
            return Err(Error::Validation(format!(
                "File '{}' is not a valid PDF (missing %PDF header)",
                filename
            )));
        }

        // pdftotext reads from a file path, not stdin. The tempfile is
        // removed when `tmpfile` drops, on every exit path.
        let mut tmpfile = NamedTempFile::new()
            .map_err(|e| Error::Extraction(format!("Failed to create temp file: {}", e)))?;
        tmpfile
            .write_all(data)
            .map_err(|e| Error::Extraction(format!("Failed to write temp file: {}", e)))?;
        let tmp_path = tmpfile.path().to_string_lossy().to_string();

        let pdfinfo_output = run_cmd_with_timeout(
            Command::new("pdfinfo").arg(&tmp_path),
            EXTRACTION_CMD_TIMEOUT_SECS,
        )
        .await;

        // Metadata is best-effort; extraction proceeds without it.
        let mut metadata = match pdfinfo_output {
            Ok(output) => parse_pdfinfo(&output),
            Err(e) => {
                warn!(filename, error = %e, "pdfinfo failed, continuing without metadata");
                serde_json::json!({})
            }
        };

        let pages = page_count(&metadata);
        let text = if pages > LARGE_PDF_PAGE_THRESHOLD {
            debug!(filename, pages, "Large PDF detected, extracting in batches");
            let mut chunks = Vec::new();
            let mut start = 1usize;
            while start <= pages {
                let end = (start + PDF_BATCH_PAGES - 1).min(pages);
                let chunk = run_cmd_with_timeout(
                    Command::new("pdftotext")
                        .arg("-f")
                        .arg(start.to_string())
                        .arg("-l")
                        .arg(end.to_string())
                        .arg(&tmp_path)
                        .arg("-"),
                    EXTRACTION_CMD_TIMEOUT_SECS,
                )
                .await?;
                chunks.push(chunk);
                start = end + 1;
            }
            chunks.join("")
        } else {
            // Single pass for small PDFs, or when the page count is unknown.
            run_cmd_with_timeout(
                Command::new("pdftotext").arg(&tmp_path).arg("-"),
                EXTRACTION_CMD_TIMEOUT_SECS,
            )
            .await?
        };

        // A near-empty text layer on a multi-page document means the posting
        // was scanned rather than typeset.
        let trimmed_len = text.trim().len();
        if pages > 0 && trimmed_len < pages.saturating_mul(PDF_OCR_CHARS_PER_PAGE) {
            if let Some(obj) = metadata.as_object_mut() {
                obj.insert("needs_ocr".to_string(), JsonValue::Bool(true));
            }
        }

        let char_count = text.len();
        let line_count = text.lines().count();
        if let Some(obj) = metadata.as_object_mut() {
            obj.insert(
                "char_count".to_string(),
                JsonValue::Number(char_count.into()),
            );
            obj.insert(
                "line_count".to_string(),
                JsonValue::Number(line_count.into()),
            );
        }

        Ok(ExtractedText { text, metadata })
    }

    async fn health_check(&self) -> Result<bool> {
        match Command::new("pdftotext").arg("-v").output().await {
            Ok(output) => {
                // pdftotext -v prints the version to stderr and exits with 0
                // or 99 depending on the poppler build. Both mean the binary
                // exists.
                Ok(output.status.success() || output.status.code() == Some(99))
            }
            Err(_) => Ok(false),
        }
    }

    fn name(&self) -> &str {
        "pdf_text"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdf_format() {
        let extractor = PdfTextExtractor;
        assert_eq!(extractor.format(), DocumentFormat::Pdf);
    }

    #[test]
    fn test_pdf_name() {
        let extractor = PdfTextExtractor;
        assert_eq!(extractor.name(), "pdf_text");
    }

    #[tokio::test]
    async fn test_pdf_health_check() {
        let extractor = PdfTextExtractor;
        // Passes whether or not pdftotext is installed; the check itself
        // must not error.
        let result = extractor.health_check().await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_pdf_empty_input() {
        let extractor = PdfTextExtractor;
        let result = extractor.extract(b"", "empty.pdf", "application/pdf").await;
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(
            err.contains("empty"),
            "Error should mention empty data: {}",
            err
        );
    }

    #[tokio::test]
    async fn test_pdf_invalid_magic_bytes() {
        let extractor = PdfTextExtractor;
        let result = extractor
            .extract(b"not a pdf at all", "bad.pdf", "application/pdf")
            .await;
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(
            err.contains("not a valid PDF"),
            "Error should mention invalid PDF: {}",
            err
        );
    }

    #[tokio::test]
    async fn test_pdf_extraction() {
        // Minimal valid PDF containing the text "Hello World": header,
        // catalog, page tree, one content stream, xref.
        let pdf_bytes = b"%PDF-1.0
1 0 obj
<< /Type /Catalog /Pages 2 0 R >>
endobj

2 0 obj
<< /Type /Pages /Kids [3 0 R] /Count 1 >>
endobj

3 0 obj
<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792]
   /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >>
endobj

4 0 obj
<< /Length 44 >>
stream
BT /F1 12 Tf 100 700 Td (Hello World) Tj ET
endstream
endobj

5 0 obj
<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>
endobj

xref
0 6
0000000000 65535 f
0000000009 00000 n
0000000058 00000 n
0000000115 00000 n
0000000266 00000 n
0000000360 00000 n

trailer
<< /Size 6 /Root 1 0 R >>
startxref
434
%%EOF";

        let extractor = PdfTextExtractor;
        if !extractor.health_check().await.unwrap_or(false) {
            eprintln!("Skipping test_pdf_extraction: pdftotext not installed");
            return;
        }

        let result = extractor
            .extract(pdf_bytes, "hello.pdf", "application/pdf")
            .await;
        assert!(result.is_ok(), "Extraction failed: {:?}", result.err());
        let extracted = result.unwrap();
        assert!(
            extracted.text.contains("Hello World"),
            "Extracted text should contain 'Hello World', got: {}",
            extracted.text
        );
        assert!(extracted.metadata.get("char_count").is_some());
        assert!(extracted.metadata.get("line_count").is_some());
    }

    #[test]
    fn test_pdfinfo_metadata_parsing() {
        let pdfinfo_output = "\
Title:          Senior Data Engineer
Author:         Acme Recruitment
Producer:       pdfTeX-1.40.25
CreationDate:   Tue Jan  7 10:30:00 2025
Pages:          42
Page size:      612 x 792 pts (letter)
";
        let metadata = parse_pdfinfo(pdfinfo_output);
        assert_eq!(metadata["title"], "Senior Data Engineer");
        assert_eq!(metadata["author"], "Acme Recruitment");
        assert_eq!(metadata["producer"], "pdfTeX-1.40.25");
        assert_eq!(metadata["pages"], 42);
        assert_eq!(metadata["page_size"], "612 x 792 pts (letter)");
    }

    #[test]
    fn test_pdfinfo_empty_output() {
        let metadata = parse_pdfinfo("");
        assert!(metadata.as_object().unwrap().is_empty());
    }

    #[test]
    fn test_page_count_extraction() {
        let meta = serde_json::json!({"pages": 150});
        assert_eq!(page_count(&meta), 150);

        let meta_no_pages = serde_json::json!({});
        assert_eq!(page_count(&meta_no_pages), 0);

        let meta_string_pages = serde_json::json!({"pages": "not a number"});
        assert_eq!(page_count(&meta_string_pages), 0);
    }
}
