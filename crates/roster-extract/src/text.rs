//! Plain-text extraction — postings already served as text need only a
//! lossy UTF-8 decode.

use async_trait::async_trait;
use serde_json::json;

use roster_core::{DocumentFormat, Error, ExtractedText, Result, TextExtractor};

pub struct PlainTextExtractor;

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::PlainText
    }

    async fn extract(
        &self,
        data: &[u8],
        _filename: &str,
        _mime_type: &str,
    ) -> Result<ExtractedText> {
        if data.is_empty() {
            return Err(Error::Validation(
                "Cannot extract text from empty document".to_string(),
            ));
        }

        let text = String::from_utf8_lossy(data).into_owned();
        let char_count = text.len();
        let line_count = text.lines().count();

        Ok(ExtractedText {
            text,
            metadata: json!({
                "char_count": char_count,
                "line_count": line_count,
            }),
        })
    }

    async fn health_check(&self) -> Result<bool> {
        // No external tooling.
        Ok(true)
    }

    fn name(&self) -> &str {
        "plain_text"
    }
}
