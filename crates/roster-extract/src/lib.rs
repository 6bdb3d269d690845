//! Document fetching and plain-text extraction for roster.
//!
//! Posting documents arrive as URLs. This crate turns a URL into parsed
//! text in two steps: [`HttpDocumentFetcher`] pulls the bytes, then the
//! [`ExtractorRegistry`] dispatches to a format-specific extractor chosen
//! from the detected content type. Extractors shell out to `pdftotext` and
//! `pandoc`; `health_check` reports whether those tools are installed.

pub mod fetch;
pub mod office;
pub mod pdf;
pub mod registry;
pub mod text;

pub use fetch::HttpDocumentFetcher;
pub use office::OfficeTextExtractor;
pub use pdf::PdfTextExtractor;
pub use registry::ExtractorRegistry;
pub use text::PlainTextExtractor;
