//! Content-type detection and safety screening for fetched documents.
//!
//! Documents arrive from arbitrary posting URLs, so the declared type is a
//! hint at best:
//! 1. Magic byte detection settles the real format
//! 2. Extension fallback covers text formats with no magic bytes
//! 3. Executables and macro-enabled files are refused outright

use crate::traits::DocumentFormat;

/// Magic byte signatures for executable files
pub const MAGIC_SIGNATURES: &[(&str, &[u8])] = &[
    ("Windows PE/MZ", &[0x4D, 0x5A]),
    ("ELF", &[0x7F, 0x45, 0x4C, 0x46]),
    ("Mach-O 32", &[0xFE, 0xED, 0xFA, 0xCE]),
    ("Mach-O 64", &[0xFE, 0xED, 0xFA, 0xCF]),
    ("Mach-O Fat", &[0xCA, 0xFE, 0xBA, 0xBE]),
    ("WebAssembly", &[0x00, 0x61, 0x73, 0x6D]),
];

/// Blocked file extensions (case-insensitive)
const BLOCKED_EXTENSIONS: &[&str] = &[
    // Windows executables
    "exe", "dll", "scr", "com", "msi",
    // Unix binaries
    "so", "dylib", "out",
    // Java/JVM
    "jar", "class",
    // Packages
    "deb", "rpm", "apk", "dmg", "pkg",
    // Macro-enabled Office variants
    "docm", "dotm", "xlsm", "pptm",
    // Other dangerous
    "lnk", "hta", "scf",
];

/// Result of document safety screening
#[derive(Debug, Clone)]
pub struct ScreenResult {
    pub allowed: bool,
    pub block_reason: Option<String>,
    pub detected_type: Option<String>,
}

impl ScreenResult {
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            block_reason: None,
            detected_type: None,
        }
    }

    pub fn blocked(reason: impl Into<String>, detected: impl Into<String>) -> Self {
        Self {
            allowed: false,
            block_reason: Some(reason.into()),
            detected_type: Some(detected.into()),
        }
    }
}

/// Screen a fetched document before it reaches storage or an extractor.
pub fn screen_document(filename: &str, data: &[u8], max_size_bytes: u64) -> ScreenResult {
    if data.len() as u64 > max_size_bytes {
        return ScreenResult::blocked(
            format!("Document exceeds maximum size of {} bytes", max_size_bytes),
            "oversized",
        );
    }

    if let Some(ext) = filename.rsplit('.').next() {
        if BLOCKED_EXTENSIONS.contains(&ext.to_lowercase().as_str()) {
            return ScreenResult::blocked(
                format!("File extension .{} is not allowed", ext),
                format!("blocked_extension:{}", ext),
            );
        }
    }

    for (name, magic) in MAGIC_SIGNATURES {
        if data.len() >= magic.len() && &data[..magic.len()] == *magic {
            return ScreenResult::blocked(
                format!("Executable file detected: {}", name),
                format!("executable:{}", name.to_lowercase().replace(' ', "_")),
            );
        }
    }

    ScreenResult::allowed()
}

/// Detect actual content type from magic bytes.
///
/// Returns the detected MIME type if magic bytes match a known format,
/// falling back to extension-based detection, then to the claimed type.
pub fn detect_content_type(filename: &str, data: &[u8], claimed: &str) -> String {
    let claimed = normalize_mime(claimed);

    // 1. Magic byte detection via infer
    if let Some(kind) = infer::get(data) {
        return kind.mime_type().to_string();
    }

    // 2. Extension fallback for text formats (no magic bytes)
    if let Some(ext) = filename.rsplit('.').next() {
        if let Some(mime) = mime_from_extension(ext) {
            return mime.to_string();
        }
    }

    // 3. Mismatch guard: a claimed binary format without recognizable magic
    //    bytes means the data does not match the claim. Downgrade so garbage
    //    never reaches the PDF or Office toolchain.
    if claimed_is_binary(&claimed) {
        return "application/octet-stream".to_string();
    }

    // 4. Trust the claimed type (text-like formats)
    claimed
}

/// Route a detected MIME type to the extractor that handles it.
///
/// `None` means no extractor applies; the raw document is still stored but
/// no text is parsed from it.
pub fn classify_format(mime: &str) -> Option<DocumentFormat> {
    let mime = normalize_mime(mime);
    match mime.as_str() {
        "application/pdf" => Some(DocumentFormat::Pdf),
        "application/msword"
        | "application/rtf"
        | "text/rtf"
        | "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        | "application/vnd.oasis.opendocument.text"
        // Postings served as web pages go through the converter so markup
        // is stripped rather than fed to analysis.
        | "text/html"
        | "application/xhtml+xml" => Some(DocumentFormat::Office),
        m if m.starts_with("text/") => Some(DocumentFormat::PlainText),
        "application/json" => Some(DocumentFormat::PlainText),
        _ => None,
    }
}

/// Strip MIME parameters and normalize case. HTTP servers routinely send
/// `text/html; charset=utf-8`.
pub fn normalize_mime(mime: &str) -> String {
    mime.split(';')
        .next()
        .unwrap_or(mime)
        .trim()
        .to_ascii_lowercase()
}

/// Derive a filename for temp files and extension checks from a posting URL.
pub fn filename_from_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);

    // Drop scheme and authority so a bare host never becomes a filename.
    let path = match path.find("://") {
        Some(idx) => {
            let after_authority = &path[idx + 3..];
            match after_authority.find('/') {
                Some(slash) => &after_authority[slash + 1..],
                None => "",
            }
        }
        None => path,
    };

    let name = path.trim_end_matches('/').rsplit('/').next().unwrap_or("");

    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '|' | '*' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let sanitized = sanitized.trim();
    if sanitized.is_empty() {
        return "document".to_string();
    }

    if sanitized.len() > 255 {
        return sanitized[..255].to_string();
    }

    sanitized.to_string()
}

/// Returns true if the claimed MIME type is a binary format that should have
/// recognizable magic bytes.
fn claimed_is_binary(claimed: &str) -> bool {
    if claimed.starts_with("image/")
        || claimed.starts_with("audio/")
        || claimed.starts_with("video/")
    {
        return true;
    }
    matches!(
        claimed,
        "application/pdf"
            | "application/zip"
            | "application/gzip"
            | "application/msword"
            | "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            | "application/vnd.oasis.opendocument.text"
            | "application/x-executable"
            | "application/wasm"
    )
}

/// Map text-only extensions to MIME types. Binary formats are intentionally
/// absent: they have magic bytes, and when `infer` cannot see them the file
/// does not match its extension.
fn mime_from_extension(ext: &str) -> Option<&'static str> {
    match ext.to_lowercase().as_str() {
        "txt" | "text" => Some("text/plain"),
        "csv" => Some("text/csv"),
        "md" | "markdown" => Some("text/markdown"),
        "html" | "htm" => Some("text/html"),
        "xml" => Some("application/xml"),
        "json" => Some("application/json"),
        "rtf" => Some("application/rtf"),
        _ => None,
    }
}
