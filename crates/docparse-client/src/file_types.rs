//! Supported upload file types and content-type lookup

use std::path::Path;

use crate::error::{ParseError, Result};

/// Extensions accepted by the parsing service
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    ".pdf", ".602", ".abw", ".cgm", ".cwk", ".doc", ".docx", ".docm", ".dot", ".dotm", ".hwp",
    ".key", ".lwp", ".mw", ".mcw", ".pages", ".pbd", ".ppt", ".pptm", ".pptx", ".pot", ".potm",
    ".potx", ".rtf", ".sda", ".sdd", ".sdp", ".sdw", ".sgl", ".sti", ".sxi", ".sxw", ".stw",
    ".sxg", ".txt", ".uof", ".uop", ".uot", ".vor", ".wpd", ".wps", ".xml", ".zabw", ".epub",
    ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".svg", ".tiff", ".webp", ".htm", ".html", ".xlsx",
    ".xls", ".xlsm", ".xlsb", ".xlw", ".csv", ".dif", ".sylk", ".slk", ".prn", ".numbers", ".et",
    ".ods", ".fods", ".uos1", ".uos2", ".dbf", ".wk1", ".wk2", ".wk3", ".wk4", ".wks", ".123",
    ".wq1", ".wq2", ".wb1", ".wb2", ".wb3", ".qpw", ".xlr", ".eth", ".tsv",
];

const OCTET_STREAM: &str = "application/octet-stream";

/// Extension to MIME type pairs; the first extension listed for a MIME
/// type is the one a MIME hint maps back to
const MIME_TYPES: &[(&str, &str)] = &[
    ("pdf", "application/pdf"),
    ("doc", "application/msword"),
    ("dot", "application/msword"),
    (
        "docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    ("docm", "application/vnd.ms-word.document.macroenabled.12"),
    ("ppt", "application/vnd.ms-powerpoint"),
    ("pot", "application/vnd.ms-powerpoint"),
    (
        "pptx",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    ),
    ("xls", "application/vnd.ms-excel"),
    ("xlw", "application/vnd.ms-excel"),
    (
        "xlsx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ),
    ("odt", "application/vnd.oasis.opendocument.text"),
    ("ods", "application/vnd.oasis.opendocument.spreadsheet"),
    ("rtf", "application/rtf"),
    ("epub", "application/epub+zip"),
    ("xml", "application/xml"),
    ("txt", "text/plain"),
    ("prn", "text/plain"),
    ("csv", "text/csv"),
    ("tsv", "text/tab-separated-values"),
    ("html", "text/html"),
    ("htm", "text/html"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("bmp", "image/bmp"),
    ("svg", "image/svg+xml"),
    ("tiff", "image/tiff"),
    ("webp", "image/webp"),
];

/// Normalize a declared file type (`"pdf"`, `".PDF"`, `"application/pdf"`,
/// `"text/plain; charset=utf-8"`) to a lowercase extension with a leading dot.
///
/// MIME hints are mapped back through the content-type table; an unknown
/// MIME type falls back to its subtype.
pub fn normalize_extension(file_type: &str) -> String {
    let trimmed = file_type.trim().to_ascii_lowercase();

    let ext = match trimmed.split_once('/') {
        Some((_, subtype)) => {
            let essence = trimmed.split(';').next().unwrap_or_default().trim();
            match extension_for_mime(essence) {
                Some(ext) => ext.to_string(),
                None => subtype.split(';').next().unwrap_or_default().trim().to_string(),
            }
        }
        None => trimmed,
    };

    if ext.starts_with('.') {
        ext
    } else {
        format!(".{}", ext)
    }
}

fn extension_for_mime(mime: &str) -> Option<&'static str> {
    MIME_TYPES
        .iter()
        .find(|(_, m)| *m == mime)
        .map(|(ext, _)| *ext)
}

/// Whether the (already normalized) extension is accepted
pub fn is_supported(extension: &str) -> bool {
    SUPPORTED_EXTENSIONS.contains(&extension)
}

/// Validate a declared file type, returning the normalized extension
pub fn validate_extension(file_type: &str) -> Result<String> {
    let extension = normalize_extension(file_type);
    if is_supported(&extension) {
        Ok(extension)
    } else {
        Err(ParseError::UnsupportedFileType { extension })
    }
}

/// Validate the extension of a local path
pub fn validate_path(path: &Path) -> Result<String> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default();

    if is_supported(&extension) {
        Ok(extension)
    } else {
        Err(ParseError::UnsupportedFileType { extension })
    }
}

/// Content type to send with an uploaded file part
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    MIME_TYPES
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, mime)| *mime)
        .unwrap_or(OCTET_STREAM)
}
