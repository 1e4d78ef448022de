//! Checks applied to a user-selected file before it is staged.
//!
//! Supporting documents are PDFs, images, and office files. Anything that
//! looks like an executable is refused, as are empty and oversized files.

use once_cell::sync::Lazy;
use std::collections::HashSet;

use crate::{Error, Result};

/// Magic byte signatures of executable formats.
const EXECUTABLE_SIGNATURES: &[(&str, &[u8])] = &[
    ("Windows PE", &[0x4D, 0x5A]),
    ("ELF", &[0x7F, 0x45, 0x4C, 0x46]),
    ("Mach-O 32", &[0xFE, 0xED, 0xFA, 0xCE]),
    ("Mach-O 64", &[0xFE, 0xED, 0xFA, 0xCF]),
    ("Mach-O Fat or Java class", &[0xCA, 0xFE, 0xBA, 0xBE]),
    ("WebAssembly", &[0x00, 0x61, 0x73, 0x6D]),
];

/// Blocked file extensions (case-insensitive).
static BLOCKED_EXTENSIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "exe", "dll", "scr", "pif", "com", "msi", "bat", "cmd", "ps1", "vbs", "sh", "so",
        "dylib", "jar", "class", "apk", "app", "dmg", "docm", "xlsm", "pptm", "reg", "lnk", "hta",
    ]
    .into_iter()
    .collect()
});

/// Reject files that must never reach the staging area.
pub fn validate_upload(filename: &str, data: &[u8], max_size_bytes: u64) -> Result<()> {
    if data.is_empty() {
        return Err(Error::InvalidInput(format!("File '{}' is empty", filename)));
    }

    if data.len() as u64 > max_size_bytes {
        return Err(Error::InvalidInput(format!(
            "File '{}' exceeds maximum size of {} bytes",
            filename, max_size_bytes
        )));
    }

    if let Some((_, ext)) = filename.rsplit_once('.') {
        if BLOCKED_EXTENSIONS.contains(ext.to_ascii_lowercase().as_str()) {
            return Err(Error::InvalidInput(format!(
                "File extension .{} is not allowed",
                ext
            )));
        }
    }

    for (name, magic) in EXECUTABLE_SIGNATURES {
        if data.starts_with(magic) {
            return Err(Error::InvalidInput(format!(
                "Executable content detected ({})",
                name
            )));
        }
    }

    Ok(())
}

/// Detect the content type of a document from its magic bytes.
///
/// Falls back to the extension for text formats, then to the claimed type.
pub fn detect_content_type(filename: &str, data: &[u8], claimed: &str) -> String {
    if let Some(kind) = infer::get(data) {
        return kind.mime_type().to_string();
    }

    let ext = filename
        .rsplit_once('.')
        .map(|(_, e)| e.to_ascii_lowercase());
    let by_extension = match ext.as_deref() {
        Some("txt") => Some("text/plain"),
        Some("csv") => Some("text/csv"),
        Some("json") => Some("application/json"),
        Some("md") => Some("text/markdown"),
        Some("html") | Some("htm") => Some("text/html"),
        Some("svg") => Some("image/svg+xml"),
        _ => None,
    };
    if let Some(mime) = by_extension {
        return mime.to_string();
    }

    if claimed.trim().is_empty() {
        "application/octet-stream".to_string()
    } else {
        claimed.to_string()
    }
}

/// Whether a content type is text the extraction prompt can inline.
pub fn is_textual(content_type: &str) -> bool {
    content_type.starts_with("text/")
        || matches!(
            content_type,
            "application/json" | "application/xml" | "image/svg+xml"
        )
}

/// Sanitize a filename for use inside a staged path.
pub fn sanitize_filename(filename: &str) -> String {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);

    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '|' | '?' | '*' | '%' | '#' | ' ' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let sanitized = sanitized.trim_matches('.');
    if sanitized.is_empty() {
        return "document".to_string();
    }

    if sanitized.len() > 128 {
        if let Some(dot_pos) = sanitized.rfind('.') {
            let ext = &sanitized[dot_pos..];
            if ext.len() < 16 {
                let mut cut = 128 - ext.len();
                while !sanitized.is_char_boundary(cut) {
                    cut -= 1;
                }
                return format!("{}{}", &sanitized[..cut], ext);
            }
        }
        let mut cut = 128;
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        return sanitized[..cut].to_string();
    }

    sanitized.to_string()
}
