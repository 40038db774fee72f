//! Framework-agnostic response headers.

use unicode_normalization::UnicodeNormalization;

pub const CONTENT_TYPE: &str = "application/zip";

/// `Content-Type`, `Content-Disposition` and, when known, `Content-Length`.
///
/// A known length also turns off reverse-proxy buffering (`X-Accel-Buffering`)
/// so the body reaches the client as it is produced.
pub fn headers(name: &str, content_length: Option<u64>) -> Vec<(&'static str, String)> {
    let mut headers = vec![
        ("Content-Type", CONTENT_TYPE.to_string()),
        ("Content-Disposition", content_disposition(name)),
    ];
    if let Some(length) = content_length {
        headers.push(("Content-Length", length.to_string()));
        headers.push(("X-Accel-Buffering", "no".to_string()));
    }
    headers
}

/// Attachment disposition with a plain ASCII `filename` for old clients and
/// the exact name as an RFC 5987 `filename*`.
pub fn content_disposition(name: &str) -> String {
    let fallback: String = name
        .nfkd()
        .filter(char::is_ascii)
        .map(|c| match c {
            '"' | '\\' | '/' | '%' => '_',
            c if c.is_ascii_control() => '_',
            c => c,
        })
        .collect();
    let fallback = match fallback.trim() {
        "" => "download.zip",
        trimmed => trimmed,
    };
    format!(
        "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
        urlencoding::encode(name)
    )
}
