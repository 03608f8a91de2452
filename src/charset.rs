//! Clipboard payload decoding
//!
//! Clipboard HTML usually arrives as bytes. This module picks an encoding and
//! decodes those bytes to text before fragment extraction.
//!
//! # Detection Cascade
//!
//! 1. **Byte order mark**: UTF-8, UTF-16LE and UTF-16BE BOMs win outright
//! 2. **CF_HTML header**: the Windows "HTML Format" clipboard flavour is
//!    always UTF-8, whatever its embedded markup claims
//! 3. **HTML meta tags**: `<meta charset>` or `<meta http-equiv="Content-Type">`
//!    in the first 1024 bytes
//! 4. **Default to UTF-8**
//!
//! Decoding is lossy: invalid sequences become U+FFFD instead of failing.
//!
//! # Examples
//!
//! ```rust
//! use chat_transcript_markdown::charset::{decode_payload, detect_charset};
//!
//! let html = b"<html><head><meta charset=\"windows-1252\"></head><body>\x80</body></html>";
//! assert_eq!(detect_charset(html), "WINDOWS-1252");
//! assert!(decode_payload(html).contains('\u{20AC}'));
//! ```

use encoding_rs::{Encoding, UTF_8};
use regex::Regex;
use std::sync::OnceLock;

/// Default charset when detection fails
const DEFAULT_CHARSET: &str = "UTF-8";

/// Maximum bytes to scan for meta charset tags
const META_SCAN_LIMIT: usize = 1024;

/// Detect the character encoding of a clipboard payload
///
/// Returns an uppercase encoding label. Always returns something usable,
/// defaulting to `"UTF-8"`.
pub fn detect_charset(payload: &[u8]) -> String {
    if let Some((encoding, _)) = Encoding::for_bom(payload) {
        return normalize_charset(encoding.name());
    }

    if has_cf_html_header(payload) {
        return DEFAULT_CHARSET.to_string();
    }

    if let Some(charset) = extract_charset_from_html(payload) {
        return normalize_charset(&charset);
    }

    DEFAULT_CHARSET.to_string()
}

/// Decode a clipboard payload to text
///
/// Unknown charset labels fall back to UTF-8. A byte order mark is removed.
pub fn decode_payload(payload: &[u8]) -> String {
    let charset = detect_charset(payload);
    let encoding = Encoding::for_label(charset.as_bytes()).unwrap_or(UTF_8);

    // `decode` re-sniffs the BOM and strips it from the output
    let (text, used, had_errors) = encoding.decode(payload);
    tracing::debug!(
        charset = used.name(),
        bytes = payload.len(),
        had_errors,
        "Decoded clipboard payload"
    );

    text.into_owned()
}

/// Returns true if the payload starts with a Windows CF_HTML description header
///
/// The header is a block of `Key:Value` lines such as
/// `Version:0.9` / `StartHTML:0000000105` that precedes the markup.
pub fn has_cf_html_header(payload: &[u8]) -> bool {
    static HEADER_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    let regex = HEADER_REGEX
        .get_or_init(|| Regex::new(r"^Version:\s*\d+(\.\d+)?\r?\n(?:[A-Za-z]+:[^\r\n]*\r?\n)*?StartHTML:").ok());
    let Some(regex) = regex.as_ref() else {
        return false;
    };

    let scan_limit = std::cmp::min(payload.len(), META_SCAN_LIMIT);
    let prefix = String::from_utf8_lossy(&payload[..scan_limit]);
    regex.is_match(&prefix)
}

/// Extract charset from HTML meta tags
///
/// # Supported Formats
///
/// - HTML5: `<meta charset="UTF-8">`
/// - HTML4: `<meta http-equiv="Content-Type" content="text/html; charset=UTF-8">`
///
/// Only the first 1024 bytes are scanned.
pub fn extract_charset_from_html(html: &[u8]) -> Option<String> {
    let scan_limit = std::cmp::min(html.len(), META_SCAN_LIMIT);
    let html_str = String::from_utf8_lossy(&html[..scan_limit]);

    static HTML5_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    let html5_regex =
        HTML5_REGEX.get_or_init(|| Regex::new(r#"(?i)<meta\s+charset\s*=\s*"?([^";>\s]+)"?"#).ok());
    let html5_regex = html5_regex.as_ref()?;

    if let Some(caps) = html5_regex.captures(&html_str)
        && let Some(m) = caps.get(1)
    {
        return Some(m.as_str().to_string());
    }

    static HTML4_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    let html4_regex = HTML4_REGEX.get_or_init(|| {
        Regex::new(
            r#"(?i)<meta\s+http-equiv\s*=\s*"?Content-Type"?\s+content\s*=\s*"?[^">]*charset\s*=\s*([^";>\s]+)"?"#,
        )
        .ok()
    });
    let html4_regex = html4_regex.as_ref()?;

    html4_regex
        .captures(&html_str)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Normalize charset name to uppercase
pub fn normalize_charset(charset: &str) -> String {
    charset.to_uppercase()
}
