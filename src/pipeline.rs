//! End-to-end conversion
//!
//! Composes the stages into the single entry point callers use:
//!
//! 1. Fragment extraction from the raw payload
//! 2. HTML5 parse into the owned tree
//! 3. Code block protection
//! 4. Per-turn transcript rendering
//! 5. List and quote cleanup
//!
//! The result starts with exactly one newline. A blank result is an error.
//!
//! # Examples
//!
//! ```rust
//! use chat_transcript_markdown::convert;
//!
//! let html = concat!(
//!     r#"<div data-message-author-role="user"><div class="whitespace-pre-wrap">Hi</div></div>"#,
//!     r#"<div data-message-author-role="assistant"><div class="markdown"><p>Hello!</p></div></div>"#,
//! );
//! let markdown = convert(html).unwrap();
//! assert!(markdown.starts_with("\n<div class=\"you-bubble\">"));
//! assert!(markdown.ends_with("</div>\n\nHello!"));
//! ```

use crate::charset::decode_payload;
use crate::cleanup::cleanup_markdown;
use crate::error::ConversionError;
use crate::fragment::locate_fragment;
use crate::parser::parse_html;
use crate::protect::protect;
use crate::transcript::{TranscriptOptions, TranscriptRenderer};

/// Clipboard HTML to Markdown converter
///
/// Holds only configuration; every call starts from scratch.
pub struct TranscriptConverter {
    options: TranscriptOptions,
    renderer: TranscriptRenderer,
}

impl TranscriptConverter {
    pub fn new() -> Self {
        Self::with_options(TranscriptOptions::default())
    }

    pub fn with_options(options: TranscriptOptions) -> Self {
        let renderer = TranscriptRenderer::with_options(options.clone());
        Self { options, renderer }
    }

    /// Convert an HTML payload to transcript Markdown
    ///
    /// # Errors
    ///
    /// [`ConversionError::EmptyResult`] if nothing but whitespace is left.
    pub fn convert(&self, raw: &str) -> Result<String, ConversionError> {
        let (fragment, source) = locate_fragment(raw);
        tracing::debug!(
            ?source,
            payload_len = raw.len(),
            fragment_len = fragment.len(),
            "Located HTML fragment"
        );

        let dom = parse_html(fragment);
        let protected = protect(&dom, &self.options);
        let markdown = self
            .renderer
            .render(&protected.document, &protected.placeholders);
        let cleaned = cleanup_markdown(&markdown);

        let Some(start) = content_start(&cleaned) else {
            return Err(ConversionError::EmptyResult);
        };
        Ok(format!("\n{}", &cleaned[start..]))
    }

    /// Decode a raw clipboard payload and convert it
    ///
    /// # Errors
    ///
    /// [`ConversionError::EmptyInput`] for an empty or whitespace-only payload,
    /// otherwise as [`TranscriptConverter::convert`].
    pub fn convert_bytes(&self, payload: &[u8]) -> Result<String, ConversionError> {
        if payload.iter().all(u8::is_ascii_whitespace) {
            return Err(ConversionError::EmptyInput);
        }
        self.convert(&decode_payload(payload))
    }
}

impl Default for TranscriptConverter {
    fn default() -> Self {
        Self::new()
    }
}

/// Byte offset of the first line holding non-whitespace, if any
fn content_start(markdown: &str) -> Option<usize> {
    let first = markdown.find(|ch: char| !ch.is_whitespace())?;
    Some(markdown[..first].rfind('\n').map_or(0, |newline| newline + 1))
}

/// Convert an HTML payload with the default transcript options
pub fn convert(raw: &str) -> Result<String, ConversionError> {
    TranscriptConverter::new().convert(raw)
}

/// Decode and convert a raw payload with the default transcript options
pub fn convert_bytes(payload: &[u8]) -> Result<String, ConversionError> {
    TranscriptConverter::new().convert_bytes(payload)
}
