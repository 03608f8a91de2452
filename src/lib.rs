//! Chat Transcript Markdown Converter
//!
//! This library turns a chat transcript copied from a web chat UI (clipboard
//! HTML) into clean Markdown: user turns as styled text bubbles, assistant
//! turns as Markdown with properly fenced code blocks.
//!
//! # Architecture
//!
//! The library is structured into several modules:
//! - `fragment`: isolating the copied region of a clipboard payload
//! - `parser`: HTML5 parsing using html5ever into an owned tree (`dom`)
//! - `protect`: replacing code blocks with placeholder tokens
//! - `transcript`: per-turn rendering by author role
//! - `converter`: generic Markdown generation from the tree
//! - `cleanup`: list and quote spacing fixes on the assembled Markdown
//! - `pipeline`: the `convert` entry point composing all of the above
//! - `charset`: decoding raw payload bytes
//! - `security`: non-content elements, unsafe URLs, nesting limits
//!
//! Reading the clipboard and writing files is left to the caller; the
//! library maps one string (or byte payload) to one Markdown string.
//!
//! # Example
//!
//! ```rust
//! use chat_transcript_markdown::{convert, ConversionError};
//!
//! let markdown = convert("<h1>Notes</h1><p>Plain page</p>").unwrap();
//! assert_eq!(markdown, "\n# Notes\nPlain page");
//!
//! assert_eq!(convert("<div></div>"), Err(ConversionError::EmptyResult));
//! ```

// Module declarations
pub mod charset;
pub mod cleanup;
pub mod converter;
pub mod dom;
pub mod error;
pub mod fragment;
pub mod parser;
pub mod pipeline;
pub mod protect;
pub mod security;
pub mod transcript;

// Re-export main types for convenience
pub use converter::{ConversionOptions, MarkdownConverter};
pub use error::ConversionError;
pub use parser::parse_html;
pub use pipeline::{TranscriptConverter, convert, convert_bytes};
pub use transcript::{Role, TranscriptOptions};
