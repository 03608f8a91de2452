//! Post-processing of assembled transcript Markdown
//!
//! The generic renderer leaves two artifacts behind: blank lines between
//! list items that belong together, and quote blocks running straight into
//! the following paragraph. [`cleanup_markdown`] fixes both in one
//! left-to-right pass over lines.
//!
//! # Rules
//!
//! - A blank line directly after a list line is dropped (repeatedly, until a
//!   non-blank line is emitted)
//! - After a quote line whose next source line is not a quote, one blank line
//!   is inserted
//! - Every other line is emitted unchanged
//!
//! # Examples
//!
//! ```rust
//! use chat_transcript_markdown::cleanup::cleanup_markdown;
//!
//! assert_eq!(cleanup_markdown("- a\n\n- b"), "- a\n- b");
//! assert_eq!(cleanup_markdown("> quoted\nNext"), "> quoted\n\nNext");
//! ```

use regex::Regex;
use std::sync::OnceLock;

/// Returns true for bullet (`-`, `*`) and ordered (`1.`) list lines
///
/// Leading indentation is allowed; the marker must be followed by whitespace.
pub fn is_list_line(line: &str) -> bool {
    static LIST_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    let regex = LIST_REGEX.get_or_init(|| Regex::new(r"^\s*([-*]|\d+\.)\s").ok());
    regex.as_ref().is_some_and(|regex| regex.is_match(line))
}

/// Returns true if the trimmed line starts a quote
pub fn is_quote_line(line: &str) -> bool {
    line.trim().starts_with('>')
}

/// Tighten lists and separate quote blocks from what follows
pub fn cleanup_markdown(markdown: &str) -> String {
    let lines: Vec<&str> = markdown.lines().collect();
    let mut kept: Vec<&str> = Vec::with_capacity(lines.len());
    let mut prev_was_list = false;

    for (index, &line) in lines.iter().enumerate() {
        if line.trim().is_empty() && prev_was_list {
            continue;
        }

        kept.push(line);
        prev_was_list = is_list_line(line);

        if is_quote_line(line) {
            let next = lines.get(index + 1).copied().unwrap_or_default();
            if !is_quote_line(next) {
                kept.push("");
            }
        }
    }

    kept.join("\n")
}
