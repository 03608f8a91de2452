//! Fragment extraction from clipboard HTML payloads
//!
//! Browsers wrap copied markup in a full document shell and mark the copied
//! region with `<!--StartFragment-->` / `<!--EndFragment-->` comments. This
//! module isolates the region that actually holds the transcript.
//!
//! # Extraction Cascade
//!
//! 1. **Fragment markers**: the text strictly between the first start marker
//!    and the first end marker after it
//! 2. **Document bounds**: from the first `<html` through the last `</html>`
//!    (inclusive)
//! 3. **Raw passthrough**: the payload unchanged
//!
//! Extraction never fails.
//!
//! # Examples
//!
//! ```rust
//! use chat_transcript_markdown::fragment::extract_fragment;
//!
//! let raw = "<html><body><!--StartFragment--><p>Hi</p><!--EndFragment--></body></html>";
//! assert_eq!(extract_fragment(raw), "<p>Hi</p>");
//!
//! assert_eq!(extract_fragment("<p>bare</p>"), "<p>bare</p>");
//! ```

use regex::Regex;
use std::sync::OnceLock;

const HTML_OPEN: &str = "<html";
const HTML_CLOSE: &str = "</html>";

/// Where the extracted fragment came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentSource {
    /// Between `<!--StartFragment-->` and `<!--EndFragment-->`
    Markers,
    /// Between `<html` and `</html>`
    DocumentBounds,
    /// The payload as-is
    Raw,
}

/// Extract the transcript fragment from a raw clipboard payload
pub fn extract_fragment(raw: &str) -> &str {
    locate_fragment(raw).0
}

/// Extract the fragment and report which rule produced it
pub fn locate_fragment(raw: &str) -> (&str, FragmentSource) {
    if let Some(inner) = between_markers(raw) {
        return (inner, FragmentSource::Markers);
    }

    let Some(start) = raw.find(HTML_OPEN) else {
        return (raw, FragmentSource::Raw);
    };

    // A missing (or misplaced) closing tag keeps everything after `<html`
    let end = match raw.rfind(HTML_CLOSE) {
        Some(close) if close >= start => close + HTML_CLOSE.len(),
        _ => raw.len(),
    };

    (&raw[start..end], FragmentSource::DocumentBounds)
}

fn between_markers(raw: &str) -> Option<&str> {
    static MARKER_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    let regex = MARKER_REGEX
        .get_or_init(|| Regex::new(r"(?s)<!--StartFragment-->(.*?)<!--EndFragment-->").ok());
    let regex = regex.as_ref()?;

    regex
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_markers_take_priority() {
        let raw = "<html>A<!--StartFragment-->B<!--EndFragment-->C</html>";
        assert_eq!(locate_fragment(raw), ("B", FragmentSource::Markers));
    }

    #[test]
    fn test_markers_span_newlines() {
        let raw = "head<!--StartFragment-->\n<div>\nx\n</div>\n<!--EndFragment-->tail";
        assert_eq!(extract_fragment(raw), "\n<div>\nx\n</div>\n");
    }

    #[test]
    fn test_markers_non_greedy() {
        let raw = "<!--StartFragment-->one<!--EndFragment--> <!--StartFragment-->two<!--EndFragment-->";
        assert_eq!(extract_fragment(raw), "one");
    }

    #[test]
    fn test_empty_marker_interior() {
        assert_eq!(extract_fragment("x<!--StartFragment--><!--EndFragment-->y"), "");
    }

    #[test]
    fn test_start_marker_without_end_uses_document_bounds() {
        let raw = "Version:0.9\r\n<html><body><!--StartFragment--><p>x</p></body></html>\r\n";
        assert_eq!(
            locate_fragment(raw),
            (
                "<html><body><!--StartFragment--><p>x</p></body></html>",
                FragmentSource::DocumentBounds
            )
        );
    }

    #[test]
    fn test_html_tag_with_attributes() {
        let raw = "junk<html lang=\"en\"><body>x</body></html>junk";
        assert_eq!(
            extract_fragment(raw),
            "<html lang=\"en\"><body>x</body></html>"
        );
    }

    #[test]
    fn test_last_closing_tag_is_used() {
        let raw = "<html>a</html>b</html>c";
        assert_eq!(extract_fragment(raw), "<html>a</html>b</html>");
    }

    #[test]
    fn test_missing_closing_tag_runs_to_end() {
        assert_eq!(extract_fragment("pre<html><p>x"), "<html><p>x");
    }

    #[test]
    fn test_closing_before_opening_runs_to_end() {
        assert_eq!(extract_fragment("</html> then <html>x"), "<html>x");
    }

    #[test]
    fn test_raw_passthrough() {
        let raw = "<div data-message-author-role=\"user\">hi</div>";
        assert_eq!(locate_fragment(raw), (raw, FragmentSource::Raw));
    }

    #[test]
    fn test_uppercase_html_is_not_document_bounds() {
        let raw = "<HTML><p>x</p></HTML>";
        assert_eq!(locate_fragment(raw).1, FragmentSource::Raw);
    }

    proptest! {
        #[test]
        fn prop_plain_fragment_is_unchanged(text in "[a-zA-Z0-9 <>/=\"\n]{0,80}") {
            prop_assume!(!text.contains(HTML_OPEN));
            prop_assume!(!text.contains("<!--"));
            prop_assert_eq!(extract_fragment(&text), text.as_str());
        }

        #[test]
        fn prop_marker_interior_wins(
            before in "[a-z<>/ ]{0,30}",
            inner in "[a-zA-Z0-9<>/ \n]{0,40}",
            after in "[a-z<>/ ]{0,30}",
            wrap_in_html in any::<bool>(),
        ) {
            let (before, after) = if wrap_in_html {
                (format!("<html>{before}"), format!("{after}</html>"))
            } else {
                (before, after)
            };
            let raw = format!("{before}<!--StartFragment-->{inner}<!--EndFragment-->{after}");
            prop_assert_eq!(extract_fragment(&raw), inner.as_str());
        }
    }
}
