//! Content filtering for clipboard HTML
//!
//! Clipboard payloads carry more than the visible transcript: inline styles,
//! scripts, SVG icons, templates. This module decides which elements are
//! dropped from Markdown output, which link targets are unsafe to keep, and
//! how deep the document tree may nest.
//!
//! # Defense Layers
//!
//! 1. **Depth bound**: trees deeper than the limit are truncated at parse time
//! 2. **Element skipping**: non-content elements are removed with their children
//! 3. **URL filtering**: `javascript:`, `data:` and similar targets are not emitted

/// Maximum allowed nesting depth for HTML elements
/// Prevents stack overflow in the recursive conversion stages
const MAX_NESTING_DEPTH: usize = 256;

/// Elements removed together with their children
const SKIPPED_ELEMENTS: &[&str] = &[
    "script",   // JavaScript
    "style",    // CSS
    "noscript", // Alternative content
    "template", // Inert markup
    "head",     // Document metadata
    "title",    // Document title, not transcript content
    "meta",
    "link",
    "base",
    "iframe",
    "object",
    "embed",
    "applet",
    "svg", // Icons in chat UI chrome
    "canvas",
];

/// URL schemes that are never emitted as link or image targets
const DANGEROUS_URL_SCHEMES: &[&str] = &["javascript:", "data:", "vbscript:", "file:", "about:"];

/// Action to take for an element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SanitizeAction {
    /// Convert the element
    Allow,
    /// Remove the element and all its children
    Remove,
}

/// Security validator for document trees
#[derive(Debug, Clone)]
pub struct SecurityValidator {
    max_depth: usize,
}

impl SecurityValidator {
    /// Create a validator with the default depth limit
    pub fn new() -> Self {
        Self {
            max_depth: MAX_NESTING_DEPTH,
        }
    }

    /// Create a validator with a custom depth limit
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self { max_depth }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Decide what to do with an element
    ///
    /// # Examples
    ///
    /// ```
    /// use chat_transcript_markdown::security::{SanitizeAction, SecurityValidator};
    ///
    /// let validator = SecurityValidator::new();
    /// assert_eq!(validator.check_element("script"), SanitizeAction::Remove);
    /// assert_eq!(validator.check_element("div"), SanitizeAction::Allow);
    /// ```
    pub fn check_element(&self, tag_name: &str) -> SanitizeAction {
        if SKIPPED_ELEMENTS.contains(&tag_name) {
            SanitizeAction::Remove
        } else {
            SanitizeAction::Allow
        }
    }

    /// Returns true if the URL uses a dangerous scheme
    pub fn is_dangerous_url(&self, url: &str) -> bool {
        let url_lower = url.trim().to_lowercase();
        DANGEROUS_URL_SCHEMES
            .iter()
            .any(|scheme| url_lower.starts_with(scheme))
    }

    /// Returns `None` if the URL is dangerous, `Some(url)` otherwise
    ///
    /// # Examples
    ///
    /// ```
    /// use chat_transcript_markdown::security::SecurityValidator;
    ///
    /// let validator = SecurityValidator::new();
    /// assert_eq!(validator.sanitize_url("javascript:alert('xss')"), None);
    /// assert_eq!(validator.sanitize_url("https://example.com"), Some("https://example.com"));
    /// ```
    pub fn sanitize_url<'a>(&self, url: &'a str) -> Option<&'a str> {
        if self.is_dangerous_url(url) {
            None
        } else {
            Some(url)
        }
    }

    /// Returns true if an element at `depth` may be kept
    pub fn within_depth(&self, depth: usize) -> bool {
        depth <= self.max_depth
    }
}

impl Default for SecurityValidator {
    fn default() -> Self {
        Self::new()
    }
}
