//! Code block protection
//!
//! The generic Markdown engine collapses whitespace and knows nothing about
//! the syntax-highlighting markup chat UIs put inside code. Before rendering,
//! every qualifying `pre` block is therefore turned into finished fenced
//! Markdown and replaced in the tree by a plain-text token. The renderer
//! copies tokens through untouched and [`Placeholders::substitute`] swaps
//! them back afterwards.
//!
//! # Qualifying Blocks
//!
//! A `pre` element with a `code` descendant, unless it sits inside a
//! user-authored turn. User code stays in the user's text.
//!
//! # Code Markup Rules
//!
//! Applied in order to the `code` element's inner markup:
//!
//! 1. `<br>` tags become newlines
//! 2. `<span>` / `</span>` tags are removed, their text kept
//! 3. `&nbsp;`, `&lt;`, `&gt;`, `&amp;` are unescaped, `&amp;` last
//! 4. A newline directly before punctuation or an operator is removed
//! 5. The result is trimmed and fenced with the `language-*` class as tag
//!
//! # Tokens
//!
//! Tokens are `@@CODE0@@`, `@@CODE1@@`, ... in document order. If the
//! document already contains `@@CODE`, a salt is added to the prefix
//! (`@@CODE-1-0@@`) so no token can match existing text.
//!
//! # Examples
//!
//! ```rust
//! use chat_transcript_markdown::parser::parse_html;
//! use chat_transcript_markdown::protect::protect;
//! use chat_transcript_markdown::transcript::TranscriptOptions;
//!
//! let dom = parse_html(r#"<pre><code class="language-rust">let x = 1;</code></pre>"#);
//! let protected = protect(&dom, &TranscriptOptions::default());
//! assert_eq!(protected.placeholders.get("@@CODE0@@"), Some("\n```rust\nlet x = 1;\n```\n"));
//! assert!(protected.document.mentions("@@CODE0@@"));
//! ```

use regex::Regex;
use std::sync::OnceLock;

use crate::dom::{Element, Node};
use crate::security::{SanitizeAction, SecurityValidator};
use crate::transcript::TranscriptOptions;

const TOKEN_PREFIX: &str = "@@CODE";
const TOKEN_SUFFIX: &str = "@@";

/// Characters that absorb a newline directly in front of them
const JOIN_BEFORE: &[char] = &[
    '(', ')', '[', ']', '{', '}', '"', '\'', '.', ',', ';', ':', '+', '-', '*', '/', '%', '<',
    '>', '=',
];

/// Ordered token to fenced-code table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Placeholders {
    entries: Vec<(String, String)>,
}

impl Placeholders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fenced Markdown stored for `token`
    pub fn get(&self, token: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(candidate, _)| candidate == token)
            .map(|(_, markdown)| markdown.as_str())
    }

    /// Tokens and their Markdown in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(token, markdown)| (token.as_str(), markdown.as_str()))
    }

    /// Replace every token occurring in `text` with its Markdown
    ///
    /// Plain string replacement; the Markdown is not escaped or re-parsed.
    pub fn substitute(&self, text: &str) -> String {
        let mut output = text.to_string();
        for (token, markdown) in &self.entries {
            if output.contains(token.as_str()) {
                output = output.replace(token.as_str(), markdown);
            }
        }
        output
    }

    fn push(&mut self, token: String, markdown: String) {
        self.entries.push((token, markdown));
    }
}

/// A document with code blocks replaced by tokens, plus the token table
#[derive(Debug, Clone)]
pub struct ProtectedDocument {
    pub document: Node,
    pub placeholders: Placeholders,
}

/// Replace qualifying code blocks with placeholder tokens
///
/// The input tree is left untouched; a new tree is returned.
pub fn protect(document: &Node, options: &TranscriptOptions) -> ProtectedDocument {
    let mut blocks = Vec::new();
    collect_code_blocks(document, false, options, &mut blocks);
    let fenced: Vec<String> = blocks.into_iter().map(render_code_block).collect();

    let prefix = token_prefix(document, &fenced);
    let mut placeholders = Placeholders::new();
    let mut fenced = fenced.into_iter();
    let document = rebuild(document, false, options, &mut |_| {
        let token = format!("{prefix}{}{TOKEN_SUFFIX}", placeholders.len());
        let markdown = fenced.next().unwrap_or_default();
        placeholders.push(token.clone(), markdown);
        Node::Text(token)
    });

    tracing::debug!(
        protected_blocks = placeholders.len(),
        token_prefix = %prefix,
        "Protected code blocks"
    );

    ProtectedDocument {
        document,
        placeholders,
    }
}

/// The `code` element of a qualifying `pre`, if `element` is one
fn qualifying_code(element: &Element, in_user_turn: bool) -> Option<&Element> {
    if in_user_turn || !element.is("pre") {
        return None;
    }
    element.find_descendant(|descendant| descendant.is("code"))
}

fn collect_code_blocks<'a>(
    node: &'a Node,
    in_user_turn: bool,
    options: &TranscriptOptions,
    blocks: &mut Vec<&'a Element>,
) {
    let in_user_turn = match node {
        Node::Element(element) => {
            let in_user_turn = in_user_turn || options.is_user_turn(element);
            if let Some(code) = qualifying_code(element, in_user_turn) {
                blocks.push(code);
                return;
            }
            in_user_turn
        }
        _ => in_user_turn,
    };

    for child in node.children() {
        collect_code_blocks(child, in_user_turn, options, blocks);
    }
}

fn rebuild<F>(node: &Node, in_user_turn: bool, options: &TranscriptOptions, replace: &mut F) -> Node
where
    F: FnMut(&Element) -> Node,
{
    match node {
        Node::Element(element) => {
            let in_user_turn = in_user_turn || options.is_user_turn(element);
            if let Some(code) = qualifying_code(element, in_user_turn) {
                return replace(code);
            }
            Node::Element(Element {
                name: element.name.clone(),
                attrs: element.attrs.clone(),
                children: element
                    .children
                    .iter()
                    .map(|child| rebuild(child, in_user_turn, options, replace))
                    .collect(),
            })
        }
        Node::Document(children) => Node::Document(
            children
                .iter()
                .map(|child| rebuild(child, in_user_turn, options, replace))
                .collect(),
        ),
        Node::Text(_) | Node::Comment(_) => node.clone(),
    }
}

/// Smallest prefix that appears neither in the document nor in any code block
///
/// Both the raw text and the text left once removed elements are skipped
/// are checked, so text on either side of a dropped `<script>` cannot join
/// into a token.
fn token_prefix(document: &Node, fenced: &[String]) -> String {
    let text = document.text_content();
    let mut visible = String::with_capacity(text.len());
    collect_visible_text(document, &SecurityValidator::new(), &mut visible);

    let taken = |prefix: &str| {
        document.mentions(prefix)
            || text.contains(prefix)
            || visible.contains(prefix)
            || fenced.iter().any(|markdown| markdown.contains(prefix))
    };

    if !taken(TOKEN_PREFIX) {
        return TOKEN_PREFIX.to_string();
    }

    let mut salt = 1usize;
    loop {
        let prefix = format!("{TOKEN_PREFIX}-{salt}-");
        if !taken(&prefix) {
            return prefix;
        }
        salt += 1;
    }
}

/// Text the converter can emit: removed elements and comments skipped
fn collect_visible_text(node: &Node, validator: &SecurityValidator, output: &mut String) {
    match node {
        Node::Text(text) => output.push_str(text),
        Node::Comment(_) => {}
        Node::Element(element)
            if validator.check_element(&element.name) == SanitizeAction::Remove => {}
        Node::Element(_) | Node::Document(_) => {
            for child in node.children() {
                collect_visible_text(child, validator, output);
            }
        }
    }
}

/// Turn a `code` element into fenced Markdown
pub fn render_code_block(code: &Element) -> String {
    let language = code_language(code);
    let markup = code.inner_html();
    let text = replace_line_breaks(&markup);
    let text = strip_span_tags(&text);
    let text = unescape_entities(&text);
    let text = join_wrapped_punctuation(&text);
    fence_code(&language, text.trim())
}

/// First `language-*` class of a `code` element, without the prefix
pub fn code_language(code: &Element) -> String {
    code.classes()
        .find_map(|class| class.strip_prefix("language-"))
        .unwrap_or_default()
        .to_string()
}

pub fn replace_line_breaks(markup: &str) -> String {
    static BR_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    let regex = BR_REGEX.get_or_init(|| Regex::new(r"(?i)<br\s*/?>").ok());
    match regex {
        Some(regex) => regex.replace_all(markup, "\n").into_owned(),
        None => markup.to_string(),
    }
}

/// Remove `<span ...>` and `</span>` tags, keeping what is between them
pub fn strip_span_tags(markup: &str) -> String {
    static SPAN_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    let regex = SPAN_REGEX.get_or_init(|| Regex::new(r"</?span[^>]*>").ok());
    match regex {
        Some(regex) => regex.replace_all(markup, "").into_owned(),
        None => markup.to_string(),
    }
}

/// Unescape the four entities the serializer produces
///
/// `&amp;` goes last so `&amp;lt;` becomes `&lt;`, not `<`.
pub fn unescape_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Drop a newline that directly precedes punctuation or an operator
pub fn join_wrapped_punctuation(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\n' && chars.peek().is_some_and(|next| JOIN_BEFORE.contains(next)) {
            continue;
        }
        output.push(ch);
    }
    output
}

/// Fence `body` with a surrounding newline on each side
pub fn fence_code(language: &str, body: &str) -> String {
    format!("\n```{language}\n{body}\n```\n")
}
