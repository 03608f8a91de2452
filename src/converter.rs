//! Markdown converter - transforms a document tree to Markdown
//!
//! This is the generic HTML to Markdown engine. The transcript renderer calls
//! it once per assistant turn (or once for the whole document when the
//! clipboard content has no chat structure), after code blocks have already
//! been swapped for placeholder tokens.
//!
//! # Conversion Strategy
//!
//! The converter walks the tree depth-first in document order and appends to
//! a single output buffer. Block elements make sure the buffer ends with a
//! block separator before and after their content; inline elements render
//! their children into a scratch buffer first so surrounding whitespace can
//! be placed outside the Markdown delimiters.
//!
//! Text is not Markdown-escaped. Placeholder tokens and literal characters
//! from the source survive byte for byte.
//!
//! # Element Handlers
//!
//! - **Headings (h1-h6)**: ATX-style (`#` to `######`)
//! - **Paragraphs and block containers**: separated by one blank line, or by a
//!   single newline when `single_line_break` is set
//! - **Links / images**: `[text](href)` / `![alt](src)`, dangerous schemes dropped
//! - **Lists**: `- ` bullets and numbered items (honouring `start`), nested
//!   lists indented under their parent item
//! - **Blockquotes**: every line prefixed with `> `
//! - **Code**: fenced (language from `language-*` / `lang-*` classes) or
//!   indented blocks, backtick-safe inline code
//! - **Formatting**: `**bold**`, `*italic*`, `~~strike~~` (GFM)
//! - **Tables**: GFM pipe tables (GFM flavor only)
//! - **Non-content** (`script`, `style`, `svg`, ...): removed
//!
//! # Output Normalization
//!
//! 1. **Line Endings**: LF only
//! 2. **Trailing Whitespace**: removed outside fenced code
//! 3. **Blank Lines**: consecutive blank lines collapsed outside fenced code
//! 4. **Wrapping**: plain paragraph lines wrapped at `line_width`, if set
//! 5. **Final Newline**: exactly one
//!
//! # Examples
//!
//! ```rust
//! use chat_transcript_markdown::converter::{ConversionOptions, MarkdownConverter};
//! use chat_transcript_markdown::parser::parse_html;
//!
//! let dom = parse_html("<h1>Title</h1><p>Hello <b>World</b></p>");
//! let converter = MarkdownConverter::with_options(ConversionOptions::transcript());
//! assert_eq!(converter.convert(&dom), "# Title\nHello **World**\n");
//! ```

use std::borrow::Cow;

use crate::cleanup::{is_list_line, is_quote_line};
use crate::dom::{Element, Node};
use crate::security::{SanitizeAction, SecurityValidator};

/// Elements rendered as standalone blocks
const BLOCK_CONTAINERS: &[&str] = &[
    "p",
    "div",
    "section",
    "article",
    "header",
    "footer",
    "main",
    "nav",
    "aside",
    "figure",
    "figcaption",
    "address",
    "details",
    "summary",
    "dl",
    "dt",
    "dd",
    "form",
    "fieldset",
    "center",
];

/// Markdown flavor selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkdownFlavor {
    /// CommonMark baseline
    CommonMark,
    /// GitHub Flavored Markdown (tables, strikethrough)
    GitHubFlavoredMarkdown,
}

/// How `pre` blocks are written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeBlockStyle {
    /// Backtick fences with an optional language tag
    Fenced,
    /// Four-space indentation
    Indented,
}

/// Table column alignment (GFM)
#[derive(Debug, Clone, Copy)]
enum TableAlignment {
    Left,
    Center,
    Right,
}

/// Conversion options
#[derive(Debug, Clone)]
pub struct ConversionOptions {
    /// Markdown flavor to generate
    pub flavor: MarkdownFlavor,
    /// Wrap plain paragraph lines at this many characters (`None`: never wrap)
    pub line_width: Option<usize>,
    /// Keep typographic Unicode characters instead of folding them to ASCII
    pub unicode_passthrough: bool,
    /// Separate blocks with one newline instead of a blank line
    pub single_line_break: bool,
    /// Style for `pre` blocks the converter meets directly
    pub code_block_style: CodeBlockStyle,
    /// Text emitted for `hr`
    pub horizontal_rule: String,
}

impl ConversionOptions {
    /// Rendering configuration for chat transcripts
    ///
    /// No hard wrapping, Unicode passed through, single line breaks between
    /// blocks, fenced code, GFM tables.
    pub fn transcript() -> Self {
        Self {
            flavor: MarkdownFlavor::GitHubFlavoredMarkdown,
            line_width: None,
            unicode_passthrough: true,
            single_line_break: true,
            code_block_style: CodeBlockStyle::Fenced,
            horizontal_rule: "* * *".to_string(),
        }
    }
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            flavor: MarkdownFlavor::CommonMark,
            line_width: Some(78),
            unicode_passthrough: false,
            single_line_break: false,
            code_block_style: CodeBlockStyle::Indented,
            horizontal_rule: "* * *".to_string(),
        }
    }
}

/// Main Markdown converter
///
/// Stateless between calls: one converter can render any number of trees.
///
/// # Usage
///
/// ```rust
/// use chat_transcript_markdown::converter::{ConversionOptions, MarkdownConverter, MarkdownFlavor};
/// use chat_transcript_markdown::parser::parse_html;
///
/// let options = ConversionOptions {
///     flavor: MarkdownFlavor::GitHubFlavoredMarkdown,
///     ..Default::default()
/// };
/// let converter = MarkdownConverter::with_options(options);
/// let markdown = converter.convert(&parse_html("<p><del>old</del> new</p>"));
/// assert_eq!(markdown, "~~old~~ new\n");
/// ```
pub struct MarkdownConverter {
    options: ConversionOptions,
    security_validator: SecurityValidator,
}

impl MarkdownConverter {
    /// Create a new converter with default options
    pub fn new() -> Self {
        Self::with_options(ConversionOptions::default())
    }

    /// Create a new converter with custom options
    pub fn with_options(options: ConversionOptions) -> Self {
        Self {
            options,
            security_validator: SecurityValidator::new(),
        }
    }

    /// Convert a document (or any subtree) to Markdown
    pub fn convert(&self, node: &Node) -> String {
        let mut output = String::with_capacity(1024);
        self.traverse_node(node, &mut output, 0);
        self.normalize_output(output)
    }

    /// Convert a single element and its descendants to Markdown
    pub fn convert_element(&self, element: &Element) -> String {
        let mut output = String::with_capacity(1024);
        self.handle_element(element, &mut output, 0);
        self.normalize_output(output)
    }

    fn traverse_node(&self, node: &Node, output: &mut String, depth: usize) {
        match node {
            Node::Document(children) => {
                for child in children {
                    self.traverse_node(child, output, depth);
                }
            }
            Node::Element(element) => self.handle_element(element, output, depth),
            Node::Text(text) => self.write_text(text, output),
            // Comments are ignored in Markdown output
            Node::Comment(_) => {}
        }
    }

    fn traverse_children(&self, element: &Element, output: &mut String, depth: usize) {
        for child in &element.children {
            self.traverse_node(child, output, depth + 1);
        }
    }

    /// Dispatch an element to its handler
    fn handle_element(&self, element: &Element, output: &mut String, depth: usize) {
        if self.security_validator.check_element(&element.name) == SanitizeAction::Remove {
            return;
        }
        if !self.security_validator.within_depth(depth) {
            return;
        }

        match element.name.as_str() {
            "h1" => self.handle_heading(element, 1, output, depth),
            "h2" => self.handle_heading(element, 2, output, depth),
            "h3" => self.handle_heading(element, 3, output, depth),
            "h4" => self.handle_heading(element, 4, output, depth),
            "h5" => self.handle_heading(element, 5, output, depth),
            "h6" => self.handle_heading(element, 6, output, depth),

            "br" => {
                trim_trailing_spaces(output);
                output.push('\n');
            }
            "hr" => {
                self.ensure_block_gap(output);
                output.push_str(&self.options.horizontal_rule);
                self.ensure_block_gap(output);
            }

            "a" => self.handle_link(element, output, depth),
            "img" => self.handle_image(element, output),

            "ul" => self.handle_list(element, output, depth, false),
            "ol" => self.handle_list(element, output, depth, true),
            "li" => {
                // List item outside a list
                self.ensure_block_gap(output);
                self.write_list_item(element, "- ", output, depth);
                self.ensure_block_gap(output);
            }

            "blockquote" => self.handle_blockquote(element, output, depth),

            "pre" => self.handle_code_block(element, output),
            "code" | "kbd" | "samp" | "tt" => self.handle_inline_code(element, output),

            "strong" | "b" => self.handle_emphasis(element, "**", output, depth),
            "em" | "i" => self.handle_emphasis(element, "*", output, depth),
            "del" | "s" | "strike"
                if self.options.flavor == MarkdownFlavor::GitHubFlavoredMarkdown =>
            {
                self.handle_emphasis(element, "~~", output, depth)
            }

            "table" if self.options.flavor == MarkdownFlavor::GitHubFlavoredMarkdown => {
                self.handle_table(element, output, depth)
            }

            name if BLOCK_CONTAINERS.contains(&name) => self.handle_block(element, output, depth),

            // Anything else is a transparent container
            _ => self.traverse_children(element, output, depth),
        }
    }

    /// Append a text node, collapsing whitespace runs to single spaces
    fn write_text(&self, text: &str, output: &mut String) {
        let normalized = normalize_text(text);
        if normalized.is_empty() {
            if !text.is_empty() && needs_space(output) {
                output.push(' ');
            }
            return;
        }

        if text.starts_with(char::is_whitespace) && needs_space(output) {
            output.push(' ');
        }
        output.push_str(&self.fold_unicode(&normalized));
        if text.ends_with(char::is_whitespace) {
            output.push(' ');
        }
    }

    /// Make sure the buffer ends with a block separator (no-op on an empty buffer)
    fn ensure_block_gap(&self, output: &mut String) {
        trim_trailing_spaces(output);
        if output.is_empty() {
            return;
        }

        let gap = if self.options.single_line_break {
            "\n"
        } else {
            "\n\n"
        };
        while !output.ends_with(gap) {
            output.push('\n');
        }
    }

    fn handle_block(&self, element: &Element, output: &mut String, depth: usize) {
        self.ensure_block_gap(output);
        let start_len = output.len();
        self.traverse_children(element, output, depth);
        if output.len() > start_len {
            self.ensure_block_gap(output);
        }
    }

    fn handle_heading(&self, element: &Element, level: usize, output: &mut String, depth: usize) {
        let mut content = String::new();
        self.traverse_children(element, &mut content, depth);
        let text = normalize_text(&content);
        if text.is_empty() {
            return;
        }

        self.ensure_block_gap(output);
        for _ in 0..level {
            output.push('#');
        }
        output.push(' ');
        output.push_str(&text);
        self.ensure_block_gap(output);
    }

    /// Links render as `[text](href)`; without a usable href only the text is kept
    fn handle_link(&self, element: &Element, output: &mut String, depth: usize) {
        let mut content = String::new();
        self.traverse_children(element, &mut content, depth);

        let target = element
            .attr("href")
            .map(str::trim)
            .filter(|href| !href.is_empty())
            .and_then(|href| self.security_validator.sanitize_url(href));

        match target {
            Some(url) => wrap_inline(output, &content, "[", &format!("]({url})")),
            None => wrap_inline(output, &content, "", ""),
        }
    }

    /// Images render as `![alt](src)`; missing or dangerous sources are skipped
    fn handle_image(&self, element: &Element, output: &mut String) {
        let Some(src) = element
            .attr("src")
            .map(str::trim)
            .filter(|src| !src.is_empty())
            .and_then(|src| self.security_validator.sanitize_url(src))
        else {
            return;
        };

        let alt = normalize_text(element.attr("alt").unwrap_or_default());
        output.push_str("![");
        output.push_str(&alt);
        output.push_str("](");
        output.push_str(src);
        output.push(')');
    }

    fn handle_list(&self, element: &Element, output: &mut String, depth: usize, ordered: bool) {
        self.ensure_block_gap(output);
        self.write_list(element, output, depth, ordered);
        self.ensure_block_gap(output);
    }

    /// Write list items, one per line, without surrounding separation
    fn write_list(&self, element: &Element, output: &mut String, depth: usize, ordered: bool) {
        let mut number = if ordered {
            element
                .attr("start")
                .and_then(|start| start.trim().parse::<usize>().ok())
                .unwrap_or(1)
        } else {
            1
        };

        for item in element.child_elements().filter(|child| child.is("li")) {
            let marker = if ordered {
                format!("{number}. ")
            } else {
                "- ".to_string()
            };
            number = number.saturating_add(1);
            self.write_list_item(item, &marker, output, depth + 1);
        }
    }

    /// Write one item; continuation lines are indented to the marker width
    fn write_list_item(&self, item: &Element, marker: &str, output: &mut String, depth: usize) {
        let mut body = String::new();
        for child in &item.children {
            match child {
                Node::Element(nested) if nested.is("ul") || nested.is("ol") => {
                    trim_trailing_spaces(&mut body);
                    if !body.is_empty() && !body.ends_with('\n') {
                        body.push('\n');
                    }
                    self.write_list(nested, &mut body, depth + 1, nested.is("ol"));
                }
                _ => self.traverse_node(child, &mut body, depth + 1),
            }
        }

        let body = body.trim();
        if body.is_empty() {
            output.push_str(marker.trim_end());
            output.push('\n');
            return;
        }

        let indent = " ".repeat(marker.len());
        for (index, line) in body.lines().enumerate() {
            if index == 0 {
                output.push_str(marker);
                output.push_str(line);
                continue;
            }
            output.push('\n');
            if !line.trim().is_empty() {
                output.push_str(&indent);
                output.push_str(line);
            }
        }
        output.push('\n');
    }

    fn handle_blockquote(&self, element: &Element, output: &mut String, depth: usize) {
        let mut body = String::new();
        self.traverse_children(element, &mut body, depth);
        let body = body.trim();
        if body.is_empty() {
            return;
        }

        self.ensure_block_gap(output);
        for (index, line) in body.lines().enumerate() {
            if index > 0 {
                output.push('\n');
            }
            if line.trim().is_empty() {
                output.push('>');
            } else {
                output.push_str("> ");
                output.push_str(line);
            }
        }
        self.ensure_block_gap(output);
    }

    /// Handle `pre` blocks the protector did not already replace
    fn handle_code_block(&self, element: &Element, output: &mut String) {
        let mut code = String::new();
        extract_code_content(&element.children, &mut code);
        let code = code.trim_end_matches('\n');

        self.ensure_block_gap(output);
        match self.options.code_block_style {
            CodeBlockStyle::Fenced => {
                let fence = fence_for(code);
                output.push_str(&fence);
                output.push_str(&detect_language(element));
                output.push('\n');
                if !code.is_empty() {
                    output.push_str(code);
                    output.push('\n');
                }
                output.push_str(&fence);
            }
            CodeBlockStyle::Indented => {
                for (index, line) in code.lines().enumerate() {
                    if index > 0 {
                        output.push('\n');
                    }
                    if !line.is_empty() {
                        output.push_str("    ");
                        output.push_str(line);
                    }
                }
            }
        }
        self.ensure_block_gap(output);
    }

    fn handle_inline_code(&self, element: &Element, output: &mut String) {
        let mut code = String::new();
        extract_code_content(&element.children, &mut code);
        let code = code.replace('\n', " ");
        if code.is_empty() {
            return;
        }

        let delimiter = "`".repeat(longest_backtick_run(&code) + 1);
        let padding = if code.starts_with('`') || code.ends_with('`') {
            " "
        } else {
            ""
        };
        output.push_str(&delimiter);
        output.push_str(padding);
        output.push_str(&code);
        output.push_str(padding);
        output.push_str(&delimiter);
    }

    fn handle_emphasis(&self, element: &Element, delimiter: &str, output: &mut String, depth: usize) {
        let mut content = String::new();
        self.traverse_children(element, &mut content, depth);
        wrap_inline(output, &content, delimiter, delimiter);
    }

    /// Render a GFM pipe table
    ///
    /// The first row is the header whether it uses `th` or `td`. Short rows
    /// are padded with empty cells; `|` inside cells is escaped.
    fn handle_table(&self, element: &Element, output: &mut String, depth: usize) {
        let rows = table_rows(element);
        let Some(header_row) = rows.first() else {
            return;
        };

        let mut rendered: Vec<Vec<String>> = Vec::with_capacity(rows.len());
        for row in &rows {
            let cells = row
                .child_elements()
                .filter(|cell| cell.is("th") || cell.is("td"))
                .map(|cell| {
                    let mut content = String::new();
                    self.traverse_children(cell, &mut content, depth + 2);
                    normalize_text(&content).replace('|', "\\|")
                })
                .collect();
            rendered.push(cells);
        }

        let columns = rendered.iter().map(Vec::len).max().unwrap_or(0);
        if columns == 0 {
            return;
        }

        let alignments: Vec<TableAlignment> = header_row
            .child_elements()
            .filter(|cell| cell.is("th") || cell.is("td"))
            .map(extract_alignment)
            .collect();

        self.ensure_block_gap(output);
        for (index, cells) in rendered.iter().enumerate() {
            write_table_row(output, cells, columns);
            if index == 0 {
                output.push('|');
                for column in 0..columns {
                    let alignment = alignments
                        .get(column)
                        .copied()
                        .unwrap_or(TableAlignment::Left);
                    output.push_str(match alignment {
                        TableAlignment::Left => " --- |",
                        TableAlignment::Center => " :---: |",
                        TableAlignment::Right => " ---: |",
                    });
                }
                output.push('\n');
            }
        }
        self.ensure_block_gap(output);
    }

    fn fold_unicode<'a>(&self, text: &'a str) -> Cow<'a, str> {
        if self.options.unicode_passthrough || text.is_ascii() {
            return Cow::Borrowed(text);
        }

        let mut folded = String::with_capacity(text.len());
        for ch in text.chars() {
            match ch {
                '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{2032}' => folded.push('\''),
                '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{2033}' => folded.push('"'),
                '\u{2013}' => folded.push('-'),
                '\u{2014}' => folded.push_str("--"),
                '\u{2026}' => folded.push_str("..."),
                '\u{2022}' => folded.push('*'),
                '\u{00A0}' => folded.push(' '),
                '\u{00AB}' => folded.push_str("<<"),
                '\u{00BB}' => folded.push_str(">>"),
                '\u{00A9}' => folded.push_str("(C)"),
                '\u{00AE}' => folded.push_str("(R)"),
                '\u{2122}' => folded.push_str("(TM)"),
                _ => folded.push(ch),
            }
        }
        Cow::Owned(folded)
    }

    /// Normalize final output for deterministic Markdown
    ///
    /// Fenced code is copied through untouched. Elsewhere trailing whitespace
    /// is removed, blank-line runs collapse to one, and plain lines are
    /// wrapped when a line width is configured.
    fn normalize_output(&self, output: String) -> String {
        let output = output.replace("\r\n", "\n");
        let mut result = String::with_capacity(output.len());
        let mut prev_blank = false;
        let mut open_fence: Option<String> = None;

        for line in output.lines() {
            if let Some(fence) = &open_fence {
                result.push_str(line);
                result.push('\n');
                if closes_fence(line, fence) {
                    open_fence = None;
                }
                continue;
            }

            let trimmed = line.trim_end();
            if trimmed.is_empty() {
                if !prev_blank && !result.is_empty() {
                    result.push('\n');
                }
                prev_blank = true;
                continue;
            }
            prev_blank = false;

            if let Some(fence) = opening_fence(trimmed) {
                open_fence = Some(fence);
                result.push_str(trimmed);
                result.push('\n');
                continue;
            }

            match self.options.line_width {
                Some(width) if is_wrappable(trimmed, width) => wrap_line(trimmed, width, &mut result),
                _ => {
                    result.push_str(trimmed);
                    result.push('\n');
                }
            }
        }

        while result.ends_with("\n\n") {
            result.pop();
        }
        result
    }
}

impl Default for MarkdownConverter {
    fn default() -> Self {
        Self::new()
    }
}

/// Collapse whitespace runs (including newlines) to single spaces and trim
fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn needs_space(output: &str) -> bool {
    !output.is_empty() && !output.ends_with(char::is_whitespace)
}

fn trim_trailing_spaces(output: &mut String) {
    while output.ends_with(' ') || output.ends_with('\t') {
        output.pop();
    }
}

/// Wrap inline content in delimiters, keeping its outer whitespace outside them
fn wrap_inline(output: &mut String, content: &str, open: &str, close: &str) {
    let inner = content.trim();
    if inner.is_empty() {
        if !content.is_empty() && needs_space(output) {
            output.push(' ');
        }
        return;
    }

    if content.starts_with(char::is_whitespace) && needs_space(output) {
        output.push(' ');
    }
    output.push_str(open);
    output.push_str(inner);
    output.push_str(close);
    if content.ends_with(char::is_whitespace) {
        output.push(' ');
    }
}

/// Raw text of code, with `<br>` turned into newlines
fn extract_code_content(nodes: &[Node], output: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => output.push_str(text),
            Node::Element(element) if element.is("br") => output.push('\n'),
            Node::Element(element) => extract_code_content(&element.children, output),
            Node::Document(children) => extract_code_content(children, output),
            Node::Comment(_) => {}
        }
    }
}

/// Language tag from the first `code` descendant's `language-*` / `lang-*` class
fn detect_language(pre: &Element) -> String {
    pre.find_descendant(|element| element.is("code"))
        .and_then(|code| {
            code.classes().find_map(|class| {
                class
                    .strip_prefix("language-")
                    .or_else(|| class.strip_prefix("lang-"))
            })
        })
        .unwrap_or_default()
        .to_string()
}

fn longest_backtick_run(text: &str) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for ch in text.chars() {
        if ch == '`' {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

/// A fence longer than any backtick run in the code (at least three)
fn fence_for(code: &str) -> String {
    "`".repeat((longest_backtick_run(code) + 1).max(3))
}

fn opening_fence(line: &str) -> Option<String> {
    let stripped = line.trim_start();
    let run = stripped.chars().take_while(|&ch| ch == '`').count();
    (run >= 3).then(|| "`".repeat(run))
}

fn closes_fence(line: &str, fence: &str) -> bool {
    let trimmed = line.trim();
    trimmed.len() >= fence.len() && trimmed.chars().all(|ch| ch == '`')
}

/// Rows of a table in order, looking through `thead`/`tbody`/`tfoot`
fn table_rows(table: &Element) -> Vec<&Element> {
    let mut rows = Vec::new();
    for child in table.child_elements() {
        match child.name.as_str() {
            "tr" => rows.push(child),
            "thead" | "tbody" | "tfoot" => {
                rows.extend(child.child_elements().filter(|row| row.is("tr")));
            }
            _ => {}
        }
    }
    rows
}

fn write_table_row(output: &mut String, cells: &[String], columns: usize) {
    output.push('|');
    for column in 0..columns {
        output.push(' ');
        if let Some(cell) = cells.get(column) {
            output.push_str(cell);
        }
        output.push_str(" |");
    }
    output.push('\n');
}

/// Alignment from the `align` attribute, then from a `text-align` style
fn extract_alignment(cell: &Element) -> TableAlignment {
    if let Some(align) = cell.attr("align") {
        return match align.to_lowercase().as_str() {
            "center" => TableAlignment::Center,
            "right" => TableAlignment::Right,
            _ => TableAlignment::Left,
        };
    }

    if let Some(style) = cell.attr("style") {
        let style = style.to_lowercase();
        if style.contains("text-align") {
            if style.contains("center") {
                return TableAlignment::Center;
            } else if style.contains("right") {
                return TableAlignment::Right;
            }
        }
    }

    TableAlignment::Left
}

/// Plain paragraph lines longer than `width`; structure lines are never wrapped
fn is_wrappable(line: &str, width: usize) -> bool {
    line.chars().count() > width
        && !line.starts_with(' ')
        && !line.starts_with('#')
        && !line.starts_with('|')
        && !is_list_line(line)
        && !is_quote_line(line)
}

/// Greedy word wrap
///
/// A word that would start a continuation line as a list marker, heading or
/// quote stays on the current line instead.
fn wrap_line(line: &str, width: usize, result: &mut String) {
    let mut current = String::new();
    for word in line.split(' ').filter(|word| !word.is_empty()) {
        let fits = current.chars().count() + 1 + word.chars().count() <= width;
        if current.is_empty() || fits || starts_structure(word) {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
            continue;
        }
        result.push_str(&current);
        result.push('\n');
        current = word.to_string();
    }
    result.push_str(&current);
    result.push('\n');
}

fn starts_structure(word: &str) -> bool {
    word.starts_with('#') || word.starts_with('>') || is_list_line(&format!("{word} "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_html;
    use proptest::prelude::*;

    fn convert_with(options: ConversionOptions, html: &str) -> String {
        MarkdownConverter::with_options(options).convert(&parse_html(html))
    }

    fn transcript(html: &str) -> String {
        convert_with(ConversionOptions::transcript(), html)
    }

    fn blank_line_separated(html: &str) -> String {
        convert_with(
            ConversionOptions {
                single_line_break: false,
                ..ConversionOptions::transcript()
            },
            html,
        )
    }

    #[test]
    fn test_heading_and_paragraph_blank_line_mode() {
        assert_eq!(
            blank_line_separated("<h1>Title</h1><p>Hello <b>World</b></p>"),
            "# Title\n\nHello **World**\n"
        );
    }

    #[test]
    fn test_single_line_break_mode() {
        assert_eq!(
            transcript("<p>First</p><p>Second</p><h2>Sub</h2><p>Third</p>"),
            "First\nSecond\n## Sub\nThird\n"
        );
    }

    #[test]
    fn test_all_heading_levels() {
        let markdown = transcript("<h1>1</h1><h2>2</h2><h3>3</h3><h4>4</h4><h5>5</h5><h6>6</h6>");
        assert_eq!(markdown, "# 1\n## 2\n### 3\n#### 4\n##### 5\n###### 6\n");
    }

    #[test]
    fn test_empty_heading_is_dropped() {
        assert_eq!(transcript("<h2>  </h2><p>x</p>"), "x\n");
    }

    #[test]
    fn test_whitespace_collapsed_in_text() {
        assert_eq!(transcript("<p>Text   with\n   newlines</p>"), "Text with newlines\n");
    }

    #[test]
    fn test_space_between_inline_elements() {
        assert_eq!(transcript("<p><b>a</b> <i>b</i></p>"), "**a** *b*\n");
        assert_eq!(transcript("<p>a<em> b </em>c</p>"), "a *b* c\n");
    }

    #[test]
    fn test_line_break() {
        assert_eq!(transcript("<p>a<br>b</p>"), "a\nb\n");
    }

    #[test]
    fn test_horizontal_rule() {
        assert_eq!(blank_line_separated("<p>a</p><hr><p>b</p>"), "a\n\n* * *\n\nb\n");
    }

    #[test]
    fn test_links() {
        assert_eq!(
            transcript(r#"<p><a href="https://x.io">X</a> and <a href="javascript:alert(1)">bad</a></p>"#),
            "[X](https://x.io) and bad\n"
        );
        assert_eq!(transcript("<p><a>plain</a></p>"), "plain\n");
        assert_eq!(transcript(r#"<p><a href="/x"> </a>end</p>"#), "end\n");
    }

    #[test]
    fn test_link_with_inline_code() {
        assert_eq!(
            transcript(r#"<p><a href="/docs"><code>run()</code> docs</a></p>"#),
            "[`run()` docs](/docs)\n"
        );
    }

    #[test]
    fn test_images() {
        assert_eq!(transcript(r#"<img src="a.png" alt="Alt">"#), "![Alt](a.png)\n");
        assert_eq!(transcript(r#"<p>x<img alt="none"></p>"#), "x\n");
        assert_eq!(transcript(r#"<p>x<img src="data:image/png;base64,AA"></p>"#), "x\n");
    }

    #[test]
    fn test_nested_and_ordered_lists() {
        let html = r#"<ul><li>a</li><li>b<ul><li>c</li></ul></li></ul><ol start="3"><li>x</li><li>y</li></ol>"#;
        assert_eq!(blank_line_separated(html), "- a\n- b\n  - c\n\n3. x\n4. y\n");
    }

    #[test]
    fn test_ordered_list_start_at_limit() {
        let html = format!(r#"<ol start="{}"><li>a</li><li>b</li></ol>"#, usize::MAX);
        assert_eq!(
            transcript(&html),
            format!("{max}. a\n{max}. b\n", max = usize::MAX)
        );
    }

    #[test]
    fn test_list_item_with_paragraphs() {
        let html = "<ol><li><p>one</p><p>more</p></li><li><p>two</p></li></ol>";
        assert_eq!(blank_line_separated(html), "1. one\n\n   more\n2. two\n");
    }

    #[test]
    fn test_empty_list_item() {
        assert_eq!(transcript("<ul><li></li><li>b</li></ul>"), "-\n- b\n");
    }

    #[test]
    fn test_blockquote() {
        assert_eq!(
            blank_line_separated("<blockquote><p>Quote</p><p>More</p></blockquote><p>After</p>"),
            "> Quote\n>\n> More\n\nAfter\n"
        );
    }

    #[test]
    fn test_fenced_code_block_with_language() {
        assert_eq!(
            transcript("<pre><code class=\"hljs language-python\">print(1)\n</code></pre>"),
            "```python\nprint(1)\n```\n"
        );
    }

    #[test]
    fn test_fenced_code_block_lang_prefix() {
        assert_eq!(
            transcript("<pre><code class=\"lang-js\">x()</code></pre>"),
            "```js\nx()\n```\n"
        );
    }

    #[test]
    fn test_fence_longer_than_backticks_in_code() {
        assert_eq!(
            transcript("<pre><code>```\ninner\n```</code></pre>"),
            "````\n```\ninner\n```\n````\n"
        );
    }

    #[test]
    fn test_code_block_preserves_whitespace_and_blank_lines() {
        let markdown = transcript("<pre><code>fn  x() {\n\n\n    let  a = 1;  \n}</code></pre>");
        assert_eq!(markdown, "```\nfn  x() {\n\n\n    let  a = 1;  \n}\n```\n");
    }

    #[test]
    fn test_indented_code_block() {
        let options = ConversionOptions::default();
        assert_eq!(convert_with(options, "<pre>a\n  b</pre>"), "    a\n      b\n");
    }

    #[test]
    fn test_inline_code() {
        assert_eq!(transcript("<p>Use <code>a`b</code> now</p>"), "Use ``a`b`` now\n");
        assert_eq!(transcript("<p><code>`x`</code></p>"), "`` `x` ``\n");
        assert_eq!(transcript("<p>a<code></code>b</p>"), "ab\n");
    }

    #[test]
    fn test_strikethrough_depends_on_flavor() {
        assert_eq!(transcript("<p><s>gone</s></p>"), "~~gone~~\n");
        let options = ConversionOptions {
            flavor: MarkdownFlavor::CommonMark,
            ..ConversionOptions::transcript()
        };
        assert_eq!(convert_with(options, "<p><s>gone</s></p>"), "gone\n");
    }

    #[test]
    fn test_gfm_table() {
        let html = r#"<table><thead><tr><th>A</th><th align="right">B</th><th style="text-align: center">C</th></tr></thead>
            <tbody><tr><td>1</td><td>x|y</td></tr></tbody></table>"#;
        assert_eq!(
            transcript(html),
            "| A | B | C |\n| --- | ---: | :---: |\n| 1 | x\\|y |  |\n"
        );
    }

    #[test]
    fn test_table_without_gfm_is_container() {
        let options = ConversionOptions {
            flavor: MarkdownFlavor::CommonMark,
            ..ConversionOptions::transcript()
        };
        let markdown = convert_with(options, "<table><tr><td><p>A</p></td><td><p>B</p></td></tr></table>");
        assert_eq!(markdown, "A\nB\n");
    }

    #[test]
    fn test_non_content_elements_removed() {
        let markdown = transcript(
            "<html><head><title>T</title><style>p{}</style></head><body><p>Before</p>\
             <script>alert('x')</script><svg><text>icon</text></svg><p>After</p></body></html>",
        );
        assert_eq!(markdown, "Before\nAfter\n");
    }

    #[test]
    fn test_unicode_folding() {
        let html = "<p>\u{201C}Hi\u{201D} \u{2014} it\u{2019}s\u{2026}</p>";
        let options = ConversionOptions {
            line_width: None,
            ..Default::default()
        };
        assert_eq!(convert_with(options, html), "\"Hi\" -- it's...\n");
        assert_eq!(transcript(html), "\u{201C}Hi\u{201D} \u{2014} it\u{2019}s\u{2026}\n");
    }

    #[test]
    fn test_line_wrapping() {
        let options = ConversionOptions {
            line_width: Some(20),
            ..ConversionOptions::transcript()
        };
        assert_eq!(
            convert_with(options.clone(), "<p>one two three four five six seven</p>"),
            "one two three four\nfive six seven\n"
        );
        // List lines are never wrapped
        assert_eq!(
            convert_with(options, "<ul><li>one two three four five six seven</li></ul>"),
            "- one two three four five six seven\n"
        );
        assert_eq!(
            transcript("<p>one two three four five six seven</p>"),
            "one two three four five six seven\n"
        );
    }

    #[test]
    fn test_wrap_keeps_markers_off_line_start() {
        let mut result = String::new();
        wrap_line("aaaa bbbb - cccc", 9, &mut result);
        assert_eq!(result, "aaaa bbbb -\ncccc\n");
    }

    #[test]
    fn test_placeholder_tokens_pass_through() {
        assert_eq!(
            transcript("<p>Intro</p>@@CODE0@@<p>Outro</p>"),
            "Intro\n@@CODE0@@\nOutro\n"
        );
    }

    #[test]
    fn test_convert_element_subtree() {
        let doc = parse_html(r#"<div class="markdown"><p>Only</p></div><p>Outside</p>"#);
        let div = doc.elements_where(|e| e.has_class("markdown"))[0];
        let converter = MarkdownConverter::with_options(ConversionOptions::transcript());
        assert_eq!(converter.convert_element(div), "Only\n");
    }

    #[test]
    fn test_empty_document() {
        assert_eq!(transcript(""), "");
        assert_eq!(transcript("<div> </div>"), "");
    }

    #[test]
    fn test_deterministic_output() {
        let html = "<h1>T</h1><ul><li>a</li></ul><pre><code>x</code></pre><table><tr><td>1</td></tr></table>";
        assert_eq!(transcript(html), transcript(html));
    }

    proptest! {
        #[test]
        fn prop_paragraph_text_preserved(words in prop::collection::vec("[a-zA-Z0-9]{1,12}", 1..12)) {
            let text = words.join(" ");
            let markdown = transcript(&format!("<p>{text}</p>"));
            prop_assert_eq!(markdown, format!("{text}\n"));
        }

        #[test]
        fn prop_fenced_code_body_is_verbatim(body in "[a-zA-Z0-9 (){};=\n]{1,80}") {
            prop_assume!(!body.trim_end_matches('\n').is_empty());
            let escaped = body.replace('&', "&amp;").replace('<', "&lt;");
            let markdown = transcript(&format!("<pre><code>{escaped}</code></pre>"));
            let expected_body = body.trim_end_matches('\n');
            prop_assert_eq!(markdown, format!("```\n{expected_body}\n```\n"));
        }

        #[test]
        fn prop_wrapped_lines_respect_width(
            words in prop::collection::vec("[a-z]{1,8}", 1..30),
            width in 10usize..40,
        ) {
            let options = ConversionOptions { line_width: Some(width), ..ConversionOptions::transcript() };
            let markdown = convert_with(options, &format!("<p>{}</p>", words.join(" ")));
            for line in markdown.lines() {
                prop_assert!(line.chars().count() <= width, "line too long: {:?}", line);
            }
            prop_assert_eq!(markdown.split_whitespace().collect::<Vec<_>>(), words.iter().map(String::as_str).collect::<Vec<_>>());
        }
    }
}
