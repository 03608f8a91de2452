//! Owned document tree
//!
//! html5ever hands back a reference-counted tree with interior mutability.
//! The conversion pipeline instead works on this plain owned tree: it is
//! built once per conversion, never mutated, and stages that need a changed
//! document (code block protection) build a new one.

/// HTML elements that never have children or a closing tag
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// Elements whose text children are serialized without escaping
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "style", "script", "xmp", "iframe", "noembed", "noframes", "plaintext",
];

/// A node in the document tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Document root
    Document(Vec<Node>),
    /// Element with attributes and children
    Element(Element),
    /// Character data, entities already decoded
    Text(String),
    /// Comment contents
    Comment(String),
}

/// An element node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Lowercase local tag name
    pub name: String,
    /// Attributes in source order
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Node {
    /// Convenience constructor for an element node
    pub fn element(name: &str, attrs: &[(&str, &str)], children: Vec<Node>) -> Self {
        Node::Element(Element::new(name, attrs, children))
    }

    /// Convenience constructor for a text node
    pub fn text(text: &str) -> Self {
        Node::Text(text.to_string())
    }

    /// Child nodes (empty for text and comments)
    pub fn children(&self) -> &[Node] {
        match self {
            Node::Document(children) => children,
            Node::Element(element) => &element.children,
            Node::Text(_) | Node::Comment(_) => &[],
        }
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(element) => Some(element),
            _ => None,
        }
    }

    /// All elements carrying `attr`, in document order (including `self`)
    pub fn elements_with_attr(&self, attr: &str) -> Vec<&Element> {
        let mut found = Vec::new();
        collect_elements(self, &mut |element| element.attr(attr).is_some(), &mut found);
        found
    }

    /// All elements matching `predicate`, in document order (including `self`)
    pub fn elements_where<F>(&self, mut predicate: F) -> Vec<&Element>
    where
        F: FnMut(&Element) -> bool,
    {
        let mut found = Vec::new();
        collect_elements(self, &mut predicate, &mut found);
        found
    }

    /// Returns true if any text node or attribute value below contains `needle`
    pub fn mentions(&self, needle: &str) -> bool {
        match self {
            Node::Text(text) => text.contains(needle),
            Node::Comment(_) => false,
            Node::Element(element) => {
                element.attrs.iter().any(|(_, value)| value.contains(needle))
                    || element.children.iter().any(|child| child.mentions(needle))
            }
            Node::Document(children) => children.iter().any(|child| child.mentions(needle)),
        }
    }

    /// Concatenated text of this node and its descendants
    pub fn text_content(&self) -> String {
        let mut parts = Vec::new();
        collect_text(self, &mut parts);
        parts.concat()
    }
}

impl Element {
    pub fn new(name: &str, attrs: &[(&str, &str)], children: Vec<Node>) -> Self {
        Self {
            name: name.to_string(),
            attrs: attrs
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            children,
        }
    }

    /// Value of the first attribute called `name`
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(attr_name, _)| attr_name == name)
            .map(|(_, value)| value.as_str())
    }

    /// Whitespace-separated tokens of the `class` attribute
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or_default().split_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|candidate| candidate == class)
    }

    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }

    /// First descendant element (excluding `self`) matching `predicate`, in document order
    pub fn find_descendant<F>(&self, mut predicate: F) -> Option<&Element>
    where
        F: FnMut(&Element) -> bool,
    {
        self.children
            .iter()
            .find_map(|child| find_first(child, &mut predicate))
    }

    /// Child elements, skipping text and comments
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// Text of every descendant text node joined with `separator`
    pub fn text_joined(&self, separator: &str) -> String {
        let mut parts = Vec::new();
        for child in &self.children {
            collect_text(child, &mut parts);
        }
        parts.join(separator)
    }

    /// Serialize the children back to HTML
    ///
    /// Text is escaped the way html5ever's serializer escapes it: `&`, `<`,
    /// `>` and U+00A0 become `&amp;`, `&lt;`, `&gt;` and `&nbsp;`. Attribute
    /// values escape `&`, U+00A0 and `"`.
    pub fn inner_html(&self) -> String {
        let mut output = String::new();
        let raw = RAW_TEXT_ELEMENTS.contains(&self.name.as_str());
        for child in &self.children {
            write_html(child, &mut output, raw);
        }
        output
    }
}

fn collect_elements<'a, F>(node: &'a Node, predicate: &mut F, found: &mut Vec<&'a Element>)
where
    F: FnMut(&Element) -> bool,
{
    if let Node::Element(element) = node
        && predicate(element)
    {
        found.push(element);
    }
    for child in node.children() {
        collect_elements(child, predicate, found);
    }
}

fn find_first<'a, F>(node: &'a Node, predicate: &mut F) -> Option<&'a Element>
where
    F: FnMut(&Element) -> bool,
{
    if let Node::Element(element) = node
        && predicate(element)
    {
        return Some(element);
    }
    node.children()
        .iter()
        .find_map(|child| find_first(child, predicate))
}

fn collect_text<'a>(node: &'a Node, parts: &mut Vec<&'a str>) {
    match node {
        Node::Text(text) => parts.push(text),
        Node::Comment(_) => {}
        Node::Element(_) | Node::Document(_) => {
            for child in node.children() {
                collect_text(child, parts);
            }
        }
    }
}

fn write_html(node: &Node, output: &mut String, raw_text: bool) {
    match node {
        Node::Text(text) => {
            if raw_text {
                output.push_str(text);
            } else {
                escape_into(text, output, false);
            }
        }
        Node::Comment(text) => {
            output.push_str("<!--");
            output.push_str(text);
            output.push_str("-->");
        }
        Node::Document(children) => {
            for child in children {
                write_html(child, output, false);
            }
        }
        Node::Element(element) => {
            output.push('<');
            output.push_str(&element.name);
            for (name, value) in &element.attrs {
                output.push(' ');
                output.push_str(name);
                output.push_str("=\"");
                escape_into(value, output, true);
                output.push('"');
            }
            output.push('>');

            if VOID_ELEMENTS.contains(&element.name.as_str()) {
                return;
            }

            output.push_str(&element.inner_html());
            output.push_str("</");
            output.push_str(&element.name);
            output.push('>');
        }
    }
}

fn escape_into(text: &str, output: &mut String, attribute: bool) {
    for ch in text.chars() {
        match ch {
            '&' => output.push_str("&amp;"),
            '\u{a0}' => output.push_str("&nbsp;"),
            '"' if attribute => output.push_str("&quot;"),
            '<' if !attribute => output.push_str("&lt;"),
            '>' if !attribute => output.push_str("&gt;"),
            _ => output.push(ch),
        }
    }
}
