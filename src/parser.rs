//! HTML5 parser using html5ever
//!
//! Parses a fragment string with html5ever (the WHATWG parsing algorithm, so
//! malformed clipboard markup is recovered the way a browser would) and
//! copies the result into the owned [`Node`] tree the rest of the pipeline
//! works on.
//!
//! # Configuration
//!
//! - **Scripting**: Disabled (scripts are not executed)
//! - **Error Handling**: Errors are collected but parsing continues
//! - **Tree Builder**: RcDom, converted to [`Node`] immediately
//!
//! Parsing never fails. Elements nested deeper than the configured limit
//! are dropped from the owned tree so later recursive stages cannot overflow
//! the stack.
//!
//! # Examples
//!
//! ```rust
//! use chat_transcript_markdown::parser::parse_html;
//!
//! let doc = parse_html("<div data-message-author-role=\"user\">Hi</div>");
//! assert_eq!(doc.elements_with_attr("data-message-author-role").len(), 1);
//! ```

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom};

use crate::dom::{Element, Node};
use crate::security::SecurityValidator;

/// Parse an HTML string into an owned document tree
pub fn parse_html(html: &str) -> Node {
    parse_html_with_validator(html, &SecurityValidator::new())
}

/// Parse an HTML string, bounding nesting depth with `validator`
pub fn parse_html_with_validator(html: &str, validator: &SecurityValidator) -> Node {
    let dom = parse_document(RcDom::default(), Default::default()).one(html);

    let mut truncated = 0usize;
    let document = match to_owned_node(&dom.document, 0, validator, &mut truncated) {
        Some(node @ Node::Document(_)) => node,
        Some(other) => Node::Document(vec![other]),
        None => Node::Document(Vec::new()),
    };

    if truncated > 0 {
        tracing::warn!(
            dropped_elements = truncated,
            max_depth = validator.max_depth(),
            "Dropped elements nested beyond the maximum depth"
        );
    }

    document
}

fn to_owned_node(
    handle: &Handle,
    depth: usize,
    validator: &SecurityValidator,
    truncated: &mut usize,
) -> Option<Node> {
    match handle.data {
        NodeData::Document => Some(Node::Document(owned_children(
            handle, depth, validator, truncated,
        ))),
        NodeData::Element {
            ref name,
            ref attrs,
            ..
        } => {
            if !validator.within_depth(depth) {
                *truncated += 1;
                return None;
            }

            let attrs = attrs
                .borrow()
                .iter()
                .map(|attr| (attr.name.local.to_string(), attr.value.to_string()))
                .collect();

            Some(Node::Element(Element {
                name: name.local.to_string(),
                attrs,
                children: owned_children(handle, depth + 1, validator, truncated),
            }))
        }
        NodeData::Text { ref contents } => Some(Node::Text(contents.borrow().to_string())),
        NodeData::Comment { ref contents } => Some(Node::Comment(contents.to_string())),
        NodeData::Doctype { .. } | NodeData::ProcessingInstruction { .. } => None,
    }
}

fn owned_children(
    handle: &Handle,
    depth: usize,
    validator: &SecurityValidator,
    truncated: &mut usize,
) -> Vec<Node> {
    handle
        .children
        .borrow()
        .iter()
        .filter_map(|child| to_owned_node(child, depth, validator, truncated))
        .collect()
}
