//! Per-turn transcript rendering
//!
//! A chat transcript is a sequence of elements tagged with an author-role
//! attribute. User turns are copied as plain text into a fixed HTML bubble
//! so they stand apart from the Markdown around them; every other role is
//! converted to Markdown with the generic engine, after which code block
//! placeholders are substituted back.
//!
//! Clipboard content without any role-tagged element is converted as a whole
//! document instead.
//!
//! # Examples
//!
//! ```rust
//! use chat_transcript_markdown::parser::parse_html;
//! use chat_transcript_markdown::protect::Placeholders;
//! use chat_transcript_markdown::transcript::TranscriptRenderer;
//!
//! let dom = parse_html(
//!     r#"<div data-message-author-role="assistant"><div class="markdown"><p>Hi <b>there</b></p></div></div>"#,
//! );
//! let markdown = TranscriptRenderer::new().render(&dom, &Placeholders::new());
//! assert_eq!(markdown, "Hi **there**");
//! ```

use crate::converter::{ConversionOptions, MarkdownConverter};
use crate::dom::{Element, Node};
use crate::protect::Placeholders;

/// Attribute naming the author of a chat turn
pub const DEFAULT_ROLE_ATTRIBUTE: &str = "data-message-author-role";

/// Role value of user-authored turns
pub const DEFAULT_USER_ROLE: &str = "user";

/// Class of the element holding a user turn's text
pub const DEFAULT_USER_TEXT_CLASS: &str = "whitespace-pre-wrap";

/// Class of the element holding an assistant turn's rendered Markdown
pub const DEFAULT_ASSISTANT_BODY_CLASS: &str = "markdown";

/// Author of a chat turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    User,
    /// Any role value other than the user value (assistant, tool, system, ...)
    Other(String),
}

impl Role {
    /// Classify a role attribute value; only an exact match is the user role
    pub fn parse(value: &str, user_role: &str) -> Self {
        if value == user_role {
            Role::User
        } else {
            Role::Other(value.to_string())
        }
    }

    pub fn is_user(&self) -> bool {
        matches!(self, Role::User)
    }
}

/// Where turns and their content live in the chat UI's markup
#[derive(Debug, Clone)]
pub struct TranscriptOptions {
    pub role_attribute: String,
    pub user_role: String,
    pub user_text_class: String,
    pub assistant_body_class: String,
    /// Engine configuration for non-user turns and the fallback path
    pub conversion: ConversionOptions,
}

impl TranscriptOptions {
    /// Role of `element`, or `None` if it is not a turn container
    pub fn role_of(&self, element: &Element) -> Option<Role> {
        element
            .attr(&self.role_attribute)
            .map(|value| Role::parse(value, &self.user_role))
    }

    /// Returns true if `element` is a user-authored turn container
    pub fn is_user_turn(&self, element: &Element) -> bool {
        self.role_of(element).is_some_and(|role| role.is_user())
    }
}

impl Default for TranscriptOptions {
    fn default() -> Self {
        Self {
            role_attribute: DEFAULT_ROLE_ATTRIBUTE.to_string(),
            user_role: DEFAULT_USER_ROLE.to_string(),
            user_text_class: DEFAULT_USER_TEXT_CLASS.to_string(),
            assistant_body_class: DEFAULT_ASSISTANT_BODY_CLASS.to_string(),
            conversion: ConversionOptions::transcript(),
        }
    }
}

/// Renders a (protected) document into transcript Markdown
pub struct TranscriptRenderer {
    options: TranscriptOptions,
    converter: MarkdownConverter,
}

impl TranscriptRenderer {
    pub fn new() -> Self {
        Self::with_options(TranscriptOptions::default())
    }

    pub fn with_options(options: TranscriptOptions) -> Self {
        let converter = MarkdownConverter::with_options(options.conversion.clone());
        Self { options, converter }
    }

    /// Render every turn in document order, joined by a blank line
    ///
    /// A user turn without its text container contributes nothing; each
    /// such turn is reported with a `warn` event carrying its index.
    pub fn render(&self, document: &Node, placeholders: &Placeholders) -> String {
        let turns = document.elements_with_attr(&self.options.role_attribute);

        if turns.is_empty() {
            tracing::debug!("No role-tagged turns found, converting the whole document");
            let markdown = self.converter.convert(document);
            return placeholders.substitute(&markdown).trim().to_string();
        }

        tracing::debug!(turns = turns.len(), "Rendering transcript turns");

        let mut rendered = Vec::with_capacity(turns.len());
        for (index, turn) in turns.into_iter().enumerate() {
            let Some(role) = self.options.role_of(turn) else {
                continue;
            };

            match role {
                Role::User => match self.render_user_turn(turn) {
                    Some(bubble) => rendered.push(bubble),
                    None => tracing::warn!(
                        turn = index,
                        text_class = %self.options.user_text_class,
                        "Dropping user turn without a text container"
                    ),
                },
                Role::Other(role) => {
                    tracing::debug!(turn = index, %role, "Rendering turn as Markdown");
                    rendered.push(self.render_assistant_turn(turn, placeholders));
                }
            }
        }

        rendered.join("\n\n")
    }

    fn render_user_turn(&self, turn: &Element) -> Option<String> {
        let container = turn.find_descendant(|element| element.has_class(&self.options.user_text_class))?;
        let text = container.text_joined("\n");
        Some(user_bubble(text.trim_end()))
    }

    fn render_assistant_turn(&self, turn: &Element, placeholders: &Placeholders) -> String {
        let body = turn
            .find_descendant(|element| element.has_class(&self.options.assistant_body_class))
            .unwrap_or(turn);
        let markdown = self.converter.convert_element(body);
        placeholders.substitute(&markdown).trim().to_string()
    }
}

impl Default for TranscriptRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn user_bubble(text: &str) -> String {
    format!("<div class=\"you-bubble\">\n  <div class=\"bubble-content\">\n{text}\n  </div>\n</div>")
}
