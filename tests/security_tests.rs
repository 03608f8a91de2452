//! Security validation tests
//!
//! Clipboard HTML is untrusted input. This suite checks that non-content
//! markup never reaches the Markdown, that unsafe link targets are dropped,
//! and that hostile nesting cannot crash the converter.

use chat_transcript_markdown::converter::{ConversionOptions, MarkdownConverter};
use chat_transcript_markdown::parser::{parse_html, parse_html_with_validator};
use chat_transcript_markdown::security::SecurityValidator;
use chat_transcript_markdown::{ConversionError, convert};

fn assistant_turn(body: &str) -> String {
    format!(
        r#"<div data-message-author-role="assistant"><div class="markdown">{body}</div></div>"#
    )
}

/// Script tags and their content are removed from assistant turns
#[test]
fn test_script_tag_removal() {
    let html = assistant_turn(
        r#"<p>Before dangerous element</p>
        <script>alert('xss')</script>
        <p>After dangerous element</p>"#,
    );

    let markdown = convert(&html).unwrap();

    assert!(!markdown.contains("<script"));
    assert!(!markdown.contains("alert"));
    assert!(markdown.contains("Before dangerous element"));
    assert!(markdown.contains("After dangerous element"));
}

/// Inline scripts and styles inside a paragraph are removed
#[test]
fn test_inline_script_and_style_removal() {
    let html = assistant_turn(
        r#"<p>Text <script>malicious()</script><style>.x{color:red}</style> more text</p>"#,
    );

    let markdown = convert(&html).unwrap();
    assert_eq!(markdown, "\nText more text");
}

/// Icons and embedded frames in the chat chrome do not leak into the output
#[test]
fn test_chrome_elements_removed() {
    let html = r#"<div data-message-author-role="assistant"><svg><title>copy icon</title><path d="M0"/></svg><iframe src="https://evil.example"></iframe><div class="markdown"><p>answer</p></div></div>"#;
    assert_eq!(convert(html).unwrap(), "\nanswer");
}

/// Event handler attributes never appear in Markdown
#[test]
fn test_event_handler_attributes_ignored() {
    let html = assistant_turn(r#"<p onclick="steal()">Click <b onmouseover="x()">here</b></p>"#);
    let markdown = convert(&html).unwrap();
    assert_eq!(markdown, "\nClick **here**");
}

/// Dangerous link schemes keep the text but drop the target
#[test]
fn test_dangerous_links_dropped() {
    let html = assistant_turn(
        r#"<p><a href="javascript:alert(1)">one</a> <a href="  JAVASCRIPT:x">two</a> <a href="data:text/html,<b>x</b>">three</a> <a href="https://ok.example/">four</a></p>"#,
    );

    let markdown = convert(&html).unwrap();
    assert!(!markdown.to_lowercase().contains("javascript"));
    assert!(!markdown.contains("data:"));
    assert!(markdown.contains("one two three [four](https://ok.example/)"));
}

/// Dangerous image sources are skipped entirely
#[test]
fn test_dangerous_image_skipped() {
    let html = assistant_turn(r#"<p>pic<img src="javascript:alert(1)" alt="x"></p>"#);
    assert_eq!(convert(&html).unwrap(), "\npic");
}

/// Script content inside a code block is kept as code, not executed or dropped
#[test]
fn test_script_text_in_code_block_is_literal() {
    let html = assistant_turn(
        r#"<pre><code class="language-html">&lt;script&gt;alert(1)&lt;/script&gt;</code></pre>"#,
    );
    let markdown = convert(&html).unwrap();
    assert!(markdown.contains("```html\n<script>alert(1)</script>\n```"));
}

/// A document made only of non-content elements is an empty result
#[test]
fn test_only_dangerous_content_is_empty() {
    let html = "<script>a()</script><style>b{}</style><template><p>c</p></template>";
    assert_eq!(convert(html), Err(ConversionError::EmptyResult));
}

/// Deep nesting is truncated instead of overflowing the stack
#[test]
fn test_deep_nesting_truncated() {
    let depth = 5_000;
    let mut html = String::with_capacity(depth * 11);
    for _ in 0..depth {
        html.push_str("<div>");
    }
    html.push_str("bottom");
    for _ in 0..depth {
        html.push_str("</div>");
    }

    let dom = parse_html(&html);
    assert!(!dom.text_content().contains("bottom"));
    assert_eq!(convert(&html), Err(ConversionError::EmptyResult));
}

/// The depth limit is configurable at parse time
#[test]
fn test_custom_depth_limit() {
    let html = "<div><div><div><div><div><p>deep</p></div></div></div></div></div><p>shallow</p>";

    let dom = parse_html_with_validator(html, &SecurityValidator::with_max_depth(4));
    let markdown = MarkdownConverter::with_options(ConversionOptions::transcript()).convert(&dom);
    assert_eq!(markdown, "shallow\n");
}
