//! Visible-text extraction from fetched HTML pages.

use scraper::{Html, Node};

/// Elements whose text content is never rendered.
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Extract the visible text of an HTML document.
///
/// Every text node is trimmed, empty nodes are dropped, and the rest are
/// joined with single spaces in document order.
pub fn extract_visible_text(html: &str) -> String {
    let document = Html::parse_document(html);

    document
        .tree
        .root()
        .descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let hidden = node.ancestors().any(|ancestor| match ancestor.value() {
                Node::Element(el) => HIDDEN_ELEMENTS.contains(&el.name()),
                _ => false,
            });
            if hidden {
                return None;
            }
            let trimmed = text.trim();
            (!trimmed.is_empty()).then_some(trimmed)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Keep at most `max_chars` characters (not bytes).
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paragraph_text() {
        assert_eq!(extract_visible_text("<p>Hello</p>"), "Hello");
    }

    #[test]
    fn nodes_trimmed_and_joined() {
        let html = "<html><body><h1>  Магистратура </h1>\n<div>\n  <p>AI</p>\n\n<p> AI Product </p></div></body></html>";
        assert_eq!(extract_visible_text(html), "Магистратура AI AI Product");
    }

    #[test]
    fn scripts_and_styles_skipped() {
        let html = r#"<head><style>p { color: red }</style><script>var x = 1;</script></head>
            <body><noscript>enable js</noscript><p>visible</p><template><p>later</p></template></body>"#;
        assert_eq!(extract_visible_text(html), "visible");
    }

    #[test]
    fn empty_document() {
        assert_eq!(extract_visible_text(""), "");
    }

    #[test]
    fn truncate_within_limit() {
        assert_eq!(truncate_chars("hello", 10), "hello");
    }

    #[test]
    fn truncate_counts_chars() {
        assert_eq!(truncate_chars("абвгд", 3), "абв");
        assert_eq!(truncate_chars("hello world", 5), "hello");
    }
}
