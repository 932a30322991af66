//! HTML-to-text extraction for fetched pages.
//!
//! Confluence storage bodies and generic web pages both arrive as HTML;
//! this module reduces them to plain UTF-8 text for the record tree.
//! Extraction is extractor-layer: clients supply the HTML string, this
//! module returns text and never errors (worst case: an empty string).

use scraper::{ElementRef, Html, Node, Selector};

/// Tags whose text content is noise, not page text.
const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "template"];

/// Extract the visible text of an HTML document.
///
/// Prefers the first `<article>` element when present (generic web pages
/// wrap their content in one), otherwise falls back to `<body>`, otherwise
/// the whole document. Script and style subtrees are skipped; runs of
/// whitespace collapse to single spaces.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);

    let mut out = String::new();
    let scope = ["article", "body"].iter().find_map(|tag| {
        Selector::parse(tag)
            .ok()
            .and_then(|sel| document.select(&sel).next())
    });
    collect_text(scope.unwrap_or_else(|| document.root_element()), &mut out);

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extract the `<title>` of an HTML document, when present.
pub fn html_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let sel = Selector::parse("title").ok()?;
    let title = document.select(&sel).next()?;
    let text = title
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Extract the content of a named `<meta>` tag.
pub fn html_meta(html: &str, name: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let sel = Selector::parse(&format!(r#"meta[name="{name}"]"#)).ok()?;
    let meta = document.select(&sel).next()?;
    meta.value().attr("content").map(|c| c.trim().to_string())
}

/// Depth-first text collection, skipping [`SKIPPED_TAGS`] subtrees.
fn collect_text(element: ElementRef, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                out.push_str(&text.text);
                out.push(' ');
            }
            Node::Element(el) => {
                if SKIPPED_TAGS
                    .iter()
                    .any(|tag| el.name().eq_ignore_ascii_case(tag))
                {
                    continue;
                }
                if let Some(el_ref) = ElementRef::wrap(child) {
                    collect_text(el_ref, out);
                }
            }
            _ => {}
        }
    }
}
