//! Tag-transform sanitizer: parses HTML, lets callbacks rewrite the
//! attributes of selected tags, and serializes the tree back to a string.

use std::collections::HashMap;

use scraper::{Html, node::Node};

use super::Sanitizer;

/// Attribute list of one element, in document order.
pub type Attributes = Vec<(String, String)>;

type TagTransform = Box<dyn Fn(&mut Attributes) + Send + Sync>;

/// Sanitizer that hosts per-tag attribute transforms.
///
/// The input is parsed as an HTML fragment, so the output is normalised:
/// tag and attribute names are lower-cased, attribute values are always
/// double-quoted and unclosed elements are closed.
///
/// # Example
///
/// ```
/// use ucf_content_sanitizer::{Attributes, Sanitizer, TagTransformSanitizer};
///
/// let sanitizer = TagTransformSanitizer::new().transform_tag("a", |attrs: &mut Attributes| {
///     attrs.retain(|(name, _)| name != "onclick");
/// });
/// let out = sanitizer.sanitize(r#"<a href="/page" onclick="track()">Link</a>"#);
/// assert_eq!(out, r#"<a href="/page">Link</a>"#);
/// ```
#[derive(Default)]
pub struct TagTransformSanitizer {
    transforms: HashMap<String, TagTransform>,
}

impl TagTransformSanitizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the transform run on every `tag` element. A later
    /// registration for the same tag replaces the earlier one.
    pub fn transform_tag<F>(mut self, tag: &str, transform: F) -> Self
    where
        F: Fn(&mut Attributes) + Send + Sync + 'static,
    {
        self.transforms
            .insert(tag.to_ascii_lowercase(), Box::new(transform));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

/// HTML5 void elements that must not have a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose text content is emitted without escaping.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "xmp", "iframe", "noembed", "noframes"];

fn push_escaped(out: &mut String, text: &str, attr: bool) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' if attr => out.push_str("&quot;"),
            '<' if !attr => out.push_str("&lt;"),
            '>' if !attr => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}

impl TagTransformSanitizer {
    fn serialize_node(&self, node: ego_tree::NodeRef<Node>, raw_text: bool, out: &mut String) {
        match node.value() {
            Node::Document | Node::Fragment => {
                for child in node.children() {
                    self.serialize_node(child, false, out);
                }
            }
            Node::Element(el) => {
                let tag = el.name();
                let mut attrs: Attributes = el
                    .attrs()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect();
                if let Some(transform) = self.transforms.get(tag) {
                    transform(&mut attrs);
                }

                out.push('<');
                out.push_str(tag);
                for (k, v) in &attrs {
                    out.push(' ');
                    out.push_str(k);
                    out.push_str("=\"");
                    push_escaped(out, v, true);
                    out.push('"');
                }
                out.push('>');

                if VOID_ELEMENTS.contains(&tag) {
                    return;
                }

                let raw = RAW_TEXT_ELEMENTS.contains(&tag);
                for child in node.children() {
                    self.serialize_node(child, raw, out);
                }

                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
            Node::Text(text) => {
                if raw_text {
                    out.push_str(text);
                } else {
                    push_escaped(out, text, false);
                }
            }
            Node::Comment(comment) => {
                out.push_str("<!--");
                out.push_str(comment);
                out.push_str("-->");
            }
            _ => {}
        }
    }
}

impl Sanitizer for TagTransformSanitizer {
    fn sanitize(&self, html: &str) -> String {
        let fragment = Html::parse_fragment(html);
        let mut out = String::with_capacity(html.len());

        // Fragments are parsed under a synthetic <html> element; only its
        // children belong to the input.
        let root = fragment.root_element();
        for child in root.children() {
            self.serialize_node(child, false, &mut out);
        }
        out
    }
}
