//! HTML parsing and DOM navigation.
//!
//! This module provides the [`Document`] and [`Element`] types for parsing
//! HTML and querying it with CSS selectors, plus the flattened
//! [`HtmlChunk`] representation of an element's subtree that the highlight
//! placement code works against.
//!
//! # Example
//!
//! ```rust
//! use marginalia_core::dom::Document;
//!
//! let html = r#"<article><p>A paragraph of text.</p></article>"#;
//! let doc = Document::parse(html).unwrap();
//! let paragraphs = doc.select("article p").unwrap();
//! assert_eq!(paragraphs[0].text(), "A paragraph of text.");
//! ```

use scraper::{Html, Selector};

use crate::{MarginaliaError, Result};

/// Represents a parsed HTML document.
///
/// A Document wraps a page and provides methods for querying elements
/// using CSS selectors and for re-serializing the whole tree. All
/// downstream stages work against one Document parsed once per pass.
pub struct Document {
    html: Html,
}

impl Document {
    /// Parses HTML from a string.
    pub fn parse(html: &str) -> Result<Self> {
        let html = Html::parse_document(html);
        Ok(Self { html })
    }

    /// Selects elements using a CSS selector.
    ///
    /// # Errors
    ///
    /// Returns [`MarginaliaError::HtmlParseError`] if the selector is invalid.
    pub fn select(&'_ self, selector: &str) -> Result<Vec<Element<'_>>> {
        let sel = Selector::parse(selector)
            .map_err(|e| MarginaliaError::HtmlParseError(format!("Invalid selector: {}", e)))?;

        Ok(self.html.select(&sel).map(|el| Element { element: el }).collect())
    }

    /// Gets the title of the document, if present.
    pub fn title(&self) -> Option<String> {
        let selector = Selector::parse("title").ok()?;
        self.html
            .select(&selector)
            .next()
            .map(|el| el.text().collect::<String>())
    }

    /// Gets all text content from the document.
    pub fn text_content(&self) -> String {
        self.html.root_element().text().collect()
    }

    /// Serializes the entire document back to HTML.
    ///
    /// Element outer HTML obtained from [`Element::outer_html`] appears
    /// verbatim inside this string, which is what lets the annotation step
    /// splice rewritten paragraphs in by position.
    pub fn as_string(&self) -> String {
        self.html.html()
    }
}

/// A wrapper around scraper's ElementRef.
///
/// Element represents a single node in the document tree and provides
/// access to its text, serialized HTML, and the flattened chunk stream
/// used when rebuilding a paragraph around highlight markers.
#[derive(Clone, Debug)]
pub struct Element<'a> {
    element: scraper::ElementRef<'a>,
}

/// One piece of an element's subtree, flattened in document order.
///
/// `Text` chunks are the leaf text nodes; their position among the other
/// `Text` chunks is the node index the matcher reports offsets against.
/// `Markup` chunks are serialized open/close tags reproduced as-is.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HtmlChunk {
    /// A leaf text node's content, unescaped.
    Text(String),
    /// A serialized tag, emitted verbatim on rebuild.
    Markup(String),
}

/// Tags with no closing counterpart.
const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

fn is_void(tag: &str) -> bool {
    VOID_TAGS.contains(&tag)
}

/// Escape text node content for HTML output.
pub fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Escape an attribute value for HTML output.
pub fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

fn open_tag(el: &scraper::node::Element) -> String {
    let mut tag = String::new();
    tag.push('<');
    tag.push_str(&el.name().to_lowercase());
    for (name, value) in el.attrs() {
        tag.push(' ');
        tag.push_str(name);
        tag.push_str("=\"");
        tag.push_str(&escape_attr(value));
        tag.push('"');
    }
    tag.push('>');
    tag
}

fn flatten_into(el: scraper::ElementRef<'_>, chunks: &mut Vec<HtmlChunk>) {
    for child in el.children() {
        if let Some(child_el) = scraper::ElementRef::wrap(child) {
            let name = child_el.value().name().to_lowercase();
            chunks.push(HtmlChunk::Markup(open_tag(child_el.value())));
            if !is_void(&name) {
                flatten_into(child_el, chunks);
                chunks.push(HtmlChunk::Markup(format!("</{}>", name)));
            }
        } else if let Some(text) = child.value().as_text() {
            chunks.push(HtmlChunk::Text(text.to_string()));
        }
        // Comments and doctypes carry no highlightable content.
    }
}

impl<'a> Element<'a> {
    /// Gets the text content of this element.
    ///
    /// Returns the concatenation of all text nodes within this element.
    pub fn text(&self) -> String {
        self.element.text().collect()
    }

    /// Gets the outer HTML of this element.
    pub fn outer_html(&self) -> String {
        self.element.html()
    }

    /// Gets the value of an attribute, or `None` if absent.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.element.value().attr(name)
    }

    /// Gets the lowercase tag name of this element.
    pub fn tag_name(&self) -> String {
        self.element.value().name().to_lowercase()
    }

    /// Selects descendant elements using a CSS selector.
    ///
    /// # Errors
    ///
    /// Returns [`MarginaliaError::HtmlParseError`] if the selector is invalid.
    pub fn select(&'_ self, selector: &str) -> Result<Vec<Element<'_>>> {
        let sel = Selector::parse(selector)
            .map_err(|e| MarginaliaError::HtmlParseError(format!("Invalid selector: {}", e)))?;

        Ok(self.element.select(&sel).map(|el| Element { element: el }).collect())
    }

    /// Flattens this element's subtree into a chunk stream.
    ///
    /// Text chunks appear in the same document order as the segments of
    /// [`Element::text`], so offsets computed against one apply to the other.
    pub fn to_chunks(&self) -> Vec<HtmlChunk> {
        let mut chunks = Vec::new();
        flatten_into(self.element, &mut chunks);
        chunks
    }

    /// Serialized open tag for this element, attributes included.
    pub fn open_tag(&self) -> String {
        open_tag(self.element.value())
    }
}
