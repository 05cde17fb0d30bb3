//! Paragraph extraction from article pages.
//!
//! This module produces the ordered paragraph snapshot an analysis pass
//! works against. Extraction runs once per pass; the resulting
//! [`ArticleContent`] value is passed between the prompt builder, the
//! matcher, and the annotator so the numbering the model sees is exactly
//! the numbering highlights are resolved against.

use serde_json::json;

use crate::dom::{Document, Element, HtmlChunk};
use crate::{MarginaliaError, Result};

/// Candidate article containers, tried in order. First match wins;
/// documents matching none fall back to `body`.
pub const ARTICLE_SELECTORS: &[&str] = &[
    "article",
    r#"[role="article"]"#,
    ".article-content",
    ".post-content",
    ".entry-content",
    ".content-area",
    "main",
];

/// Paragraphs at or below this trimmed length are skipped.
pub const MIN_PARAGRAPH_CHARS: usize = 20;

/// One qualifying paragraph of the article.
///
/// `number` is the 1-based position among qualifying paragraphs in document
/// order; it is the only paragraph identity the rest of the system uses.
#[derive(Clone, Debug)]
pub struct Paragraph {
    /// 1-based paragraph number.
    pub number: usize,
    /// Trimmed text content.
    pub text: String,
    /// Subtree flattened in document order; `Text` chunks are the nodes
    /// highlight offsets refer to.
    pub chunks: Vec<HtmlChunk>,
    /// Serialized open tag of the paragraph element.
    pub open_tag: String,
    /// Outer HTML as serialized by the parser, used to locate the
    /// paragraph inside the serialized document.
    pub outer_html: String,
}

impl Paragraph {
    /// Leaf text node contents in document order.
    pub fn text_nodes(&self) -> impl Iterator<Item = &str> {
        self.chunks.iter().filter_map(|c| match c {
            HtmlChunk::Text(t) => Some(t.as_str()),
            HtmlChunk::Markup(_) => None,
        })
    }

    /// Untrimmed concatenation of all text nodes.
    ///
    /// Matching runs against this rather than the trimmed `text` so node
    /// offsets stay aligned.
    pub fn full_text(&self) -> String {
        self.text_nodes().collect()
    }
}

/// The ordered paragraph snapshot for one analysis pass.
#[derive(Clone, Debug, Default)]
pub struct ArticleContent {
    /// Qualifying paragraphs, numbered 1..=len in document order.
    pub paragraphs: Vec<Paragraph>,
}

impl ArticleContent {
    /// Number of qualifying paragraphs.
    pub fn len(&self) -> usize {
        self.paragraphs.len()
    }

    /// True when no paragraph qualified.
    pub fn is_empty(&self) -> bool {
        self.paragraphs.is_empty()
    }

    /// Paragraph by 1-based number.
    pub fn get(&self, number: usize) -> Option<&Paragraph> {
        if number >= 1 { self.paragraphs.get(number - 1) } else { None }
    }

    /// Serializes the corpus as the pretty JSON array embedded in the
    /// model prompt: `[{"text": ..., "paragraph": N}, ...]`.
    pub fn serialize(&self) -> String {
        let entries: Vec<_> = self
            .paragraphs
            .iter()
            .map(|p| json!({ "text": p.text, "paragraph": p.number }))
            .collect();
        serde_json::to_string_pretty(&entries).unwrap_or_else(|_| "[]".to_string())
    }
}

/// Finds the article container for a document.
///
/// Tests [`ARTICLE_SELECTORS`] in order and takes the first element that
/// matches; documents with no recognizable container use `body`.
fn article_container<'a>(doc: &'a Document) -> Result<Element<'a>> {
    for selector in ARTICLE_SELECTORS {
        if let Some(el) = doc.select(selector)?.into_iter().next() {
            return Ok(el);
        }
    }

    doc.select("body")?
        .into_iter()
        .next()
        .ok_or_else(|| MarginaliaError::HtmlParseError("document has no body".to_string()))
}

/// Extracts the ordered paragraph snapshot from a document.
///
/// Paragraphs are `<p>` elements inside the article container whose trimmed
/// text is longer than [`MIN_PARAGRAPH_CHARS`] and whose subtree contains no
/// nested `<p>`. Numbering is assigned by filtered order, starting at 1, and
/// is deterministic for an unchanged document.
pub fn extract_paragraphs(doc: &Document) -> Result<ArticleContent> {
    let container = article_container(doc)?;

    let mut paragraphs = Vec::new();
    for el in container.select("p")? {
        let text = el.text();
        let trimmed = text.trim();
        if trimmed.chars().count() <= MIN_PARAGRAPH_CHARS {
            continue;
        }
        if !el.select("p")?.is_empty() {
            continue;
        }

        paragraphs.push(Paragraph {
            number: paragraphs.len() + 1,
            text: trimmed.to_string(),
            chunks: el.to_chunks(),
            open_tag: el.open_tag(),
            outer_html: el.outer_html(),
        });
    }

    Ok(ArticleContent { paragraphs })
}
