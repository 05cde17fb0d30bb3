//! Model reply parsing.
//!
//! The model is instructed to return a fenced JSON block but does not
//! always comply, so parsing runs a three-tier fallback, recorded on the
//! result as a [`ReplyShape`]:
//!
//! 1. a fenced `json` block is located and its inner content parsed,
//! 2. failing that, the raw content is parsed directly,
//! 3. failing that, fence markers are stripped heuristically and parsing
//!    is attempted once more.
//!
//! Individual entries missing their text or paragraph are dropped with a
//! warning; only a reply with no salvageable entries fails the pass.

use regex::Regex;
use serde_json::Value;
use tracing::warn;

use crate::{MarginaliaError, Result};

/// The kind of a highlight, controlling its color and sidebar presence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HighlightKind {
    /// A key sentence; highlighted and listed in the sidebar.
    KeySentence,
    /// A key term; highlighted only.
    KeyTerm,
}

impl HighlightKind {
    /// CSS class used on the highlight marker element.
    pub fn css_class(self) -> &'static str {
        match self {
            HighlightKind::KeySentence => "key_sentence",
            HighlightKind::KeyTerm => "key_term",
        }
    }
}

/// One highlight request parsed out of the model reply.
///
/// `paragraph` is advisory: the model frequently numbers correctly but is
/// not trusted, and the matcher falls back to a content scan when the
/// numbered paragraph does not contain `text`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HighlightItem {
    /// Verbatim fragment to locate, trimmed.
    pub text: String,
    /// Advisory 1-based paragraph number.
    pub paragraph: usize,
    /// Sentence or term.
    pub kind: HighlightKind,
}

/// Which parse tier produced the result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplyShape {
    /// A fenced `json` block was found and its inner content parsed.
    Fenced,
    /// The raw reply content parsed directly.
    Bare,
    /// Parsing succeeded only after stripping fence markers.
    Stripped,
}

/// The fully parsed reply: ordered items plus the tier that produced them.
#[derive(Clone, Debug)]
pub struct ParsedReply {
    /// Sentences first, then terms, each in model order.
    pub items: Vec<HighlightItem>,
    /// Parse tier, kept for logging and tests.
    pub shape: ReplyShape,
}

/// Locates the JSON value in the reply content via the tier cascade.
fn parse_json_tiers(content: &str) -> Result<(Value, ReplyShape)> {
    let fence = Regex::new(r"(?s)```json\s*(.*?)\s*```").unwrap();

    if let Some(caps) = fence.captures(content) {
        if let Ok(value) = serde_json::from_str(&caps[1]) {
            return Ok((value, ReplyShape::Fenced));
        }
    } else if let Ok(value) = serde_json::from_str(content.trim()) {
        return Ok((value, ReplyShape::Bare));
    }

    let open = Regex::new(r"```json\n?").unwrap();
    let close = Regex::new(r"\n?```").unwrap();
    let without_open = open.replace_all(content, "");
    let stripped = close.replace_all(&without_open, "");
    let stripped = stripped.trim();

    serde_json::from_str(stripped)
        .map(|value| (value, ReplyShape::Stripped))
        .map_err(|e| MarginaliaError::MalformedResponse(e.to_string()))
}

/// Pulls a named array field out of the reply object.
fn require_array<'a>(value: &'a Value, field: &'static str) -> Result<&'a Vec<Value>> {
    value
        .get(field)
        .and_then(Value::as_array)
        .ok_or(MarginaliaError::IncompleteSchema(field))
}

/// Maps one raw entry to a [`HighlightItem`], or drops it with a warning.
fn map_entry(entry: &Value, kind: HighlightKind) -> Option<HighlightItem> {
    let text = entry.get("text").and_then(Value::as_str).map(str::trim).unwrap_or("");
    let paragraph = match entry.get("paragraph") {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };

    match (text.is_empty(), paragraph) {
        (false, Some(p)) if p >= 1 => Some(HighlightItem {
            text: text.to_string(),
            paragraph: p as usize,
            kind,
        }),
        _ => {
            warn!(?entry, "dropping incomplete reply entry");
            None
        }
    }
}

/// Parses the assistant's reply content into highlight items.
///
/// # Errors
///
/// [`MarginaliaError::MalformedResponse`] when no tier yields JSON,
/// [`MarginaliaError::IncompleteSchema`] when `sentences` or `terms` is
/// missing, [`MarginaliaError::NoContent`] when no entry survives
/// filtering.
pub fn parse_reply(content: &str) -> Result<ParsedReply> {
    let (value, shape) = parse_json_tiers(content)?;

    let sentences = require_array(&value, "sentences")?;
    let terms = require_array(&value, "terms")?;

    let items: Vec<HighlightItem> = sentences
        .iter()
        .filter_map(|e| map_entry(e, HighlightKind::KeySentence))
        .chain(terms.iter().filter_map(|e| map_entry(e, HighlightKind::KeyTerm)))
        .collect();

    if items.is_empty() {
        return Err(MarginaliaError::NoContent);
    }

    Ok(ParsedReply { items, shape })
}
