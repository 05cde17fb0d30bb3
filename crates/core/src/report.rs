//! Pass summary reporting.
//!
//! A [`PassReport`] is a small serializable summary of one analysis pass,
//! printed by the CLI in verbose mode or emitted as JSON.

use serde::Serialize;

use crate::content::ArticleContent;
use crate::matcher::MatchOutcome;
use crate::reply::{HighlightKind, ParsedReply, ReplyShape};

/// Summary of one analysis pass.
#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    /// Qualifying paragraphs in the snapshot.
    pub paragraphs: usize,
    /// Items the model reply yielded after filtering.
    pub items: usize,
    /// Highlights actually placed.
    pub matched: usize,
    /// Items with no non-overlapping match.
    pub skipped: usize,
    /// Sidebar entries (placed key sentences).
    pub sidebar_entries: usize,
    /// Which parse tier handled the reply.
    pub reply_shape: &'static str,
}

fn shape_label(shape: ReplyShape) -> &'static str {
    match shape {
        ReplyShape::Fenced => "fenced",
        ReplyShape::Bare => "bare",
        ReplyShape::Stripped => "stripped",
    }
}

impl PassReport {
    /// Builds the summary for a completed pass.
    pub fn new(content: &ArticleContent, reply: &ParsedReply, outcome: &MatchOutcome) -> Self {
        let sidebar_entries = outcome
            .placements
            .iter()
            .filter(|p| p.item.kind == HighlightKind::KeySentence)
            .count();

        Self {
            paragraphs: content.len(),
            items: reply.items.len(),
            matched: outcome.placements.len(),
            skipped: outcome.unmatched.len(),
            sidebar_entries,
            reply_shape: shape_label(reply.shape),
        }
    }

    /// Serializes the report as pretty JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}
