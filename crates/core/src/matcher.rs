//! Highlight placement.
//!
//! Given the paragraph snapshot and the parsed highlight items, this module
//! decides where each highlight lands: which paragraph, which text node,
//! and which byte range. Items that cannot be placed are skipped, never
//! fatal; a pass with some unmatched items is still a successful pass.
//!
//! Lookup order per item: the advisory paragraph number when it is in range
//! and its text actually contains the target, otherwise the first
//! paragraph (in document order) whose text contains the target. Within a
//! paragraph, text nodes are walked in document order and the first
//! occurrence in each is considered; a candidate range that overlaps an
//! already-placed highlight in the same paragraph is rejected and the walk
//! moves on to the next text node.

use tracing::debug;

use crate::content::{ArticleContent, Paragraph};
use crate::reply::HighlightItem;

/// A resolved highlight: one item anchored to a concrete text range.
///
/// `id` is the item's position in the original reply list; the sidebar uses
/// the same numbering, so an unmatched item consumes its id.
#[derive(Clone, Debug)]
pub struct HighlightPlacement {
    /// The item being placed.
    pub item: HighlightItem,
    /// Sequential id shared with the sidebar entry (`highlight-{id}`).
    pub id: usize,
    /// Resolved 1-based paragraph number.
    pub paragraph: usize,
    /// Text node index within the paragraph's chunk stream.
    pub node: usize,
    /// Byte offset of the match start within that text node.
    pub start: usize,
    /// Byte offset of the match end within that text node.
    pub end: usize,
    /// Match start relative to the paragraph's concatenated text.
    pub abs_start: usize,
    /// Match end relative to the paragraph's concatenated text.
    pub abs_end: usize,
}

/// The result of placing every item of a pass.
#[derive(Clone, Debug, Default)]
pub struct MatchOutcome {
    /// Successfully placed highlights, in item order.
    pub placements: Vec<HighlightPlacement>,
    /// Items with no non-overlapping match anywhere.
    pub unmatched: Vec<HighlightItem>,
}

/// Byte offsets of each text node within the paragraph's concatenated text.
fn node_offsets(paragraph: &Paragraph) -> Vec<usize> {
    let mut offsets = Vec::new();
    let mut cursor = 0;
    for node in paragraph.text_nodes() {
        offsets.push(cursor);
        cursor += node.len();
    }
    offsets
}

fn overlaps(placements: &[HighlightPlacement], paragraph: usize, start: usize, end: usize) -> bool {
    placements
        .iter()
        .filter(|p| p.paragraph == paragraph)
        .any(|p| start < p.abs_end && p.abs_start < end)
}

/// Attempts to place a target inside one paragraph.
///
/// Walks text nodes in document order; the first occurrence per node is the
/// only one considered, and an overlapping occurrence sends the walk to the
/// next node rather than failing outright.
fn place_in_paragraph(
    paragraph: &Paragraph, target: &str, placed: &[HighlightPlacement],
) -> Option<(usize, usize, usize, usize)> {
    let offsets = node_offsets(paragraph);

    for (node, text) in paragraph.text_nodes().enumerate() {
        let Some(start) = text.find(target) else {
            continue;
        };
        let end = start + target.len();
        let abs_start = offsets[node] + start;

        if overlaps(placed, paragraph.number, abs_start, abs_start + target.len()) {
            continue;
        }

        return Some((node, start, end, abs_start));
    }

    None
}

/// Candidate paragraphs for an item, best first.
fn candidate_paragraphs<'a>(content: &'a ArticleContent, item: &HighlightItem) -> Vec<&'a Paragraph> {
    let primary = content
        .get(item.paragraph)
        .filter(|p| p.full_text().contains(&item.text));

    let mut candidates: Vec<&Paragraph> = primary.into_iter().collect();
    for p in &content.paragraphs {
        if candidates.first().is_some_and(|c| c.number == p.number) {
            continue;
        }
        if p.full_text().contains(&item.text) {
            candidates.push(p);
        }
    }
    candidates
}

/// Places every item of a reply against the paragraph snapshot.
///
/// Items are processed in list order; earlier items win overlaps. Ids are
/// assigned by list position regardless of match success, keeping sidebar
/// ids stable against the reply the model produced.
pub fn place_highlights(content: &ArticleContent, items: &[HighlightItem]) -> MatchOutcome {
    let mut outcome = MatchOutcome::default();

    for (id, item) in items.iter().enumerate() {
        let placed = candidate_paragraphs(content, item).into_iter().find_map(|paragraph| {
            place_in_paragraph(paragraph, &item.text, &outcome.placements)
                .map(|(node, start, end, abs_start)| HighlightPlacement {
                    item: item.clone(),
                    id,
                    paragraph: paragraph.number,
                    node,
                    start,
                    end,
                    abs_start,
                    abs_end: abs_start + item.text.len(),
                })
        });

        match placed {
            Some(placement) => outcome.placements.push(placement),
            None => {
                debug!(text = %item.text, paragraph = item.paragraph, "no non-overlapping match");
                outcome.unmatched.push(item.clone());
            }
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::extract_paragraphs;
    use crate::dom::Document;
    use crate::reply::HighlightKind;

    fn content_from(html: &str) -> ArticleContent {
        let doc = Document::parse(html).unwrap();
        extract_paragraphs(&doc).unwrap()
    }

    fn sentence(text: &str, paragraph: usize) -> HighlightItem {
        HighlightItem { text: text.to_string(), paragraph, kind: HighlightKind::KeySentence }
    }

    fn term(text: &str, paragraph: usize) -> HighlightItem {
        HighlightItem { text: text.to_string(), paragraph, kind: HighlightKind::KeyTerm }
    }

    const BENCHMARK_HTML: &str = r#"
        <html><body><article>
            <p>Opening remarks that merely set the scene for the report.</p>
            <p>Methods were described in exhaustive detail elsewhere in the text.</p>
            <p>The model achieved 92% accuracy on the benchmark, a new record.</p>
        </article></body></html>
    "#;

    #[test]
    fn test_advisory_number_used_when_correct() {
        let content = content_from(BENCHMARK_HTML);
        let outcome = place_highlights(&content, &[sentence("a new record", 3)]);

        assert_eq!(outcome.placements.len(), 1);
        assert_eq!(outcome.placements[0].paragraph, 3);
        assert!(outcome.unmatched.is_empty());
    }

    #[test]
    fn test_wrong_advisory_number_falls_back_to_scan() {
        let content = content_from(BENCHMARK_HTML);
        let outcome = place_highlights(&content, &[sentence("a new record", 1)]);

        assert_eq!(outcome.placements.len(), 1);
        assert_eq!(outcome.placements[0].paragraph, 3);
    }

    #[test]
    fn test_out_of_range_number_falls_back_to_scan() {
        let content = content_from(BENCHMARK_HTML);
        let outcome = place_highlights(&content, &[sentence("exhaustive detail", 12)]);

        assert_eq!(outcome.placements.len(), 1);
        assert_eq!(outcome.placements[0].paragraph, 2);
    }

    #[test]
    fn test_absent_text_is_unmatched() {
        let content = content_from(BENCHMARK_HTML);
        let outcome = place_highlights(&content, &[sentence("text that never appears", 2)]);

        assert!(outcome.placements.is_empty());
        assert_eq!(outcome.unmatched.len(), 1);
    }

    #[test]
    fn test_contained_term_is_skipped_as_overlap() {
        // The sentence is applied first and fully covers the term's only
        // occurrence, so the term has nowhere left to land.
        let content = content_from(BENCHMARK_HTML);
        let items = vec![
            sentence("The model achieved 92% accuracy on the benchmark", 3),
            term("92%", 3),
        ];
        let outcome = place_highlights(&content, &items);

        assert_eq!(outcome.placements.len(), 1);
        assert_eq!(outcome.placements[0].item.kind, HighlightKind::KeySentence);
        assert_eq!(outcome.unmatched.len(), 1);
        assert_eq!(outcome.unmatched[0].text, "92%");
    }

    #[test]
    fn test_partial_overlap_is_skipped() {
        let content = content_from(BENCHMARK_HTML);
        let items = vec![
            sentence("The model achieved 92%", 3),
            sentence("92% accuracy on the benchmark", 3),
        ];
        let outcome = place_highlights(&content, &items);

        assert_eq!(outcome.placements.len(), 1);
        assert_eq!(outcome.unmatched.len(), 1);
    }

    #[test]
    fn test_disjoint_ranges_in_one_paragraph_both_apply() {
        let content = content_from(BENCHMARK_HTML);
        let items = vec![term("The model", 3), term("new record", 3)];
        let outcome = place_highlights(&content, &items);

        assert_eq!(outcome.placements.len(), 2);
        assert!(outcome.placements[0].abs_end <= outcome.placements[1].abs_start);
    }

    #[test]
    fn test_ids_follow_item_order_even_past_unmatched() {
        let content = content_from(BENCHMARK_HTML);
        let items = vec![
            sentence("Opening remarks", 1),
            sentence("does not exist anywhere", 1),
            term("new record", 3),
        ];
        let outcome = place_highlights(&content, &items);

        let ids: Vec<usize> = outcome.placements.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![0, 2]);
    }

    #[test]
    fn test_match_lands_in_later_text_node() {
        let html = r#"
            <html><body><article>
                <p>Leading words <em>inner emphasis</em> trailing words of the paragraph.</p>
            </article></body></html>
        "#;
        let content = content_from(html);
        let outcome = place_highlights(&content, &[term("inner emphasis", 1)]);

        assert_eq!(outcome.placements.len(), 1);
        assert_eq!(outcome.placements[0].node, 1);
        assert_eq!(outcome.placements[0].start, 0);
    }

    #[test]
    fn test_text_split_across_nodes_is_unmatched() {
        let html = r#"
            <html><body><article>
                <p>Leading words <em>inner emphasis</em> trailing words of the paragraph.</p>
            </article></body></html>
        "#;
        let content = content_from(html);
        // Spans the text-node boundary, so no single node contains it.
        let outcome = place_highlights(&content, &[sentence("words inner emphasis", 1)]);

        assert!(outcome.placements.is_empty());
        assert_eq!(outcome.unmatched.len(), 1);
    }

    #[test]
    fn test_first_containing_paragraph_wins_scan() {
        let html = r#"
            <html><body><article>
                <p>The committee announced the final decision on Tuesday morning.</p>
                <p>Reporters repeated the final decision throughout the afternoon.</p>
            </article></body></html>
        "#;
        let content = content_from(html);
        let outcome = place_highlights(&content, &[term("final decision", 9)]);

        assert_eq!(outcome.placements[0].paragraph, 1);
    }
}
