//! Highlight application and sidebar rendering.
//!
//! An [`AnalysisSession`] owns everything one pass touches: the cleaned
//! document, the paragraph snapshot, and finally the annotated output.
//! Teardown of a previous pass's markup happens when the session begins,
//! so two passes over the same page always leave exactly one sidebar and
//! one set of markers.

use std::collections::BTreeMap;

use crate::content::{ArticleContent, Paragraph, extract_paragraphs};
use crate::dom::{Document, HtmlChunk, escape_text};
use crate::matcher::{HighlightPlacement, MatchOutcome};
use crate::reply::HighlightKind;
use crate::Result;

/// Element id of the summary sidebar container.
pub const SIDEBAR_ID: &str = "article-summary-sidebar";

/// Element id of the injected stylesheet.
pub const STYLE_ID: &str = "marginalia-style";

/// Stylesheet injected into annotated documents. Sentence and term marks
/// get distinct colors; sidebar entries are anchors, and smooth scrolling
/// with a generous scroll margin centers the target in the viewport.
const STYLE_SHEET: &str = r#"
html { scroll-behavior: smooth; }
mark.highlight { padding: 0 1px; border-radius: 2px; scroll-margin-top: 40vh; }
mark.highlight.key_sentence { background-color: #fff566; }
mark.highlight.key_term { background-color: #b7eb8f; }
#article-summary-sidebar { position: fixed; top: 20px; right: 20px; width: 280px; max-height: 80vh; overflow-y: auto; background: #fff; box-shadow: 0 2px 12px rgba(0, 0, 0, 0.15); border-radius: 8px; padding: 12px; z-index: 10000; font-size: 14px; line-height: 1.4; }
#article-summary-sidebar .summary-item { padding: 8px; border-bottom: 1px solid #eee; cursor: pointer; }
#article-summary-sidebar .summary-item:last-child { border-bottom: none; }
#article-summary-sidebar .summary-item a { color: inherit; text-decoration: none; }
"#;

/// Removes all annotation residue from a previous pass.
///
/// Highlight markers are unwrapped (their text is kept), and the sidebar
/// and injected stylesheet are removed. Unannotated documents pass
/// through with only the rewriter's normalization applied; on rewriter
/// failure the input is returned unchanged.
pub fn strip_annotations(html: &str) -> String {
    let mut output = String::new();
    let mut rewriter = lol_html::HtmlRewriter::new(
        lol_html::Settings {
            element_content_handlers: vec![
                lol_html::element!("mark.highlight", |el| {
                    el.remove_and_keep_content();
                    Ok(())
                }),
                lol_html::element!("#article-summary-sidebar", |el| {
                    el.remove();
                    Ok(())
                }),
                lol_html::element!("style#marginalia-style", |el| {
                    el.remove();
                    Ok(())
                }),
            ],
            ..Default::default()
        },
        |c: &[u8]| {
            output.push_str(&String::from_utf8_lossy(c));
        },
    );

    if rewriter.write(html.as_bytes()).is_err() {
        return html.to_string();
    }
    if rewriter.end().is_err() {
        return html.to_string();
    }

    if output.is_empty() { html.to_string() } else { output }
}

/// One analysis pass over one document.
///
/// Created from the raw page HTML; tears down prior annotations, parses,
/// and snapshots the paragraph list once. The snapshot is used for the
/// prompt corpus, for matching, and for rendering, so numbering cannot
/// drift between stages.
pub struct AnalysisSession {
    base: String,
    content: ArticleContent,
}

impl AnalysisSession {
    /// Starts a session: strips prior annotations, parses the document,
    /// and extracts the paragraph snapshot.
    pub fn begin(raw_html: &str) -> Result<Self> {
        let clean = strip_annotations(raw_html);
        let doc = Document::parse(&clean)?;
        let content = extract_paragraphs(&doc)?;
        let base = doc.as_string();

        Ok(Self { base, content })
    }

    /// The paragraph snapshot this session works against.
    pub fn content(&self) -> &ArticleContent {
        &self.content
    }

    /// Renders the annotated document for a match outcome.
    ///
    /// Every placed highlight is wrapped in a `<mark>` classed by its
    /// kind and tagged `highlight-{id}`; the sidebar lists key sentences
    /// in reply order, each entry an anchor to its marker.
    pub fn render(&self, outcome: &MatchOutcome) -> String {
        let mut by_paragraph: BTreeMap<usize, Vec<&HighlightPlacement>> = BTreeMap::new();
        for placement in &outcome.placements {
            by_paragraph.entry(placement.paragraph).or_default().push(placement);
        }

        let mut document = self.base.clone();
        let mut cursor = 0;

        for paragraph in &self.content.paragraphs {
            let Some(found) = document[cursor..].find(&paragraph.outer_html) else {
                // Serialized snapshot and base diverged; leave the paragraph as-is.
                continue;
            };
            let start = cursor + found;
            let end = start + paragraph.outer_html.len();

            match by_paragraph.get(&paragraph.number) {
                Some(placements) => {
                    let rebuilt = rebuild_paragraph(paragraph, placements);
                    document.replace_range(start..end, &rebuilt);
                    cursor = start + rebuilt.len();
                }
                None => {
                    cursor = end;
                }
            }
        }

        let style = format!("<style id=\"{}\">{}</style>", STYLE_ID, STYLE_SHEET);
        match document.find("</head>") {
            Some(pos) => document.insert_str(pos, &style),
            None => document.insert_str(0, &style),
        }

        let sidebar = render_sidebar(outcome);
        match document.rfind("</body>") {
            Some(pos) => document.insert_str(pos, &sidebar),
            None => document.push_str(&sidebar),
        }

        document
    }
}

/// Serializes one paragraph with its highlight markers spliced in.
fn rebuild_paragraph(paragraph: &Paragraph, placements: &[&HighlightPlacement]) -> String {
    let mut out = paragraph.open_tag.clone();
    let mut text_index = 0;

    for chunk in &paragraph.chunks {
        match chunk {
            HtmlChunk::Markup(markup) => out.push_str(markup),
            HtmlChunk::Text(text) => {
                let mut in_node: Vec<&HighlightPlacement> =
                    placements.iter().copied().filter(|p| p.node == text_index).collect();
                in_node.sort_by_key(|p| p.start);
                out.push_str(&render_text_node(text, &in_node));
                text_index += 1;
            }
        }
    }

    out.push_str("</p>");
    out
}

/// Emits a text node's content with marker elements around placed ranges.
fn render_text_node(text: &str, placements: &[&HighlightPlacement]) -> String {
    let mut out = String::new();
    let mut cursor = 0;

    for placement in placements {
        out.push_str(&escape_text(&text[cursor..placement.start]));
        out.push_str(&format!(
            "<mark class=\"highlight {}\" id=\"highlight-{}\" data-highlight-id=\"highlight-{}\">",
            placement.item.kind.css_class(),
            placement.id,
            placement.id
        ));
        out.push_str(&escape_text(&text[placement.start..placement.end]));
        out.push_str("</mark>");
        cursor = placement.end;
    }

    out.push_str(&escape_text(&text[cursor..]));
    out
}

/// Builds the sidebar container: one entry per placed key sentence, in
/// reply order. Key terms never produce entries.
fn render_sidebar(outcome: &MatchOutcome) -> String {
    let mut sidebar = format!("<div id=\"{}\">", SIDEBAR_ID);

    for placement in &outcome.placements {
        if placement.item.kind != HighlightKind::KeySentence {
            continue;
        }
        sidebar.push_str(&format!(
            "<div class=\"summary-item\" data-highlight-id=\"highlight-{id}\" data-type=\"{kind}\"><a href=\"#highlight-{id}\">{text}</a></div>",
            id = placement.id,
            kind = placement.item.kind.css_class(),
            text = escape_text(&placement.item.text),
        ));
    }

    sidebar.push_str("</div>");
    sidebar
}
