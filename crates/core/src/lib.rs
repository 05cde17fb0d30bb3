pub mod annotate;
pub mod content;
pub mod dom;
pub mod error;
pub mod matcher;
pub mod page;
pub mod provider;
pub mod reply;
pub mod report;
pub mod session;

pub use annotate::{AnalysisSession, SIDEBAR_ID, STYLE_ID, strip_annotations};
pub use content::{ARTICLE_SELECTORS, ArticleContent, MIN_PARAGRAPH_CHARS, Paragraph, extract_paragraphs};
pub use dom::{Document, Element, HtmlChunk};
pub use error::{MarginaliaError, Result};
pub use matcher::{HighlightPlacement, MatchOutcome, place_highlights};
pub use page::{FetchConfig, PageSource};
pub use provider::{ProviderConfig, build_prompt, request_analysis};
pub use reply::{HighlightItem, HighlightKind, ParsedReply, ReplyShape, parse_reply};
pub use report::PassReport;
pub use session::{AnnotatedPage, Controller, PageContext, PassOutcome, run_pass};
