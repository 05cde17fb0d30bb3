//! Error types for Marginalia operations.
//!
//! This module defines the main error type [`MarginaliaError`] which represents
//! all possible errors that can occur while extracting paragraphs, querying the
//! analysis model, and placing highlights.
//!
//! # Example
//!
//! ```rust
//! use marginalia_core::{MarginaliaError, Result};
//!
//! fn check_corpus(paragraphs: &[String]) -> Result<()> {
//!     if paragraphs.is_empty() {
//!         return Err(MarginaliaError::NoContent);
//!     }
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Main error type for article highlighting operations.
///
/// Failures split into two tiers. Pass-level failures (everything below)
/// abort the analysis pass and surface a single message to the user.
/// Entry-level problems, such as a reply entry missing its text or a
/// highlight whose target cannot be located, are logged and dropped
/// without ever becoming a variant here.
#[derive(Error, Debug)]
pub enum MarginaliaError {
    /// The page source is not an http(s) URL.
    ///
    /// Analysis is only triggered for web pages; anything else is rejected
    /// before any other work happens.
    #[error("Not a web page: {0}")]
    UnsupportedPage(String),

    /// Spawning the page analyzer failed.
    ///
    /// Returned when the analyzer task could not be started, or never
    /// signalled readiness.
    #[error("Failed to start page analyzer: {0}")]
    Injection(String),

    /// The analyzer's message channel is gone.
    ///
    /// Returned when a control message cannot be delivered because the
    /// receiving end no longer exists. The controller retries exactly once
    /// after re-spawning the analyzer; a second failure is terminal.
    #[error("Analyzer unreachable: {0}")]
    ChannelUnreachable(String),

    /// An analysis pass is already in flight.
    ///
    /// A second `analyze` trigger is rejected, not queued, while a pass runs.
    #[error("Analysis already in progress")]
    Busy,

    /// The model service answered with a non-success HTTP status.
    #[error("Model request failed with status {status}")]
    ApiRequest { status: u16 },

    /// The model reply could not be parsed under any fallback.
    ///
    /// Tried in order: fenced JSON block, raw content, content with fence
    /// markers stripped.
    #[error("Unparseable model reply: {0}")]
    MalformedResponse(String),

    /// The parsed reply is missing a required field.
    #[error("Model reply missing required field `{0}`")]
    IncompleteSchema(&'static str),

    /// Nothing usable to highlight.
    ///
    /// Returned when the paragraph corpus is empty, or when every reply
    /// entry was discarded during filtering.
    #[error("No usable highlight content")]
    NoContent,

    /// HTTP transport errors from reqwest.
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Request timeout.
    #[error("Request timed out after {timeout} seconds")]
    Timeout { timeout: u64 },

    /// Invalid URL provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// HTML parsing errors, typically an invalid CSS selector.
    #[error("Failed to parse HTML: {0}")]
    HtmlParseError(String),

    /// File I/O errors.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// File not found.
    #[error("File not found: {0}")]
    FileNotFound(std::path::PathBuf),
}

/// Result type alias for MarginaliaError.
///
/// This is a convenience alias for `std::result::Result<T, MarginaliaError>`.
pub type Result<T> = std::result::Result<T, MarginaliaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_page_display() {
        let err = MarginaliaError::UnsupportedPage("file:///etc/hosts".to_string());
        assert!(err.to_string().contains("Not a web page"));
    }

    #[test]
    fn test_api_request_carries_status() {
        let err = MarginaliaError::ApiRequest { status: 429 };
        assert!(err.to_string().contains("429"));
    }

    #[test]
    fn test_incomplete_schema_names_field() {
        let err = MarginaliaError::IncompleteSchema("sentences");
        assert!(err.to_string().contains("sentences"));
    }

    #[test]
    fn test_timeout_error() {
        let err = MarginaliaError::Timeout { timeout: 30 };
        assert!(err.to_string().contains("30"));
    }
}
