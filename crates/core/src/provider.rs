//! Model service client.
//!
//! One analysis pass makes exactly one request to an OpenAI-compatible
//! chat-completions endpoint: the serialized paragraph corpus plus an
//! instruction block go out, the assistant's reply content comes back as a
//! raw string for [`crate::reply`] to parse. There is no retry and no
//! backoff here; a non-success status fails the pass.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::content::ArticleContent;
use crate::{MarginaliaError, Result};

/// Bytes of serialized corpus per requested key sentence.
const CHARS_PER_SENTENCE: usize = 500;

/// Approximate cap on the length of a returned key sentence, in words.
const MAX_SENTENCE_WORDS: usize = 30;

/// Configuration for the model service endpoint.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Chat-completions endpoint URL.
    pub endpoint: String,
    /// Bearer credential.
    pub api_key: String,
    /// Model identifier sent in the request body.
    pub model: String,
    /// Request timeout in seconds.
    pub timeout: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.deepseek.com/v1/chat/completions".to_string(),
            api_key: String::new(),
            model: "deepseek-chat".to_string(),
            timeout: 120,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: String,
}

/// Builds the analysis prompt for a paragraph corpus.
///
/// The target sentence count scales with corpus size; the reply schema and
/// the verbatim-substring requirement are spelled out so the reply parser
/// usually gets a fenced JSON block back.
pub fn build_prompt(content: &ArticleContent) -> String {
    let corpus = content.serialize();
    let sentence_target = corpus.len() / CHARS_PER_SENTENCE;

    format!(
        r#"Analyze the following article and extract its key sentences and key terms.

Requirements:
1. Key sentences ("sentences"):
   - Pick roughly {sentence_target} key sentences, spread evenly across the article
   - Each sentence must be complete but short (at most {MAX_SENTENCE_WORDS} words)
   - Each must be copied verbatim from the given paragraphs; never reword
   - Several sentences may come from the same paragraph
   - Prefer core claims, important data points, and conclusions

2. Key terms ("terms"):
   - Extract important new names, links, dates, and numbers
   - Each term must be short, precise, and appear verbatim in the text
   - Pay attention to proper nouns, concrete figures, and technical vocabulary

Reply with JSON in exactly this shape:
{{
  "sentences": [
    {{"text": "first key sentence", "paragraph": 1}},
    {{"text": "second key sentence", "paragraph": 2}}
  ],
  "terms": [
    {{"text": "first term", "paragraph": 1}},
    {{"text": "second term", "paragraph": 3}}
  ]
}}

Article content (JSON):
{corpus}"#
    )
}

/// Requests an analysis of the corpus from the model service.
///
/// Sends a single POST with bearer authorization and returns the
/// assistant's reply content.
///
/// # Errors
///
/// [`MarginaliaError::ApiRequest`] on a non-success status,
/// [`MarginaliaError::Timeout`] when the request exceeds the configured
/// timeout, [`MarginaliaError::MalformedResponse`] when the reply envelope
/// has no assistant content.
pub async fn request_analysis(client: &Client, config: &ProviderConfig, prompt: &str) -> Result<String> {
    let body = ChatRequest {
        model: &config.model,
        messages: vec![ChatMessage { role: "user", content: prompt }],
    };

    let response = client
        .post(&config.endpoint)
        .bearer_auth(&config.api_key)
        .timeout(Duration::from_secs(config.timeout))
        .json(&body)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                MarginaliaError::Timeout { timeout: config.timeout }
            } else {
                MarginaliaError::HttpError(e)
            }
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(MarginaliaError::ApiRequest { status: status.as_u16() });
    }

    let reply: ChatResponse = response.json().await?;
    let content = reply
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content)
        .unwrap_or_default();

    if content.is_empty() {
        return Err(MarginaliaError::MalformedResponse("reply has no assistant content".to_string()));
    }

    Ok(content)
}
