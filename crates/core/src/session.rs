//! Analysis session runtime.
//!
//! A [`Controller`] drives a spawned analyzer task over typed channels:
//! it probes liveness with `Ping`, triggers work with `Analyze`, and
//! re-spawns exactly once when the channel turns out to be dead. The
//! analyzer acknowledges `Analyze` immediately and runs the pass in the
//! background; results arrive on a separate outcome channel.
//!
//! The analyzer signals readiness explicitly rather than the controller
//! sleeping a fixed settle delay after spawning, and a busy analyzer
//! answers `Busy` instead of letting two passes interleave.

use std::time::Duration;

use reqwest::Client;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use url::Url;

use crate::annotate::AnalysisSession;
use crate::matcher::place_highlights;
use crate::provider::{ProviderConfig, build_prompt, request_analysis};
use crate::reply::parse_reply;
use crate::report::PassReport;
use crate::{MarginaliaError, Result};

/// How long the controller waits for the analyzer's ready signal.
const READY_TIMEOUT: Duration = Duration::from_millis(1000);

/// Control channel depth; requests beyond this are backpressured.
const CONTROL_QUEUE: usize = 8;

/// Requests the controller can send.
#[derive(Debug)]
pub enum ControlRequest {
    /// Liveness probe.
    Ping,
    /// Start an analysis pass.
    Analyze,
}

/// Acknowledgments the analyzer sends back.
#[derive(Debug, PartialEq, Eq)]
pub enum ControlReply {
    /// Probe acknowledged.
    Ok,
    /// Pass accepted and started.
    Started,
    /// A pass is already in flight; this trigger is rejected.
    Busy,
}

struct Envelope {
    request: ControlRequest,
    reply: oneshot::Sender<ControlReply>,
}

/// Everything an analyzer needs to run passes over one page.
#[derive(Clone, Debug)]
pub struct PageContext {
    /// Raw page HTML.
    pub html: String,
    /// Source URL when the page came from the web.
    pub source_url: Option<Url>,
    /// Model service settings.
    pub provider: ProviderConfig,
}

/// The finished product of a successful pass.
#[derive(Clone, Debug)]
pub struct AnnotatedPage {
    /// Annotated document HTML.
    pub html: String,
    /// Pass summary.
    pub report: PassReport,
}

/// What a pass ended with, delivered on the outcome channel.
#[derive(Debug)]
pub enum PassOutcome {
    /// The pass produced an annotated page.
    Completed(Box<AnnotatedPage>),
    /// The pass aborted.
    Failed(MarginaliaError),
}

struct AnalyzerHandle {
    tx: mpsc::Sender<Envelope>,
    task: JoinHandle<()>,
}

/// Runs one full analysis pass: teardown + snapshot, prompt, model call,
/// reply parsing, placement, rendering.
pub async fn run_pass(ctx: &PageContext, client: &Client) -> Result<AnnotatedPage> {
    let session = AnalysisSession::begin(&ctx.html)?;
    if session.content().is_empty() {
        return Err(MarginaliaError::NoContent);
    }
    debug!(paragraphs = session.content().len(), "extracted paragraph snapshot");

    let prompt = build_prompt(session.content());
    let raw = request_analysis(client, &ctx.provider, &prompt).await?;
    let reply = parse_reply(&raw)?;
    debug!(items = reply.items.len(), shape = ?reply.shape, "parsed model reply");

    let outcome = place_highlights(session.content(), &reply.items);
    if !outcome.unmatched.is_empty() {
        warn!(skipped = outcome.unmatched.len(), "some highlights had no match");
    }

    let report = PassReport::new(session.content(), &reply, &outcome);
    let html = session.render(&outcome);

    info!(
        matched = report.matched,
        skipped = report.skipped,
        "analysis pass complete"
    );
    Ok(AnnotatedPage { html, report })
}

async fn analyzer_loop(
    mut rx: mpsc::Receiver<Envelope>, ctx: PageContext, outcomes: mpsc::Sender<PassOutcome>,
    ready: oneshot::Sender<()>,
) {
    let client = Client::new();
    let _ = ready.send(());

    let mut in_flight: Option<JoinHandle<()>> = None;
    while let Some(envelope) = rx.recv().await {
        match envelope.request {
            ControlRequest::Ping => {
                let _ = envelope.reply.send(ControlReply::Ok);
            }
            ControlRequest::Analyze => {
                if in_flight.as_ref().is_some_and(|task| !task.is_finished()) {
                    let _ = envelope.reply.send(ControlReply::Busy);
                    continue;
                }
                let _ = envelope.reply.send(ControlReply::Started);

                let ctx = ctx.clone();
                let client = client.clone();
                let outcomes = outcomes.clone();
                in_flight = Some(tokio::spawn(async move {
                    let outcome = match run_pass(&ctx, &client).await {
                        Ok(page) => PassOutcome::Completed(Box::new(page)),
                        Err(err) => PassOutcome::Failed(err),
                    };
                    let _ = outcomes.send(outcome).await;
                }));
            }
        }
    }
}

/// Spawns an analyzer for a page and waits for its ready signal.
async fn spawn_analyzer(ctx: PageContext, outcomes: mpsc::Sender<PassOutcome>) -> Result<AnalyzerHandle> {
    let (tx, rx) = mpsc::channel(CONTROL_QUEUE);
    let (ready_tx, ready_rx) = oneshot::channel();
    let task = tokio::spawn(analyzer_loop(rx, ctx, outcomes, ready_tx));

    match timeout(READY_TIMEOUT, ready_rx).await {
        Ok(Ok(())) => Ok(AnalyzerHandle { tx, task }),
        _ => {
            task.abort();
            Err(MarginaliaError::Injection("analyzer never signalled readiness".to_string()))
        }
    }
}

/// Drives analysis of one page.
///
/// Owns the page context, (re)spawns the analyzer as needed, and relays
/// the single `analyze` command with a one-retry policy for
/// an unreachable receiver.
pub struct Controller {
    page: PageContext,
    analyzer: Option<AnalyzerHandle>,
    outcomes_tx: mpsc::Sender<PassOutcome>,
    outcomes_rx: mpsc::Receiver<PassOutcome>,
}

impl Controller {
    /// Creates a controller for one page.
    pub fn new(page: PageContext) -> Self {
        let (outcomes_tx, outcomes_rx) = mpsc::channel(CONTROL_QUEUE);
        Self { page, analyzer: None, outcomes_tx, outcomes_rx }
    }

    /// Triggers one analysis pass.
    ///
    /// Precondition: a page loaded from the web must be http(s). Probes
    /// the analyzer, spawns it if unreachable, and sends `analyze`. If
    /// that send finds the receiver gone, the controller re-spawns and
    /// re-sends exactly once; a second failure is terminal.
    ///
    /// Returns once the pass is accepted; the result arrives via
    /// [`Controller::recv_outcome`].
    pub async fn trigger_analysis(&mut self) -> Result<()> {
        if let Some(url) = &self.page.source_url {
            if !matches!(url.scheme(), "http" | "https") {
                return Err(MarginaliaError::UnsupportedPage(url.to_string()));
            }
        }

        if !self.probe().await {
            debug!("analyzer not reachable, spawning");
            self.inject().await?;
        }

        match self.send(ControlRequest::Analyze).await {
            Ok(reply) => accept(reply),
            Err(MarginaliaError::ChannelUnreachable(reason)) => {
                warn!(%reason, "analyze send failed, re-spawning once");
                self.inject().await?;
                accept(self.send(ControlRequest::Analyze).await?)
            }
            Err(err) => Err(err),
        }
    }

    /// Waits for the next pass outcome.
    pub async fn recv_outcome(&mut self) -> Result<AnnotatedPage> {
        match self.outcomes_rx.recv().await {
            Some(PassOutcome::Completed(page)) => Ok(*page),
            Some(PassOutcome::Failed(err)) => Err(err),
            None => Err(MarginaliaError::ChannelUnreachable("outcome channel closed".to_string())),
        }
    }

    async fn probe(&mut self) -> bool {
        match self.send(ControlRequest::Ping).await {
            Ok(reply) => reply == ControlReply::Ok,
            Err(_) => false,
        }
    }

    async fn inject(&mut self) -> Result<()> {
        if let Some(old) = self.analyzer.take() {
            old.task.abort();
        }
        let handle = spawn_analyzer(self.page.clone(), self.outcomes_tx.clone()).await?;
        self.analyzer = Some(handle);
        Ok(())
    }

    async fn send(&mut self, request: ControlRequest) -> Result<ControlReply> {
        let Some(analyzer) = &self.analyzer else {
            return Err(MarginaliaError::ChannelUnreachable("no analyzer".to_string()));
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        analyzer
            .tx
            .send(Envelope { request, reply: reply_tx })
            .await
            .map_err(|_| MarginaliaError::ChannelUnreachable("receiver gone".to_string()))?;

        reply_rx
            .await
            .map_err(|_| MarginaliaError::ChannelUnreachable("no acknowledgment".to_string()))
    }
}

fn accept(reply: ControlReply) -> Result<()> {
    match reply {
        ControlReply::Busy => Err(MarginaliaError::Busy),
        ControlReply::Started | ControlReply::Ok => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE: &str = r#"
        <html><head><title>Report</title></head><body><article>
            <p>The model achieved 92% accuracy on the benchmark, a new record.</p>
            <p>Training required four days on the previously described cluster.</p>
        </article></body></html>
    "#;

    fn reply_body(content: &str) -> serde_json::Value {
        serde_json::json!({"choices": [{"message": {"role": "assistant", "content": content}}]})
    }

    fn context(endpoint: String) -> PageContext {
        PageContext {
            html: PAGE.to_string(),
            source_url: None,
            provider: ProviderConfig {
                endpoint,
                api_key: "test-key".to_string(),
                ..Default::default()
            },
        }
    }

    async fn mock_model(content: &str, delay: Duration) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(reply_body(content))
                    .set_delay(delay),
            )
            .mount(&server)
            .await;
        server
    }

    const GOOD_REPLY: &str = r#"```json
{"sentences": [{"text": "a new record", "paragraph": 1}],
 "terms": [{"text": "four days", "paragraph": 2}]}
```"#;

    #[tokio::test]
    async fn test_probe_and_analyze_round_trip() {
        let server = mock_model(GOOD_REPLY, Duration::ZERO).await;
        let mut controller = Controller::new(context(server.uri()));

        assert!(!controller.probe().await);
        controller.trigger_analysis().await.unwrap();
        assert!(controller.probe().await);

        let page = controller.recv_outcome().await.unwrap();
        assert!(page.html.contains("highlight key_sentence"));
        assert_eq!(page.report.matched, 2);
    }

    #[tokio::test]
    async fn test_non_web_url_rejected() {
        let mut controller = Controller::new(PageContext {
            source_url: Some(Url::parse("ftp://example.com/article").unwrap()),
            ..context("http://unused.invalid".to_string())
        });

        let result = controller.trigger_analysis().await;
        assert!(matches!(result, Err(MarginaliaError::UnsupportedPage(_))));
    }

    #[tokio::test]
    async fn test_second_trigger_while_busy_is_rejected() {
        let server = mock_model(GOOD_REPLY, Duration::from_millis(400)).await;
        let mut controller = Controller::new(context(server.uri()));

        controller.trigger_analysis().await.unwrap();
        let second = controller.trigger_analysis().await;
        assert!(matches!(second, Err(MarginaliaError::Busy)));

        controller.recv_outcome().await.unwrap();
    }

    #[tokio::test]
    async fn test_dead_analyzer_is_respawned() {
        let server = mock_model(GOOD_REPLY, Duration::ZERO).await;
        let mut controller = Controller::new(context(server.uri()));

        controller.trigger_analysis().await.unwrap();
        controller.recv_outcome().await.unwrap();

        // Simulate the page navigating away: the analyzer task dies.
        if let Some(analyzer) = &controller.analyzer {
            analyzer.task.abort();
        }
        tokio::time::sleep(Duration::from_millis(20)).await;

        controller.trigger_analysis().await.unwrap();
        let page = controller.recv_outcome().await.unwrap();
        assert!(page.html.contains("article-summary-sidebar"));
    }

    #[tokio::test]
    async fn test_api_failure_reaches_outcome_channel() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let mut controller = Controller::new(context(server.uri()));
        controller.trigger_analysis().await.unwrap();

        let result = controller.recv_outcome().await;
        assert!(matches!(result, Err(MarginaliaError::ApiRequest { status: 500 })));
    }

    #[tokio::test]
    async fn test_empty_page_fails_with_no_content() {
        let server = mock_model(GOOD_REPLY, Duration::ZERO).await;
        let mut controller = Controller::new(PageContext {
            html: "<html><body><p>Too short.</p></body></html>".to_string(),
            ..context(server.uri())
        });

        controller.trigger_analysis().await.unwrap();
        let result = controller.recv_outcome().await;
        assert!(matches!(result, Err(MarginaliaError::NoContent)));
    }
}
