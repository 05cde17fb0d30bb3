//! CLI integration tests
use std::io::Write;

use predicates::prelude::*;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

fn cmd() -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::cargo_bin("marginalia").unwrap();
    cmd.env_remove("MARGINALIA_API_KEY");
    cmd
}

fn article_file() -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"<html><head><title>Report</title></head><body><article>
            <p>The model achieved 92% accuracy on the benchmark, a new record.</p>
            <p>Training required four days on the previously described cluster.</p>
        </article></body></html>"#
    )
    .unwrap();
    file
}

#[test]
fn test_cli_requires_api_key() {
    cmd()
        .arg("article.html")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--api-key"));
}

#[test]
fn test_cli_rejects_non_web_scheme() {
    cmd()
        .args(["--api-key", "dummy", "chrome://extensions"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unusable input"));
}

#[test]
fn test_cli_missing_file() {
    cmd()
        .args(["--api-key", "dummy", "/nonexistent/article.html"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load page"));
}

#[test]
fn test_cli_help_lists_input() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("INPUT"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cli_annotates_file_input() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content":
                "```json\n{\"sentences\": [{\"text\": \"a new record\", \"paragraph\": 1}], \"terms\": [{\"text\": \"four days\", \"paragraph\": 2}]}\n```"
            }}]
        })))
        .mount(&server)
        .await;

    let file = article_file();
    cmd()
        .args(["--api-key", "test-key", "--endpoint", &server.uri(), "--report"])
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("highlight key_sentence"))
        .stdout(predicate::str::contains("article-summary-sidebar"))
        .stderr(predicate::str::contains("\"matched\": 2"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cli_writes_output_file() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content":
                "{\"sentences\": [{\"text\": \"a new record\", \"paragraph\": 1}], \"terms\": []}"
            }}]
        })))
        .mount(&server)
        .await;

    let file = article_file();
    let tmp = tempfile::TempDir::new().unwrap();
    let output = tmp.path().join("annotated.html");

    cmd()
        .args(["--api-key", "test-key", "--endpoint", &server.uri()])
        .args(["-o", output.to_str().unwrap()])
        .arg(file.path())
        .assert()
        .success();

    let written = std::fs::read_to_string(&output).unwrap();
    assert!(written.contains("<mark"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cli_surfaces_api_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let file = article_file();
    cmd()
        .args(["--api-key", "bad-key", "--endpoint", &server.uri()])
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Analysis failed"));
}
