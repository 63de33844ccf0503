use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use tempfile::{TempDir, tempdir};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn home_with_user() -> TempDir {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("config.toml"), "[user]\nname = \"Ada\"\n").unwrap();
    dir
}

async fn mock_scrape(server: &MockServer, text: &str) {
    Mock::given(method("POST"))
        .and(path("/api/scrape"))
        .and(body_partial_json(json!({ "url": "https://example.com/" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "textContent": text })))
        .mount(server)
        .await;
}

fn ask_cmd(server: &MockServer, home: &TempDir) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("sitechat");
    cmd.env("SITECHAT_HOME", home.path())
        .env("SITECHAT_CHAT_URL", format!("{}/api/chat", server.uri()))
        .env("SITECHAT_SCRAPE_URL", format!("{}/api/scrape", server.uri()))
        .args(["ask", "--url", "example.com", "--prompt", "What is this?"]);
    cmd
}

// The binary blocks the test thread, so the mock server needs other workers.
#[tokio::test(flavor = "multi_thread")]
async fn test_ask_streams_answer() {
    let server = MockServer::start().await;
    mock_scrape(&server, "Example Domain. Use for illustrative examples.").await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(
            json!({ "messages": [{ "role": "system" }, { "role": "user", "content": "What is this?" }] }),
        ))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/plain; charset=utf-8")
                .set_body_string("It is an example page."),
        )
        .expect(1)
        .mount(&server)
        .await;

    let home = home_with_user();
    ask_cmd(&server, &home)
        .assert()
        .success()
        .stdout("It is an example page.\n");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ask_transport_error_exits_nonzero() {
    let server = MockServer::start().await;
    mock_scrape(&server, "Example Domain").await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_json(json!({ "error": { "message": "model overloaded" } })),
        )
        .mount(&server)
        .await;

    let home = home_with_user();
    ask_cmd(&server, &home)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("model overloaded"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ask_scrape_failure_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/scrape"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let home = home_with_user();
    ask_cmd(&server, &home)
        .assert()
        .failure()
        .stderr(predicate::str::contains("There was an error reading the site"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ask_without_user_asks_to_sign_up() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let home = tempdir().unwrap();
    ask_cmd(&server, &home)
        .assert()
        .failure()
        .stderr(predicate::str::contains("sign up"));
}
