use std::fs;
use std::path::Path;
use std::sync::Once;
use std::time::Duration;

use engify_app::{enhance_page, EnhanceOptions, EnhanceOutcome};
use engify_core::{MSG_FAILED, MSG_NO_CONTEXT};
use engify_engine::{RelaySettings, SettingsStore, UserSettings};
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, header, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engify_logging::initialize_for_tests);
}

fn options(server: &MockServer, dir: &Path, html: &str, selection: &str) -> EnhanceOptions {
    let page = dir.join("page.html");
    fs::write(&page, html).unwrap();
    EnhanceOptions {
        page,
        selection: selection.to_string(),
        relay: RelaySettings {
            endpoint: format!("{}/", server.uri()),
            initial_retry_delay: Duration::from_millis(5),
            ..RelaySettings::default()
        },
        settings_dir: dir.join("settings"),
        timeout: Duration::from_secs(5),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn textarea_text_is_replaced_and_printed() {
    init_logging();
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    SettingsStore::new(temp.path().join("settings"))
        .save(&UserSettings {
            api_key: Some("user-key".to_string()),
        })
        .unwrap();
    Mock::given(method("POST"))
        .and(header("origin", "chrome-extension://engify"))
        .and(body_partial_json(json!({"text": "helo wrold", "apiKey": "user-key"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"success": true, "enhancedText": "Hello world"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let options = options(
        &server,
        temp.path(),
        r#"<textarea autofocus>ping: helo wrold</textarea>"#,
        "helo wrold",
    );

    let outcome = enhance_page(&options).unwrap();
    assert_eq!(outcome, EnhanceOutcome::Replaced("ping: Hello world".to_string()));
}

#[tokio::test(flavor = "multi_thread")]
async fn relay_error_is_reported_as_failure() {
    init_logging();
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"error": "Missing or invalid text"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let options = options(
        &server,
        temp.path(),
        r#"<div contenteditable="true">some words here</div>"#,
        "words",
    );

    let outcome = enhance_page(&options).unwrap();
    assert_eq!(outcome, EnhanceOutcome::Failed(MSG_FAILED.to_string()));
}

#[tokio::test(flavor = "multi_thread")]
async fn summarize_without_thread_fails_locally() {
    init_logging();
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let options = options(
        &server,
        temp.path(),
        r#"<textarea>/summarize</textarea>"#,
        "/summarize",
    );

    let outcome = enhance_page(&options).unwrap();
    assert_eq!(outcome, EnhanceOutcome::Failed(MSG_NO_CONTEXT.to_string()));
}

#[test]
fn missing_selection_is_an_error() {
    let temp = TempDir::new().unwrap();
    let page = temp.path().join("page.html");
    fs::write(&page, "<p>static only</p>").unwrap();

    let options = EnhanceOptions {
        page,
        selection: "static".to_string(),
        relay: RelaySettings::default(),
        settings_dir: temp.path().to_path_buf(),
        timeout: Duration::from_secs(1),
    };

    let err = enhance_page(&options).unwrap_err();
    assert!(err.to_string().contains("not found in an editable region"));
}
