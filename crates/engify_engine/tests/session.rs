use std::sync::Once;
use std::time::{Duration, Instant};

use engify_core::dom::{DomEvent, DomEventKind, DomView};
use engify_core::{InteractionTarget, Phase, Viewport, MSG_FAILED, MSG_NO_CONTEXT};
use engify_engine::{
    element_by_id, load_document, select_text, PageSession, RelayClient, RelayHandle,
    RelaySettings,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engify_logging::initialize_for_tests);
}

fn relay_for(server: &MockServer) -> RelayHandle {
    RelayHandle::new(RelayClient::new(RelaySettings {
        endpoint: format!("{}/", server.uri()),
        initial_retry_delay: Duration::from_millis(5),
        ..RelaySettings::default()
    }))
}

/// Simulates a pointer-up after the user selected `needle` and lets the debounce settle.
fn select(session: &mut PageSession, needle: &str) {
    assert!(select_text(session.document_mut(), needle));
    let now = Instant::now();
    session.interaction(now, InteractionTarget::Page);
    session.tick(now + Duration::from_millis(60));
}

#[tokio::test(flavor = "multi_thread")]
async fn textarea_selection_is_enhanced_in_place() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"text": "helo wrold", "mode": "enhance"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"success": true, "enhancedText": "Hello world"})),
        )
        .mount(&server)
        .await;

    let document = load_document(r#"<body><textarea id="box">helo wrold</textarea></body>"#);
    let field = element_by_id(&document, "box").expect("textarea");
    let mut session = PageSession::new(document, relay_for(&server));

    select(&mut session, "helo wrold");
    assert_eq!(session.state().view().affordance.label, "Fix me!");
    assert!(session.affordance_placement(30.0).is_some());

    session.activate(Instant::now());
    assert_eq!(session.state().phase(), Phase::Busy);
    assert!(session.wait_until_settled(Duration::from_secs(5)));

    assert_eq!(session.state().phase(), Phase::Idle);
    assert_eq!(session.document().field_value(field), Some("Hello world"));
    assert_eq!(
        session.document().events(),
        &[
            DomEvent {
                target: field,
                kind: DomEventKind::Input
            },
            DomEvent {
                target: field,
                kind: DomEventKind::Change
            },
        ]
    );
    assert!(!session.state().view().affordance.visible);
}

#[tokio::test(flavor = "multi_thread")]
async fn contenteditable_selection_is_replaced() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"success": true, "enhancedText": "this"})),
        )
        .mount(&server)
        .await;

    let document = load_document(
        r#"<body><div id="editor" contenteditable="true"><p>fix thsi line</p></div></body>"#,
    );
    let editor = element_by_id(&document, "editor").expect("editor");
    let mut session = PageSession::new(document, relay_for(&server));

    select(&mut session, "thsi");
    session.activate(Instant::now());
    assert!(session.wait_until_settled(Duration::from_secs(5)));

    assert_eq!(session.document().text_of(editor), "fix this line");
}

#[tokio::test(flavor = "multi_thread")]
async fn relay_failure_shows_message_and_hides_later() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({"error": "All models failed"})))
        .mount(&server)
        .await;

    let document = load_document(r#"<textarea>some text</textarea>"#);
    let mut session = PageSession::new(document, relay_for(&server));

    select(&mut session, "some");
    session.activate(Instant::now());
    assert!(session.wait_until_settled(Duration::from_secs(5)));

    assert_eq!(session.state().phase(), Phase::Failed);
    assert_eq!(session.state().view().affordance.label, MSG_FAILED);
    assert_eq!(session.document().field_value(1), Some("some text"));

    let deadline = session.next_deadline().expect("hide timer");
    session.tick(deadline);
    assert_eq!(session.state().phase(), Phase::Idle);
    assert!(!session.state().view().affordance.visible);
}

#[tokio::test(flavor = "multi_thread")]
async fn summarize_without_context_never_calls_relay() {
    init_logging();
    let server = MockServer::start().await;

    let document = load_document(r#"<textarea>/summarize</textarea>"#);
    let mut session = PageSession::new(document, relay_for(&server));

    select(&mut session, "/summarize");
    assert_eq!(session.state().view().affordance.label, "Summarize");
    session.activate(Instant::now());

    assert_eq!(session.state().view().affordance.label, MSG_NO_CONTEXT);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn summarize_sends_thread_context() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "text": "",
            "context": "Can we ship today?\n\nOnly after the review.",
            "mode": "summarize"
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"success": true, "enhancedText": "Ship after review."})),
        )
        .mount(&server)
        .await;

    let document = load_document(
        r#"<body><div class="chat-thread">
            <div class="message">Can we ship today?</div>
            <div class="message">Only after the review.</div>
            <div class="composer"><textarea id="reply">/summarize</textarea></div>
        </div></body>"#,
    );
    let field = element_by_id(&document, "reply").expect("reply");
    let mut session = PageSession::new(document, relay_for(&server));

    select(&mut session, "/summarize");
    session.activate(Instant::now());
    assert!(session.wait_until_settled(Duration::from_secs(5)));

    assert_eq!(
        session.document().field_value(field),
        Some("Ship after review.")
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn hidden_page_ignores_interactions() {
    init_logging();
    let server = MockServer::start().await;
    let document = load_document(r#"<textarea autofocus>hello there</textarea>"#);
    let mut session = PageSession::new(document, relay_for(&server));

    session.set_hidden(Instant::now(), true);
    assert!(select_text(session.document_mut(), "hello"));
    let now = Instant::now();
    session.interaction(now, InteractionTarget::Page);
    session.tick(now + Duration::from_millis(60));
    assert!(!session.state().view().affordance.visible);

    session.set_hidden(Instant::now(), false);
    select(&mut session, "hello");
    assert!(session.state().view().affordance.visible);

    session.pointer_down_outside(Instant::now());
    assert!(!session.state().view().affordance.visible);
}

#[tokio::test(flavor = "multi_thread")]
async fn affordance_flips_below_near_the_top() {
    init_logging();
    let server = MockServer::start().await;
    let document = load_document(r#"<textarea>hello there</textarea>"#);
    let mut session = PageSession::new(document, relay_for(&server));
    session.set_viewport(Viewport {
        scroll_x: 0.0,
        scroll_y: 0.0,
    });

    select(&mut session, "hello");
    let placement = session.affordance_placement(30.0).expect("placement");
    assert!(!placement.above);
    assert_eq!(placement.top, 24.0 + 5.0);
}

#[tokio::test(flavor = "multi_thread")]
async fn releasing_on_the_affordance_keeps_the_selection() {
    init_logging();
    let server = MockServer::start().await;
    let document = load_document(r#"<textarea autofocus>hello there</textarea>"#);
    let mut session = PageSession::new(document, relay_for(&server));

    select(&mut session, "hello");
    assert!(session.state().view().affordance.visible);

    // Clicking the affordance collapses the page selection; the pointer-up lands on it.
    assert!(select_text(session.document_mut(), "there"));
    session.interaction(Instant::now(), InteractionTarget::Affordance);
    assert_eq!(session.next_deadline(), None);

    session.interaction(Instant::now(), InteractionTarget::Page);
    assert!(session.next_deadline().is_some());
}
