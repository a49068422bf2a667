mod common;

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use common::{init_logging, text, PanickingInvoker, ScriptedInvoker};
use engify_relay::{
    router, FallbackEngine, ProviderError, ProviderInvoker, RelayConfig, RelayState,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tower::ServiceExt;

const ORIGIN: &str = "chrome-extension://abcdefghijklmnop";

fn app(invoker: Arc<dyn ProviderInvoker>) -> Router {
    let mut config = RelayConfig::default();
    config.gemini.api_keys = vec!["k0".to_string()];
    router(RelayState::new(FallbackEngine::new(Arc::new(config), invoker)))
}

fn scripted(invoker: ScriptedInvoker) -> (Router, Arc<ScriptedInvoker>) {
    let invoker = Arc::new(invoker);
    (app(invoker.clone()), invoker)
}

fn post(origin: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(origin) = origin {
        builder = builder.header(header::ORIGIN, origin);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn bare(method: &str, origin: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri("/")
        .header(header::ORIGIN, origin)
        .body(Body::empty())
        .unwrap()
}

async fn json_body(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn allow_origin(response: &Response<Body>) -> Option<&str> {
    response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .and_then(|value| value.to_str().ok())
}

#[tokio::test]
async fn success_returns_enhanced_text_with_cors() {
    init_logging();
    let (app, invoker) =
        scripted(ScriptedInvoker::default().reply("Gemma 3 27B", text("Hello world")));

    let response = app
        .oneshot(post(Some(ORIGIN), json!({"text": "helo wrold"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(allow_origin(&response), Some(ORIGIN));
    assert_eq!(
        json_body(response).await,
        json!({"success": true, "enhancedText": "Hello world"})
    );
    assert_eq!(invoker.calls()[0].api_key, "k0");
}

#[tokio::test]
async fn foreign_or_missing_origin_is_forbidden_without_cors() {
    init_logging();
    for origin in [Some("https://evil.example"), None] {
        let (app, invoker) = scripted(ScriptedInvoker::default());

        let response = app
            .oneshot(post(origin, json!({"text": "hello"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(allow_origin(&response), None);
        assert_eq!(json_body(response).await, json!({"error": "Forbidden"}));
        assert!(invoker.calls().is_empty());
    }
}

#[tokio::test]
async fn preflight_returns_cors_headers_and_no_body() {
    init_logging();
    let (app, _) = scripted(ScriptedInvoker::default());

    let response = app.oneshot(bare("OPTIONS", ORIGIN)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(allow_origin(&response), Some(ORIGIN));
    let headers = response.headers();
    assert_eq!(
        headers
            .get(header::ACCESS_CONTROL_ALLOW_METHODS)
            .and_then(|value| value.to_str().ok()),
        Some("POST, OPTIONS")
    );
    assert_eq!(
        headers
            .get(header::ACCESS_CONTROL_ALLOW_HEADERS)
            .and_then(|value| value.to_str().ok()),
        Some("Content-Type")
    );
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(bytes.is_empty());
}

#[tokio::test]
async fn forbidden_wins_over_preflight() {
    init_logging();
    let (app, _) = scripted(ScriptedInvoker::default());

    let response = app
        .oneshot(bare("OPTIONS", "https://evil.example"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn get_reports_liveness() {
    init_logging();
    let (app, _) = scripted(ScriptedInvoker::default());

    let response = app.oneshot(bare("GET", ORIGIN)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({"status": "ok"}));
}

#[tokio::test]
async fn other_methods_are_not_allowed() {
    init_logging();
    let (app, _) = scripted(ScriptedInvoker::default());

    let response = app.oneshot(bare("PUT", ORIGIN)).await.unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(allow_origin(&response), None);
    assert_eq!(json_body(response).await, json!({"error": "Method not allowed"}));
}

#[tokio::test]
async fn validation_failures_are_400_with_cors() {
    init_logging();
    let long = "a".repeat(5001);
    let cases = [
        (json!({}), "Missing or invalid text"),
        (json!({"text": 42}), "Missing or invalid text"),
        (json!({"text": " a "}), "Missing or invalid text"),
        (json!({"text": long}), "Text too long. Maximum 5000 characters."),
        (json!({"text": "hello", "mode": "translate"}), "Unknown mode: translate"),
        (json!({"text": "", "mode": "summarize"}), "Missing context"),
    ];

    for (body, expected) in cases {
        let (app, invoker) = scripted(ScriptedInvoker::default());
        let response = app.oneshot(post(Some(ORIGIN), body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(allow_origin(&response), Some(ORIGIN));
        assert_eq!(json_body(response).await, json!({ "error": expected }));
        assert!(invoker.calls().is_empty());
    }
}

#[tokio::test]
async fn exhausted_providers_answer_429() {
    init_logging();
    let (app, _) = scripted(
        ScriptedInvoker::default()
            .reply("Gemma 3 27B", Err(ProviderError::RateLimited))
            .reply("Gemini 2.5 Flash Lite", Err(ProviderError::RateLimited)),
    );

    let response = app
        .oneshot(post(Some(ORIGIN), json!({"text": "hello"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(allow_origin(&response), Some(ORIGIN));
    assert_eq!(
        json_body(response).await,
        json!({"error": "Gemini 2.5 Flash Lite rate limited"})
    );
}

#[tokio::test]
async fn panics_become_a_generic_500() {
    init_logging();
    let app = app(Arc::new(PanickingInvoker));

    let response = app
        .oneshot(post(Some(ORIGIN), json!({"text": "hello"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(allow_origin(&response), Some(ORIGIN));
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok()),
        Some("application/json")
    );
    assert_eq!(
        json_body(response).await,
        json!({"error": "Internal server error"})
    );
}
