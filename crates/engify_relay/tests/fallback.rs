mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use common::{blocked, enhance, init_logging, text, ScriptedInvoker};
use engify_core::Mode;
use engify_relay::{
    pick_key, Extraction, FallbackEngine, ModelEntry, ProviderError, ProviderKind, RelayConfig,
    RelayError, ValidatedRequest, ALL_MODELS_FAILED,
};
use pretty_assertions::assert_eq;

const GEMMA: &str = "Gemma 3 27B";
const FLASH_LITE: &str = "Gemini 2.5 Flash Lite";

fn keyed_config() -> RelayConfig {
    let mut config = RelayConfig::default();
    config.gemini.api_keys = vec!["k0".to_string(), "k1".to_string()];
    config
}

fn engine(config: RelayConfig, invoker: &Arc<ScriptedInvoker>) -> FallbackEngine {
    FallbackEngine::new(Arc::new(config), invoker.clone()).with_clock(Arc::new(|| 0))
}

#[tokio::test]
async fn first_success_stops_the_walk() {
    init_logging();
    let invoker = Arc::new(ScriptedInvoker::default().reply(GEMMA, text("  Hello world\n")));

    let result = engine(keyed_config(), &invoker)
        .handle(&enhance("helo wrold"))
        .await;

    assert_eq!(result, Ok("Hello world".to_string()));
    assert_eq!(invoker.labels(), vec![GEMMA.to_string()]);
    let prompt = &invoker.calls()[0].prompt;
    assert!(prompt.ends_with("---TEXT TO PROCESS---\nhelo wrold\n---END---"));
}

#[tokio::test]
async fn rate_limit_moves_to_the_next_provider() {
    init_logging();
    let invoker = Arc::new(
        ScriptedInvoker::default()
            .reply(GEMMA, Err(ProviderError::RateLimited))
            .reply(FLASH_LITE, text("Fixed")),
    );

    let result = engine(keyed_config(), &invoker)
        .handle(&enhance("fix me"))
        .await;

    assert_eq!(result, Ok("Fixed".to_string()));
    assert_eq!(invoker.labels(), vec![GEMMA.to_string(), FLASH_LITE.to_string()]);
}

#[tokio::test]
async fn block_is_terminal_even_after_rate_limits() {
    init_logging();
    let mut config = keyed_config();
    config.enhance.push(ModelEntry::new(ProviderKind::Gemini, "third", "Third"));
    let invoker = Arc::new(
        ScriptedInvoker::default()
            .reply(GEMMA, Err(ProviderError::RateLimited))
            .reply(FLASH_LITE, blocked("SAFETY"))
            .reply("Third", text("never used")),
    );

    let err = engine(config, &invoker)
        .handle(&enhance("something"))
        .await
        .unwrap_err();

    assert_eq!(err, RelayError::Blocked("SAFETY".to_string()));
    assert_eq!(err.to_string(), "Request blocked: SAFETY");
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    assert_eq!(invoker.labels(), vec![GEMMA.to_string(), FLASH_LITE.to_string()]);
}

#[tokio::test]
async fn text_wins_over_a_block_reason() {
    init_logging();
    let invoker = Arc::new(ScriptedInvoker::default().reply(
        GEMMA,
        Ok(Extraction {
            text: Some("kept".to_string()),
            block_reason: Some("OTHER".to_string()),
        }),
    ));

    let result = engine(keyed_config(), &invoker).handle(&enhance("x y")).await;
    assert_eq!(result, Ok("kept".to_string()));
}

#[tokio::test]
async fn exhaustion_reports_the_last_error_as_429() {
    init_logging();
    let invoker = Arc::new(
        ScriptedInvoker::default()
            .reply(GEMMA, Err(ProviderError::RateLimited))
            .reply(FLASH_LITE, Err(ProviderError::RateLimited)),
    );

    let err = engine(keyed_config(), &invoker)
        .handle(&enhance("text"))
        .await
        .unwrap_err();

    assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(err.to_string(), "Gemini 2.5 Flash Lite rate limited");
}

#[tokio::test]
async fn missing_text_records_unexpected_format() {
    init_logging();
    let invoker = Arc::new(
        ScriptedInvoker::default()
            .reply(
                GEMMA,
                Err(ProviderError::Status {
                    status: 500,
                    message: "backend exploded".to_string(),
                }),
            )
            .reply(FLASH_LITE, text("   ")),
    );

    let err = engine(keyed_config(), &invoker)
        .handle(&enhance("text"))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        RelayError::Exhausted("Gemini 2.5 Flash Lite: Unexpected response format".to_string())
    );
    assert_eq!(invoker.calls().len(), 2);
}

#[tokio::test]
async fn empty_provider_list_fails_with_default_message() {
    init_logging();
    let mut config = keyed_config();
    config.enhance.clear();
    let invoker = Arc::new(ScriptedInvoker::default());

    let err = engine(config, &invoker)
        .handle(&enhance("text"))
        .await
        .unwrap_err();

    assert_eq!(err, RelayError::Exhausted(ALL_MODELS_FAILED.to_string()));
    assert!(invoker.calls().is_empty());
}

#[tokio::test]
async fn providers_without_keys_are_skipped() {
    init_logging();
    let invoker = Arc::new(ScriptedInvoker::default());

    let err = engine(RelayConfig::default(), &invoker)
        .handle(&enhance("text"))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        RelayError::Exhausted("Gemini 2.5 Flash Lite: no API key configured".to_string())
    );
    assert!(invoker.calls().is_empty());
}

#[tokio::test]
async fn caller_key_replaces_gemini_pools_only() {
    init_logging();
    let mut config = keyed_config();
    config.openai.api_keys = vec!["o1".to_string()];
    config.enhance = vec![
        ModelEntry::new(ProviderKind::Gemini, "gemma-3-27b-it", GEMMA),
        ModelEntry::new(ProviderKind::OpenAi, "gpt-4o-mini", "GPT-4o mini"),
    ];
    let invoker = Arc::new(
        ScriptedInvoker::default()
            .reply(GEMMA, Err(ProviderError::RateLimited))
            .reply("GPT-4o mini", text("done")),
    );
    let request = ValidatedRequest {
        api_key: Some("user-key".to_string()),
        ..enhance("text")
    };

    let result = engine(config, &invoker).handle(&request).await;

    assert_eq!(result, Ok("done".to_string()));
    let keys: Vec<String> = invoker.calls().into_iter().map(|c| c.api_key).collect();
    assert_eq!(keys, vec!["user-key".to_string(), "o1".to_string()]);
}

#[tokio::test]
async fn key_is_chosen_by_time_modulo_pool_size() {
    init_logging();
    let invoker = Arc::new(ScriptedInvoker::default().reply(GEMMA, text("ok")));
    let engine = FallbackEngine::new(Arc::new(keyed_config()), invoker.clone())
        .with_clock(Arc::new(|| 1_700_000_000_001));

    engine.handle(&enhance("text")).await.unwrap();

    assert_eq!(invoker.calls()[0].api_key, "k1");
}

#[test]
fn pick_key_cycles_through_the_pool() {
    let pool: Vec<String> = ["a", "b", "c"].iter().map(|k| k.to_string()).collect();
    assert_eq!(pick_key(&pool, 0), Some("a"));
    assert_eq!(pick_key(&pool, 7), Some("b"));
    assert_eq!(pick_key(&pool, 5), Some("c"));
    assert_eq!(pick_key(&[], 5), None);
}

#[tokio::test]
async fn summarize_walks_its_own_list_with_the_context() {
    init_logging();
    let invoker = Arc::new(ScriptedInvoker::default().reply(FLASH_LITE, text("- shipped")));
    let request = ValidatedRequest {
        text: "in bullets".to_string(),
        context: Some("Alice: shipped it\n\nBob: great".to_string()),
        mode: Mode::Summarize,
        api_key: None,
    };

    let result = engine(keyed_config(), &invoker).handle(&request).await;

    assert_eq!(result, Ok("- shipped".to_string()));
    let call = &invoker.calls()[0];
    assert_eq!(call.label, FLASH_LITE);
    assert!(call.prompt.contains("Alice: shipped it\n\nBob: great"));
    assert!(call.prompt.contains("in bullets"));
}
