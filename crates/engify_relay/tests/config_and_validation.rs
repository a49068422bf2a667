use std::collections::HashMap;
use std::fs;

use engify_core::Mode;
use engify_relay::{
    build_prompt, check_origin, parse_payload, ConfigError, ModelEntry, ProviderKind, RelayConfig,
    RelayError, ENHANCE_INSTRUCTION, GEMINI_KEYS_ENV, OPENAI_KEYS_ENV,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;

fn payload(value: serde_json::Value) -> Result<engify_relay::ValidatedRequest, RelayError> {
    parse_payload(value.to_string().as_bytes(), &RelayConfig::default())
}

#[test]
fn defaults_match_the_documented_lists() {
    let config = RelayConfig::default();
    let enhance: Vec<String> = config
        .providers_for(Mode::Enhance)
        .into_iter()
        .map(|p| p.label)
        .collect();
    let summarize: Vec<String> = config
        .providers_for(Mode::Summarize)
        .into_iter()
        .map(|p| p.model_id)
        .collect();

    assert_eq!(enhance, vec!["Gemma 3 27B", "Gemini 2.5 Flash Lite"]);
    assert_eq!(summarize, vec!["gemini-2.5-flash-lite", "gemma-3-27b-it"]);
    assert_eq!(config.listen_addr().unwrap().to_string(), "127.0.0.1:8787");
}

#[test]
fn ron_file_overrides_selected_fields() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("relay.ron");
    fs::write(
        &path,
        r#"(
            port: 9000,
            openai: (base_url: "http://localhost:1234/v1", api_keys: ["o1"]),
            enhance: [(provider: openai, model: "local-model", label: "Local")],
        )"#,
    )
    .unwrap();

    let config = RelayConfig::load(Some(&path)).unwrap();

    assert_eq!(config.port, 9000);
    assert_eq!(config.host, "127.0.0.1");
    assert_eq!(
        config.enhance,
        vec![ModelEntry::new(ProviderKind::OpenAi, "local-model", "Local")]
    );
    let providers = config.providers_for(Mode::Enhance);
    assert_eq!(providers[0].api_key_pool, vec!["o1".to_string()]);
    assert_eq!(config.summarize, RelayConfig::default().summarize);
}

#[test]
fn broken_config_reports_the_path() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("relay.ron");
    fs::write(&path, "(port: \"nope\")").unwrap();

    let err = RelayConfig::load(Some(&path)).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert!(err.to_string().contains("relay.ron"));

    let missing = RelayConfig::load(Some(&temp.path().join("absent.ron"))).unwrap_err();
    assert!(matches!(missing, ConfigError::Read { .. }));
}

#[test]
fn env_keys_are_split_and_appended() {
    let mut config = RelayConfig::default();
    config.gemini.api_keys = vec!["from-file".to_string()];
    let env: HashMap<&str, &str> = [(GEMINI_KEYS_ENV, " a, b ,,c "), (OPENAI_KEYS_ENV, "")]
        .into_iter()
        .collect();

    config.apply_env_keys(|name| env.get(name).map(|value| value.to_string()));

    assert_eq!(config.gemini.api_keys, vec!["from-file", "a", "b", "c"]);
    assert!(config.openai.api_keys.is_empty());
}

#[test]
fn origin_must_match_an_allowed_prefix() {
    let allowed = vec!["chrome-extension://".to_string()];
    assert!(check_origin(Some("chrome-extension://abc"), &allowed).is_ok());
    assert_eq!(
        check_origin(Some("https://example.com"), &allowed),
        Err(RelayError::Forbidden)
    );
    assert_eq!(check_origin(Some(""), &allowed), Err(RelayError::Forbidden));
    assert_eq!(check_origin(None, &allowed), Err(RelayError::Forbidden));
}

#[test]
fn payload_bounds_are_counted_in_characters() {
    let at_limit = "é".repeat(5000);
    assert!(payload(json!({ "text": at_limit })).is_ok());
    assert!(payload(json!({"text": "ok"})).is_ok());
}

#[test]
fn payload_fields_are_normalised() {
    let request = payload(json!({
        "text": "hello",
        "context": "   ",
        "mode": "ENHANCE",
        "apiKey": "  user-key "
    }))
    .unwrap();

    assert_eq!(request.mode, Mode::Enhance);
    assert_eq!(request.context, None);
    assert_eq!(request.api_key.as_deref(), Some("user-key"));
}

#[test]
fn summarize_needs_context_but_not_text() {
    let request = payload(json!({
        "mode": "summarize",
        "context": "Alice: hi\n\nBob: hey"
    }))
    .unwrap();
    assert_eq!(request.text, "");
    assert_eq!(request.mode, Mode::Summarize);

    let too_long = payload(json!({
        "text": "x y",
        "context": "c".repeat(20_001)
    }))
    .unwrap_err();
    assert_eq!(
        too_long.to_string(),
        "Context too long. Maximum 20000 characters."
    );
}

#[test]
fn non_object_bodies_are_rejected() {
    let config = RelayConfig::default();
    for body in [&b"not json"[..], &b"[1,2]"[..], &b"\"text\""[..]] {
        assert_eq!(
            parse_payload(body, &config),
            Err(RelayError::validation("Invalid JSON body"))
        );
    }
}

#[test]
fn enhance_prompt_wraps_the_text() {
    assert_eq!(
        build_prompt(Mode::Enhance, "helo", None),
        format!("{ENHANCE_INSTRUCTION}\n\n---TEXT TO PROCESS---\nhelo\n---END---")
    );

    let with_context = build_prompt(Mode::Enhance, "helo", Some("earlier message"));
    assert!(with_context.contains("earlier message"));
    assert!(with_context.ends_with("---TEXT TO PROCESS---\nhelo\n---END---"));
}

#[test]
fn summarize_prompt_skips_blank_instructions() {
    let prompt = build_prompt(Mode::Summarize, "  ", Some("thread"));
    assert!(prompt.contains("---CONVERSATION---\nthread\n---END---"));
    assert!(!prompt.contains("ADDITIONAL INSTRUCTIONS"));
}
