//! Caller and payload checks that run before any provider is contacted.

use engify_core::Mode;
use serde_json::Value;

use crate::config::RelayConfig;
use crate::error::RelayError;

pub const MSG_INVALID_TEXT: &str = "Missing or invalid text";
pub const MSG_MISSING_CONTEXT: &str = "Missing context";
pub const MSG_INVALID_BODY: &str = "Invalid JSON body";

/// A request that passed every check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    pub text: String,
    pub context: Option<String>,
    pub mode: Mode,
    pub api_key: Option<String>,
}

/// Accepts the caller only when its `Origin` starts with an allowed prefix.
pub fn check_origin(origin: Option<&str>, allowed_prefixes: &[String]) -> Result<(), RelayError> {
    match origin {
        Some(origin)
            if !origin.is_empty()
                && allowed_prefixes
                    .iter()
                    .any(|prefix| origin.starts_with(prefix.as_str())) =>
        {
            Ok(())
        }
        _ => Err(RelayError::Forbidden),
    }
}

fn optional_string(
    object: &serde_json::Map<String, Value>,
    key: &str,
) -> Result<Option<String>, ()> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(_) => Err(()),
    }
}

/// Parses and bounds-checks a `POST /` body.
///
/// Lengths are counted in characters. Context-only modes need a non-blank
/// `context`; `text` is then optional and carries extra instructions.
pub fn parse_payload(body: &[u8], config: &RelayConfig) -> Result<ValidatedRequest, RelayError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|_| RelayError::validation(MSG_INVALID_BODY))?;
    let Value::Object(object) = value else {
        return Err(RelayError::validation(MSG_INVALID_BODY));
    };

    let mode = match optional_string(&object, "mode") {
        Ok(None) => Mode::Enhance,
        Ok(Some(raw)) => Mode::parse(&raw)
            .ok_or_else(|| RelayError::validation(format!("Unknown mode: {raw}")))?,
        Err(()) => return Err(RelayError::validation("Invalid mode")),
    };

    let text =
        optional_string(&object, "text").map_err(|_| RelayError::validation(MSG_INVALID_TEXT))?;
    let context = optional_string(&object, "context")
        .map_err(|_| RelayError::validation("Invalid context"))?
        .filter(|context| !context.trim().is_empty());
    let api_key = optional_string(&object, "apiKey")
        .map_err(|_| RelayError::validation("Invalid apiKey"))?
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty());

    let text = if mode.is_context_only() {
        if context.is_none() {
            return Err(RelayError::validation(MSG_MISSING_CONTEXT));
        }
        text.unwrap_or_default()
    } else {
        match text {
            Some(text) if text.trim().chars().count() >= config.min_text_chars => text,
            _ => return Err(RelayError::validation(MSG_INVALID_TEXT)),
        }
    };

    if text.chars().count() > config.max_text_chars {
        return Err(RelayError::validation(format!(
            "Text too long. Maximum {} characters.",
            config.max_text_chars
        )));
    }
    if let Some(context) = &context {
        if context.chars().count() > config.max_context_chars {
            return Err(RelayError::validation(format!(
                "Context too long. Maximum {} characters.",
                config.max_context_chars
            )));
        }
    }

    Ok(ValidatedRequest {
        text,
        context,
        mode,
        api_key,
    })
}
