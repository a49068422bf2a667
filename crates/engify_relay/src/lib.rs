//! Engify relay: validates extension requests and walks an ordered list of
//! language-model providers until one answers.
mod config;
mod error;
mod fallback;
mod prompt;
mod provider;
mod server;
mod validate;

pub use config::{
    ModelEntry, ProviderEndpoint, RelayConfig, GEMINI_BASE_URL, GEMINI_KEYS_ENV,
    OPENAI_BASE_URL, OPENAI_KEYS_ENV,
};
pub use error::{ConfigError, RelayError, ALL_MODELS_FAILED, INTERNAL_SERVER_ERROR};
pub use fallback::{pick_key, Clock, FallbackEngine};
pub use prompt::{build_prompt, instruction_for, ENHANCE_INSTRUCTION, SUMMARIZE_INSTRUCTION};
pub use provider::{
    Extraction, HttpInvoker, ProviderDescriptor, ProviderError, ProviderInvoker, ProviderKind,
};
pub use server::{router, run, RelayState};
pub use validate::{
    check_origin, parse_payload, ValidatedRequest, MSG_INVALID_BODY, MSG_INVALID_TEXT,
    MSG_MISSING_CONTEXT,
};
