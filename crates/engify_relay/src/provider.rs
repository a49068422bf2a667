//! Provider descriptors, request shapes and response extraction.
//!
//! The provider set is closed: each [`ProviderKind`] knows how to build its
//! native request and how to reduce its native response to an [`Extraction`].

use std::time::Duration;

use engify_logging::engify_debug;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    #[serde(rename = "gemini")]
    Gemini,
    #[serde(rename = "openai")]
    OpenAi,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderDescriptor {
    pub kind: ProviderKind,
    pub model_id: String,
    pub label: String,
    pub api_key_pool: Vec<String>,
}

/// A provider response reduced to the two things the fallback loop cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub text: Option<String>,
    pub block_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("rate limited")]
    RateLimited,
    #[error("{message} (HTTP {status})")]
    Status { status: u16, message: String },
    #[error("request failed: {0}")]
    Transport(String),
    #[error("unreadable response: {0}")]
    Malformed(String),
}

/// Sends one prompt to one provider.
#[async_trait::async_trait]
pub trait ProviderInvoker: Send + Sync {
    async fn invoke(
        &self,
        provider: &ProviderDescriptor,
        api_key: &str,
        prompt: &str,
    ) -> Result<Extraction, ProviderError>;
}

// Gemini generateContent

#[derive(Debug, Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<GeminiPromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiResponseContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

// OpenAI-compatible chat completions

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChatResponseMessage>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// `{"error": {"message": ...}}`, shared by both providers.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

const CONTENT_FILTER: &str = "content_filter";

impl ProviderKind {
    pub fn request_url(self, base_url: &str, model_id: &str, api_key: &str) -> String {
        let base = base_url.trim_end_matches('/');
        match self {
            ProviderKind::Gemini => {
                format!("{base}/models/{model_id}:generateContent?key={api_key}")
            }
            ProviderKind::OpenAi => format!("{base}/chat/completions"),
        }
    }

    pub fn request_body(self, model_id: &str, prompt: &str) -> Result<Vec<u8>, ProviderError> {
        let encoded = match self {
            ProviderKind::Gemini => serde_json::to_vec(&GeminiRequest {
                contents: vec![GeminiContent {
                    parts: vec![GeminiPart { text: prompt }],
                }],
            }),
            ProviderKind::OpenAi => serde_json::to_vec(&ChatRequest {
                model: model_id,
                messages: vec![ChatMessage {
                    role: "user",
                    content: prompt,
                }],
            }),
        };
        encoded.map_err(|err| ProviderError::Malformed(err.to_string()))
    }

    /// Reduces a successful native response body.
    pub fn extract(self, body: &[u8]) -> Result<Extraction, ProviderError> {
        match self {
            ProviderKind::Gemini => {
                let response: GeminiResponse = serde_json::from_slice(body)
                    .map_err(|err| ProviderError::Malformed(err.to_string()))?;
                let text = response
                    .candidates
                    .into_iter()
                    .next()
                    .and_then(|candidate| candidate.content)
                    .and_then(|content| content.parts.into_iter().next())
                    .and_then(|part| part.text)
                    .filter(|text| !text.is_empty());
                let block_reason = response
                    .prompt_feedback
                    .and_then(|feedback| feedback.block_reason);
                Ok(Extraction { text, block_reason })
            }
            ProviderKind::OpenAi => {
                let response: ChatResponse = serde_json::from_slice(body)
                    .map_err(|err| ProviderError::Malformed(err.to_string()))?;
                let Some(choice) = response.choices.into_iter().next() else {
                    return Ok(Extraction::default());
                };
                let block_reason = choice
                    .finish_reason
                    .filter(|reason| reason == CONTENT_FILTER);
                let text = choice
                    .message
                    .and_then(|message| message.content)
                    .filter(|text| !text.is_empty());
                Ok(Extraction { text, block_reason })
            }
        }
    }

    /// Maps a non-success status and body to a provider error.
    pub fn error_for(self, status: u16, body: &[u8]) -> ProviderError {
        if status == 429 {
            return ProviderError::RateLimited;
        }
        let message = serde_json::from_slice::<ErrorEnvelope>(body)
            .map(|envelope| envelope.error.message)
            .unwrap_or_else(|_| format!("HTTP error! status: {status}"));
        ProviderError::Status { status, message }
    }
}

/// Invokes providers over HTTP with one shared client.
#[derive(Debug, Clone)]
pub struct HttpInvoker {
    client: reqwest::Client,
    gemini_base_url: String,
    openai_base_url: String,
}

impl HttpInvoker {
    pub fn new(
        gemini_base_url: impl Into<String>,
        openai_base_url: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            client,
            gemini_base_url: gemini_base_url.into(),
            openai_base_url: openai_base_url.into(),
        })
    }

    fn base_url(&self, kind: ProviderKind) -> &str {
        match kind {
            ProviderKind::Gemini => &self.gemini_base_url,
            ProviderKind::OpenAi => &self.openai_base_url,
        }
    }
}

#[async_trait::async_trait]
impl ProviderInvoker for HttpInvoker {
    async fn invoke(
        &self,
        provider: &ProviderDescriptor,
        api_key: &str,
        prompt: &str,
    ) -> Result<Extraction, ProviderError> {
        let kind = provider.kind;
        let url = kind.request_url(self.base_url(kind), &provider.model_id, api_key);
        let body = kind.request_body(&provider.model_id, prompt)?;
        engify_debug!(
            "Invoking {} ({:?}) with prompt of {} chars",
            provider.label,
            kind,
            prompt.chars().count()
        );

        let mut request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        if kind == ProviderKind::OpenAi {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|err| ProviderError::Transport(err.without_url().to_string()))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| ProviderError::Transport(err.without_url().to_string()))?;

        if !status.is_success() {
            return Err(kind.error_for(status.as_u16(), &bytes));
        }
        kind.extract(&bytes)
    }
}
