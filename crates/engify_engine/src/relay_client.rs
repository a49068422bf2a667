use std::sync::Arc;
use std::time::Duration;

use engify_core::{RelayCall, RelayErrorBody, RelayRequestBody};
use engify_logging::{engify_debug, engify_info, engify_warn};
use reqwest::header::{CONTENT_TYPE, ORIGIN};
use serde::Deserialize;

use crate::{CallError, FailureKind};

pub const UNEXPECTED_RESPONSE_FORMAT: &str = "Unexpected response format";

#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub endpoint: String,
    /// Sent as the `Origin` header; the relay only serves allow-listed origins.
    pub origin: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_retry_delay: Duration,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8787/".to_string(),
            origin: "chrome-extension://engify".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_retries: 2,
            initial_retry_delay: Duration::from_millis(1000),
        }
    }
}

/// Receives intermediate status text while a call is retrying.
pub trait StatusSink: Send + Sync {
    fn status(&self, status: &str);
}

/// Supplies the user's own provider key, read fresh for every call.
pub trait CredentialSource: Send + Sync {
    fn api_key(&self) -> Option<String>;
}

/// One attempt against the relay.
#[async_trait::async_trait]
pub trait RelayTransport: Send + Sync {
    async fn send(&self, body: &RelayRequestBody) -> Result<String, CallError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    settings: RelaySettings,
}

impl ReqwestTransport {
    pub fn new(settings: RelaySettings) -> Self {
        Self { settings }
    }

    fn build_client(&self) -> Result<reqwest::Client, CallError> {
        reqwest::Client::builder()
            .connect_timeout(self.settings.connect_timeout)
            .timeout(self.settings.request_timeout)
            .build()
            .map_err(|err| CallError::new(FailureKind::Network, err.to_string()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SuccessShape {
    #[serde(default)]
    success: bool,
    enhanced_text: Option<String>,
}

#[async_trait::async_trait]
impl RelayTransport for ReqwestTransport {
    async fn send(&self, body: &RelayRequestBody) -> Result<String, CallError> {
        let url = reqwest::Url::parse(&self.settings.endpoint)
            .map_err(|err| CallError::new(FailureKind::InvalidEndpoint, err.to_string()))?;
        let payload = serde_json::to_string(body)
            .map_err(|err| CallError::new(FailureKind::MalformedResponse, err.to_string()))?;
        let client = self.build_client()?;

        let response = client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .header(ORIGIN, self.settings.origin.as_str())
            .body(payload)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(map_reqwest_error)?;

        if !status.is_success() {
            let message = serde_json::from_slice::<RelayErrorBody>(&bytes)
                .map(|body| body.error)
                .unwrap_or_else(|_| format!("HTTP error {}", status.as_u16()));
            return Err(CallError::from_status(status.as_u16(), message));
        }

        match serde_json::from_slice::<SuccessShape>(&bytes) {
            Ok(SuccessShape {
                success: true,
                enhanced_text: Some(text),
            }) => Ok(text),
            _ => Err(CallError::new(
                FailureKind::MalformedResponse,
                UNEXPECTED_RESPONSE_FORMAT,
            )),
        }
    }
}

fn map_reqwest_error(err: reqwest::Error) -> CallError {
    if err.is_timeout() {
        return CallError::new(FailureKind::Timeout, err.to_string());
    }
    CallError::new(FailureKind::Network, err.to_string())
}

/// Calls the relay with bounded retries and exponential backoff.
#[derive(Clone)]
pub struct RelayClient {
    settings: RelaySettings,
    transport: Arc<dyn RelayTransport>,
    credentials: Option<Arc<dyn CredentialSource>>,
}

impl RelayClient {
    pub fn new(settings: RelaySettings) -> Self {
        let transport = Arc::new(ReqwestTransport::new(settings.clone()));
        Self {
            settings,
            transport,
            credentials: None,
        }
    }

    pub fn with_transport(mut self, transport: Arc<dyn RelayTransport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialSource>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }

    pub async fn call(&self, call: &RelayCall, sink: &dyn StatusSink) -> Result<String, CallError> {
        let body = RelayRequestBody {
            text: call.text.clone(),
            context: call.context.clone(),
            mode: Some(call.mode.to_string()),
            api_key: self
                .credentials
                .as_ref()
                .and_then(|source| source.api_key()),
        };

        let max_retries = self.settings.max_retries;
        let mut delay = self.settings.initial_retry_delay;
        let mut attempt = 0;
        loop {
            match self.transport.send(&body).await {
                Ok(text) => {
                    engify_info!(
                        "Request {} succeeded after {} attempt(s)",
                        call.request_id,
                        attempt + 1
                    );
                    return Ok(text);
                }
                Err(err) if !err.is_retryable() => {
                    engify_warn!(
                        "Request {} failed ({}); not retrying",
                        call.request_id,
                        err.kind
                    );
                    return Err(err);
                }
                Err(err) if attempt >= max_retries => {
                    engify_warn!(
                        "Request {} failed ({}) after {} attempts",
                        call.request_id,
                        err.kind,
                        attempt + 1
                    );
                    return Err(err);
                }
                Err(err) => {
                    attempt += 1;
                    engify_debug!(
                        "Request {} attempt {} failed ({}); retrying in {:?}",
                        call.request_id,
                        attempt,
                        err.kind,
                        delay
                    );
                    sink.status(&format!("Retrying ({attempt}/{max_retries})..."));
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                }
            }
        }
    }
}
