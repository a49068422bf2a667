//! Ordered provider walk for one validated request.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use engify_logging::{engify_debug, engify_info, engify_warn};

use crate::config::RelayConfig;
use crate::error::{RelayError, ALL_MODELS_FAILED};
use crate::prompt::build_prompt;
use crate::provider::{ProviderDescriptor, ProviderError, ProviderInvoker, ProviderKind};
use crate::validate::ValidatedRequest;

/// Milliseconds since the Unix epoch; only used to spread load over keys.
pub type Clock = Arc<dyn Fn() -> u128 + Send + Sync>;

fn system_clock() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default()
}

/// Picks one key from `pool` by time modulo pool size.
pub fn pick_key(pool: &[String], now_millis: u128) -> Option<&str> {
    if pool.is_empty() {
        return None;
    }
    let index = (now_millis % pool.len() as u128) as usize;
    pool.get(index).map(String::as_str)
}

#[derive(Clone)]
pub struct FallbackEngine {
    config: Arc<RelayConfig>,
    invoker: Arc<dyn ProviderInvoker>,
    clock: Clock,
}

impl FallbackEngine {
    pub fn new(config: Arc<RelayConfig>, invoker: Arc<dyn ProviderInvoker>) -> Self {
        Self {
            config,
            invoker,
            clock: Arc::new(system_clock),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    fn key_pool<'a>(
        provider: &'a ProviderDescriptor,
        request: &'a ValidatedRequest,
    ) -> &'a [String] {
        match (&request.api_key, provider.kind) {
            (Some(key), ProviderKind::Gemini) => std::slice::from_ref(key),
            _ => &provider.api_key_pool,
        }
    }

    /// Tries each provider for the request's mode in order.
    ///
    /// The first non-empty text wins. A content block ends the walk at once.
    /// Every other failure is recorded and the next provider is tried.
    pub async fn handle(&self, request: &ValidatedRequest) -> Result<String, RelayError> {
        let now = (self.clock)();
        let prompt = build_prompt(request.mode, &request.text, request.context.as_deref());
        let providers = self.config.providers_for(request.mode);
        let mut last_error: Option<String> = None;

        for provider in &providers {
            let Some(key) = pick_key(Self::key_pool(provider, request), now) else {
                engify_warn!("Skipping {}: no API key configured", provider.label);
                last_error = Some(format!("{}: no API key configured", provider.label));
                continue;
            };

            match self.invoker.invoke(provider, key, &prompt).await {
                Ok(extraction) => {
                    if let Some(text) = extraction
                        .text
                        .as_deref()
                        .map(str::trim)
                        .filter(|text| !text.is_empty())
                    {
                        engify_info!(
                            "{} answered {} request ({} chars)",
                            provider.label,
                            request.mode,
                            text.chars().count()
                        );
                        return Ok(text.to_string());
                    }
                    if let Some(reason) = extraction.block_reason {
                        engify_warn!("{} blocked the request: {}", provider.label, reason);
                        return Err(RelayError::Blocked(reason));
                    }
                    engify_warn!("{} returned no text", provider.label);
                    last_error = Some(format!("{}: Unexpected response format", provider.label));
                }
                Err(ProviderError::RateLimited) => {
                    engify_debug!("{} rate limited; trying next provider", provider.label);
                    last_error = Some(format!("{} rate limited", provider.label));
                }
                Err(err) => {
                    engify_warn!("{} failed: {}", provider.label, err);
                    last_error = Some(format!("{}: {}", provider.label, err));
                }
            }
        }

        let message = last_error.unwrap_or_else(|| ALL_MODELS_FAILED.to_string());
        engify_warn!("All providers failed for {} request: {}", request.mode, message);
        Err(RelayError::Exhausted(message))
    }
}
