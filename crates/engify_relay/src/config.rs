use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use engify_core::Mode;
use engify_logging::{engify_info, engify_warn};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::provider::{ProviderDescriptor, ProviderKind};

pub const GEMINI_KEYS_ENV: &str = "ENGIFY_GEMINI_KEYS";
pub const OPENAI_KEYS_ENV: &str = "ENGIFY_OPENAI_KEYS";
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Where a provider lives and which keys it may use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEndpoint {
    pub base_url: String,
    #[serde(default)]
    pub api_keys: Vec<String>,
}

/// One entry of a per-mode provider list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub provider: ProviderKind,
    pub model: String,
    pub label: String,
}

impl ModelEntry {
    pub fn new(provider: ProviderKind, model: &str, label: &str) -> Self {
        Self {
            provider,
            model: model.to_string(),
            label: label.to_string(),
        }
    }
}

/// Relay configuration. Read-only once the server starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origin_prefixes: Vec<String>,
    pub min_text_chars: usize,
    pub max_text_chars: usize,
    pub max_context_chars: usize,
    pub gemini: ProviderEndpoint,
    pub openai: ProviderEndpoint,
    pub enhance: Vec<ModelEntry>,
    pub summarize: Vec<ModelEntry>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        let gemma = ModelEntry::new(ProviderKind::Gemini, "gemma-3-27b-it", "Gemma 3 27B");
        let flash_lite = ModelEntry::new(
            ProviderKind::Gemini,
            "gemini-2.5-flash-lite",
            "Gemini 2.5 Flash Lite",
        );
        Self {
            host: "127.0.0.1".to_string(),
            port: 8787,
            allowed_origin_prefixes: vec!["chrome-extension://".to_string()],
            min_text_chars: 2,
            max_text_chars: 5000,
            max_context_chars: 20_000,
            gemini: ProviderEndpoint {
                base_url: GEMINI_BASE_URL.to_string(),
                api_keys: Vec::new(),
            },
            openai: ProviderEndpoint {
                base_url: OPENAI_BASE_URL.to_string(),
                api_keys: Vec::new(),
            },
            enhance: vec![gemma.clone(), flash_lite.clone()],
            summarize: vec![flash_lite, gemma],
        }
    }
}

impl RelayConfig {
    /// Loads `path` when given, otherwise the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = ron::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        engify_info!("Loaded relay config from {:?}", path);
        Ok(config)
    }

    /// Appends comma-separated keys from the environment to the configured pools.
    pub fn apply_env_keys<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for (var, endpoint) in [
            (GEMINI_KEYS_ENV, &mut self.gemini),
            (OPENAI_KEYS_ENV, &mut self.openai),
        ] {
            if let Some(raw) = lookup(var) {
                let before = endpoint.api_keys.len();
                endpoint.api_keys.extend(
                    raw.split(',')
                        .map(str::trim)
                        .filter(|key| !key.is_empty())
                        .map(str::to_string),
                );
                engify_info!(
                    "Added {} key(s) from {}",
                    endpoint.api_keys.len() - before,
                    var
                );
            }
        }
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse().map_err(|_| ConfigError::Address(addr))
    }

    pub fn endpoint(&self, kind: ProviderKind) -> &ProviderEndpoint {
        match kind {
            ProviderKind::Gemini => &self.gemini,
            ProviderKind::OpenAi => &self.openai,
        }
    }

    /// Ordered providers for `mode`, each with its key pool.
    pub fn providers_for(&self, mode: Mode) -> Vec<ProviderDescriptor> {
        let entries = match mode {
            Mode::Enhance => &self.enhance,
            Mode::Summarize => &self.summarize,
        };
        entries
            .iter()
            .map(|entry| ProviderDescriptor {
                kind: entry.provider,
                model_id: entry.model.clone(),
                label: entry.label.clone(),
                api_key_pool: self.endpoint(entry.provider).api_keys.clone(),
            })
            .collect()
    }

    /// Warns about lists that can never succeed.
    pub fn log_warnings(&self) {
        for mode in Mode::ALL {
            let providers = self.providers_for(mode);
            if providers.is_empty() {
                engify_warn!("No providers configured for mode {}", mode);
            }
            for provider in providers.iter().filter(|p| p.api_key_pool.is_empty()) {
                engify_warn!(
                    "{} ({}) has no configured keys; only caller keys can reach it",
                    provider.label,
                    mode
                );
            }
        }
    }
}
