#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, Once};

use engify_core::Mode;
use engify_relay::{Extraction, ProviderDescriptor, ProviderError, ProviderInvoker, ValidatedRequest};

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engify_logging::initialize_for_tests);
}

pub fn text(value: &str) -> Result<Extraction, ProviderError> {
    Ok(Extraction {
        text: Some(value.to_string()),
        block_reason: None,
    })
}

pub fn blocked(reason: &str) -> Result<Extraction, ProviderError> {
    Ok(Extraction {
        text: None,
        block_reason: Some(reason.to_string()),
    })
}

pub fn enhance(text: &str) -> ValidatedRequest {
    ValidatedRequest {
        text: text.to_string(),
        context: None,
        mode: Mode::Enhance,
        api_key: None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub label: String,
    pub api_key: String,
    pub prompt: String,
}

/// Answers each provider label from a queue; unscripted calls fail as transport errors.
#[derive(Default)]
pub struct ScriptedInvoker {
    replies: Mutex<HashMap<String, VecDeque<Result<Extraction, ProviderError>>>>,
    calls: Mutex<Vec<Invocation>>,
}

impl ScriptedInvoker {
    pub fn reply(self, label: &str, reply: Result<Extraction, ProviderError>) -> Self {
        self.replies
            .lock()
            .unwrap()
            .entry(label.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    pub fn labels(&self) -> Vec<String> {
        self.calls().into_iter().map(|call| call.label).collect()
    }
}

#[async_trait::async_trait]
impl ProviderInvoker for ScriptedInvoker {
    async fn invoke(
        &self,
        provider: &ProviderDescriptor,
        api_key: &str,
        prompt: &str,
    ) -> Result<Extraction, ProviderError> {
        self.calls.lock().unwrap().push(Invocation {
            label: provider.label.clone(),
            api_key: api_key.to_string(),
            prompt: prompt.to_string(),
        });
        self.replies
            .lock()
            .unwrap()
            .get_mut(&provider.label)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Err(ProviderError::Transport("unscripted".to_string())))
    }
}

/// Panics on every call.
pub struct PanickingInvoker;

#[async_trait::async_trait]
impl ProviderInvoker for PanickingInvoker {
    async fn invoke(
        &self,
        _provider: &ProviderDescriptor,
        _api_key: &str,
        _prompt: &str,
    ) -> Result<Extraction, ProviderError> {
        panic!("provider exploded");
    }
}
