//! Test doubles shared by the provider unit tests.

use async_trait::async_trait;
use parley_core::{AssistantConfig, ChatTransport, ModelRef, ProviderError, TransportRequest};
use std::collections::VecDeque;
use std::sync::Mutex;

/// A transport that replays scripted results and records every request.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<serde_json::Value, ProviderError>>>,
    requests: Mutex<Vec<TransportRequest>>,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<Result<serde_json::Value, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn post_json(
        &self,
        request: TransportRequest,
    ) -> std::result::Result<serde_json::Value, ProviderError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::Network("script exhausted".into())))
    }
}

pub fn assistant(model: ModelRef) -> AssistantConfig {
    AssistantConfig::new("Ada", "research assistant", model).with_base_prompt("Be concise.")
}
