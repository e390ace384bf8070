//! Construction-time settings shared by every provider implementation.

use parley_config::AppConfig;
use parley_core::{
    ChatTransport, ConversationTurn, ModelRef, ProviderCategory, ProviderError, RetryPolicy,
    TransportRequest,
};
use std::sync::Arc;

use crate::retry::RetryExecutor;
use crate::token::{HeuristicCounter, TokenCounter};
use crate::window;

/// Credentials, endpoint, policies, and the injected transport of one provider.
///
/// Immutable once the provider is built; every per-call value travels in the
/// `ChatRequest` instead.
#[derive(Clone)]
pub struct ProviderSettings {
    pub api_key: String,
    pub base_url: String,
    pub retry: RetryPolicy,
    pub reserved_output_tokens: u32,
    /// Context window for models that declare none
    pub default_context_window: u32,
    pub transport: Arc<dyn ChatTransport>,
    pub counter: Arc<dyn TokenCounter>,
}

impl ProviderSettings {
    /// Settings with the category's built-in defaults.
    pub fn new(
        category: ProviderCategory,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        transport: Arc<dyn ChatTransport>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry: category.default_retry_policy(),
            reserved_output_tokens: AppConfig::default().reserved_output_tokens,
            default_context_window: category.default_context_window(),
            transport,
            counter: Arc::new(HeuristicCounter),
        }
    }

    /// Settings with retry, budget, and window values taken from `config`.
    pub fn from_config(
        category: ProviderCategory,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        config: &AppConfig,
        transport: Arc<dyn ChatTransport>,
    ) -> Self {
        Self {
            retry: config.retry_policy(category),
            reserved_output_tokens: config.reserved_output_tokens,
            default_context_window: config.default_context_window(category),
            ..Self::new(category, api_key, base_url, transport)
        }
    }

    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn with_counter(mut self, counter: Arc<dyn TokenCounter>) -> Self {
        self.counter = counter;
        self
    }

    pub fn with_reserved_output_tokens(mut self, tokens: u32) -> Self {
        self.reserved_output_tokens = tokens;
        self
    }

    /// The newest turns that fit beside the fixed part of the request.
    pub(crate) fn history_window<'a>(
        &self,
        model: &ModelRef,
        history: &'a [ConversationTurn],
        fixed_cost: usize,
    ) -> &'a [ConversationTurn] {
        let context_window = model
            .context_window_tokens
            .unwrap_or(self.default_context_window);
        let budget = window::history_budget(context_window, self.reserved_output_tokens, fixed_cost);
        window::select(history, self.counter.as_ref(), budget)
    }

    /// POST `request` under the retry policy, parsing each response with `parse`.
    ///
    /// Parsing happens inside the retried operation so an empty completion is
    /// retried like any other backend failure.
    pub(crate) async fn execute(
        &self,
        label: &str,
        request: TransportRequest,
        parse: fn(serde_json::Value) -> Result<String, ProviderError>,
    ) -> Result<String, ProviderError> {
        let transport = &self.transport;
        RetryExecutor::new(label, self.retry)
            .run(|| {
                let request = request.clone();
                async move { parse(transport.post_json(request).await?) }
            })
            .await
    }
}

impl std::fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("api_key", &if self.api_key.is_empty() { "None" } else { "[REDACTED]" })
            .field("base_url", &self.base_url)
            .field("retry", &self.retry)
            .field("reserved_output_tokens", &self.reserved_output_tokens)
            .field("default_context_window", &self.default_context_window)
            .finish()
    }
}
