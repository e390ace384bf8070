//! Self-hosted provider: a plain JSON POST to an operator-run inference server.
//!
//! The server does its own prompt assembly, so the body carries the raw
//! question, base prompt, and retrieved text as separate fields. Small models
//! are served from `{base}/chat_cpu`, large ones from `{base}/chat_gpu`; the
//! model's size tier picks the endpoint, the category fills in when the model
//! declares none. No image support.

use async_trait::async_trait;
use parley_core::{
    ChatProvider, ChatRequest, ModelRef, ModelSizeTier, ProviderCategory, ProviderError, Role,
    TransportRequest,
};
use serde::Serialize;
use tracing::debug;

use crate::settings::ProviderSettings;
use crate::window;

pub struct SelfHostedProvider {
    category: ProviderCategory,
    settings: ProviderSettings,
}

impl SelfHostedProvider {
    /// `category` must be one of the self-hosted categories.
    pub fn new(category: ProviderCategory, settings: ProviderSettings) -> Self {
        debug_assert!(category.is_self_hosted());
        Self { category, settings }
    }

    pub fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    fn endpoint(&self, model: &ModelRef) -> &'static str {
        let tier = model.size_tier.unwrap_or(match self.category {
            ProviderCategory::SelfHostedLarge => ModelSizeTier::Large,
            _ => ModelSizeTier::Small,
        });
        match tier {
            ModelSizeTier::Small => "chat_cpu",
            ModelSizeTier::Large => "chat_gpu",
        }
    }

    /// Build the POST for one call.
    pub fn build_request(&self, request: &ChatRequest<'_>) -> TransportRequest {
        let config = request.assistant;
        let counter = self.settings.counter.as_ref();
        let fixed_cost = counter.count(Role::User, request.message)
            + counter.count(Role::System, &config.base_prompt)
            + counter.count(Role::User, request.retrieved_text);
        let history = self
            .settings
            .history_window(&config.model, request.history, fixed_cost);

        if !request.images.is_empty() {
            debug!(
                provider = %self.name(),
                images = request.images.len(),
                "Self-hosted backend has no image support, ignoring attachments"
            );
        }

        let body = SelfHostedRequest {
            question: request.message,
            base_prompt: &config.base_prompt,
            chat_history: window::turn_pairs(history)
                .into_iter()
                .map(|(user, assistant)| HistoryEntry { user, assistant })
                .collect(),
            selected_model: &config.model.id,
            fetched_text: request.retrieved_text,
            temperature: config.temperature,
            top_p: config.top_p,
        };

        TransportRequest::new(
            format!("{}/{}", self.settings.base_url, self.endpoint(&config.model)),
            serde_json::json!(body),
        )
        .header("Authorization", format!("Bearer {}", self.settings.api_key))
    }

    /// Accepts `{"response": ...}`, `{"answer": ...}`, or a bare JSON string.
    fn parse_response(value: serde_json::Value) -> Result<String, ProviderError> {
        let text = match &value {
            serde_json::Value::String(s) => Some(s.as_str()),
            serde_json::Value::Object(map) => map
                .get("response")
                .or_else(|| map.get("answer"))
                .and_then(|v| v.as_str()),
            _ => {
                return Err(ProviderError::InvalidResponse(format!(
                    "Unexpected response body: {value}"
                )));
            }
        };

        match text {
            Some(t) if !t.trim().is_empty() => Ok(t.to_string()),
            _ => Err(ProviderError::EmptyCompletion(
                "Response has no answer text".into(),
            )),
        }
    }
}

#[async_trait]
impl ChatProvider for SelfHostedProvider {
    fn name(&self) -> &str {
        self.category.as_str()
    }

    fn category(&self) -> ProviderCategory {
        self.category
    }

    async fn get_chat_completion(
        &self,
        request: ChatRequest<'_>,
    ) -> std::result::Result<Option<String>, ProviderError> {
        if self.settings.api_key.trim().is_empty() {
            debug!(provider = %self.name(), "No credential configured, skipping request");
            return Ok(None);
        }

        let transport_request = self.build_request(&request);
        debug!(
            provider = %self.name(),
            url = %transport_request.url,
            history = request.history.len(),
            "Sending self-hosted request"
        );
        let reply = self
            .settings
            .execute(self.name(), transport_request, Self::parse_response)
            .await?;
        Ok(Some(reply))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SelfHostedRequest<'a> {
    question: &'a str,
    base_prompt: &'a str,
    chat_history: Vec<HistoryEntry<'a>>,
    selected_model: &'a str,
    fetched_text: &'a str,
    temperature: f32,
    top_p: f32,
}

#[derive(Debug, Serialize)]
struct HistoryEntry<'a> {
    user: &'a str,
    assistant: &'a str,
}
