//! Anthropic native provider implementation.
//!
//! Uses Anthropic's Messages API directly (not an OpenAI-compatible proxy).
//!
//! Features:
//! - `x-api-key` header authentication (not Bearer)
//! - `anthropic-version` header
//! - System prompt as top-level field
//! - Images as base64 `image` blocks ahead of the text block in the final user entry

use async_trait::async_trait;
use parley_core::{
    ChatProvider, ChatRequest, ChatTransport, ConversationTurn, ImageAttachment, ProviderCategory,
    ProviderError, Role, TransportRequest,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::images;
use crate::prompt;
use crate::settings::ProviderSettings;
use crate::window;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic native Messages API provider.
pub struct AnthropicProvider {
    settings: ProviderSettings,
}

impl AnthropicProvider {
    pub fn new(settings: ProviderSettings) -> Self {
        Self { settings }
    }

    /// Anthropic at its public endpoint with category defaults.
    pub fn with_api_key(api_key: impl Into<String>, transport: Arc<dyn ChatTransport>) -> Self {
        let category = ProviderCategory::Anthropic;
        let base_url = category.default_base_url().unwrap_or_default();
        Self::new(ProviderSettings::new(category, api_key, base_url, transport))
    }

    pub fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    /// Build the `/v1/messages` request for one call.
    pub fn build_request(&self, request: &ChatRequest<'_>) -> TransportRequest {
        let composed = prompt::compose(request);
        let counter = self.settings.counter.as_ref();
        let fixed_cost = counter.count(Role::System, &composed.system)
            + counter.count(Role::User, &composed.user_message);
        let history =
            self.settings
                .history_window(&request.assistant.model, request.history, fixed_cost);
        let images = images::embeddable(request.images, self.name());

        let body = serde_json::json!({
            "model": request.assistant.model.id,
            "system": composed.system,
            "messages": Self::to_api_messages(history, composed.user_message, &images),
            "max_tokens": self.settings.reserved_output_tokens,
            "temperature": request.assistant.temperature,
            "top_p": request.assistant.top_p,
        });

        TransportRequest::new(format!("{}/v1/messages", self.settings.base_url), body)
            .header("x-api-key", self.settings.api_key.as_str())
            .header("anthropic-version", ANTHROPIC_VERSION)
    }

    /// Flat alternating history followed by the current user entry.
    fn to_api_messages(
        history: &[ConversationTurn],
        user_message: String,
        images: &[&ImageAttachment],
    ) -> Vec<AnthropicMessage> {
        let shape = window::alternating(history, user_message);
        let user_message = shape.current;
        let mut messages: Vec<AnthropicMessage> = shape
            .history
            .into_iter()
            .map(|(role, text)| AnthropicMessage {
                role: role.as_str().into(),
                content: AnthropicContent::Text(text),
            })
            .collect();

        let content = if images.is_empty() {
            AnthropicContent::Text(user_message)
        } else {
            let mut blocks: Vec<ContentBlock> = images
                .iter()
                .map(|image| ContentBlock::Image {
                    source: ImageSource {
                        source_type: "base64".into(),
                        media_type: image.normalized_mime_type(),
                        data: image.base64_data.trim().to_string(),
                    },
                })
                .collect();
            blocks.push(ContentBlock::Text { text: user_message });
            AnthropicContent::Blocks(blocks)
        };
        messages.push(AnthropicMessage {
            role: Role::User.as_str().into(),
            content,
        });

        messages
    }

    /// Concatenate the text blocks of a Messages API response.
    fn parse_response(value: serde_json::Value) -> Result<String, ProviderError> {
        let response: AnthropicResponse = serde_json::from_value(value)
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        let text: String = response
            .content
            .into_iter()
            .filter_map(|block| match block {
                ResponseContentBlock::Text { text } => Some(text),
                ResponseContentBlock::Other => None,
            })
            .collect();

        if text.trim().is_empty() {
            return Err(ProviderError::EmptyCompletion(format!(
                "No text content in response (stop_reason: {})",
                response.stop_reason.as_deref().unwrap_or("none")
            )));
        }
        Ok(text)
    }
}

#[async_trait]
impl ChatProvider for AnthropicProvider {
    fn name(&self) -> &str {
        ProviderCategory::Anthropic.as_str()
    }

    fn category(&self) -> ProviderCategory {
        ProviderCategory::Anthropic
    }

    async fn get_chat_completion(
        &self,
        request: ChatRequest<'_>,
    ) -> std::result::Result<Option<String>, ProviderError> {
        let transport_request = self.build_request(&request);
        debug!(
            provider = "anthropic",
            model = %request.assistant.model.id,
            history = request.history.len(),
            images = request.images.len(),
            "Sending messages request"
        );
        let reply = self
            .settings
            .execute(self.name(), transport_request, Self::parse_response)
            .await?;
        Ok(Some(reply))
    }
}

// --- Anthropic API types ---

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: AnthropicContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum AnthropicContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "image")]
    Image { source: ImageSource },
    #[serde(rename = "text")]
    Text { text: String },
}

#[derive(Debug, Serialize)]
struct ImageSource {
    #[serde(rename = "type")]
    source_type: String,
    media_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<ResponseContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ResponseContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}
