//! Gemini provider: the turn-based "parts" request shape.
//!
//! History becomes alternating `user` / `model` entries, each wrapping
//! `{parts: [{text}]}`. The current turn's parts carry the text followed by
//! one `inline_data` part per image.

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

pub struct GeminiProvider {
    settings: ProviderSettings,
}

impl GeminiProvider {
    pub fn new(settings: ProviderSettings) -> Self {
        Self { settings }
    }

    /// Gemini at its public endpoint with category defaults.
    pub fn with_api_key(api_key: impl Into<String>, transport: Arc<dyn ChatTransport>) -> Self {
        let category = ProviderCategory::Gemini;
        let base_url = category.default_base_url().unwrap_or_default();
        Self::new(ProviderSettings::new(category, api_key, base_url, transport))
    }

    pub fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    /// Build the `models/{model}:generateContent` request for one call.
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
            "systemInstruction": { "parts": [{ "text": composed.system }] },
            "contents": Self::to_contents(history, composed.user_message, &images),
            "generationConfig": {
                "temperature": request.assistant.temperature,
                "topP": request.assistant.top_p,
                "maxOutputTokens": self.settings.reserved_output_tokens,
            },
        });

        let url = format!(
            "{}/models/{}:generateContent",
            self.settings.base_url, request.assistant.model.id
        );
        TransportRequest::new(url, body).header("x-goog-api-key", self.settings.api_key.as_str())
    }

    fn to_contents(
        history: &[ConversationTurn],
        user_message: String,
        images: &[&ImageAttachment],
    ) -> Vec<Content> {
        let shape = window::alternating(history, user_message);
        let mut contents: Vec<Content> = shape
            .history
            .into_iter()
            .map(|(role, text)| Content {
                role: gemini_role(role).into(),
                parts: vec![Part::Text { text }],
            })
            .collect();

        let mut parts = vec![Part::Text {
            text: shape.current,
        }];
        parts.extend(images.iter().map(|image| Part::InlineData {
            inline_data: InlineData {
                mime_type: image.normalized_mime_type(),
                data: image.base64_data.trim().to_string(),
            },
        }));
        contents.push(Content {
            role: gemini_role(Role::User).into(),
            parts,
        });

        contents
    }

    /// Concatenate the text parts of the first candidate.
    fn parse_response(value: serde_json::Value) -> Result<String, ProviderError> {
        let response: GenerateContentResponse = serde_json::from_value(value)
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(ProviderError::EmptyCompletion(format!(
                "Prompt blocked: {reason}"
            )));
        }

        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::EmptyCompletion("No candidates in response".into()))?;

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ProviderError::EmptyCompletion(format!(
                "Candidate has no text (finishReason: {})",
                candidate.finish_reason.as_deref().unwrap_or("none")
            )));
        }
        Ok(text)
    }
}

fn gemini_role(role: Role) -> &'static str {
    match role {
        Role::Assistant => "model",
        Role::User | Role::System => "user",
    }
}

#[async_trait]
impl ChatProvider for GeminiProvider {
    fn name(&self) -> &str {
        ProviderCategory::Gemini.as_str()
    }

    fn category(&self) -> ProviderCategory {
        ProviderCategory::Gemini
    }

    async fn get_chat_completion(
        &self,
        request: ChatRequest<'_>,
    ) -> std::result::Result<Option<String>, ProviderError> {
        let transport_request = self.build_request(&request);
        debug!(
            provider = "gemini",
            model = %request.assistant.model.id,
            history = request.history.len(),
            images = request.images.len(),
            "Sending generateContent request"
        );
        let reply = self
            .settings
            .execute(self.name(), transport_request, Self::parse_response)
            .await?;
        Ok(Some(reply))
    }
}

// --- Gemini API types ---

#[derive(Debug, Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}
