//! OpenAI-compatible provider implementation.
//!
//! Serves both the OpenAI category and the fast-inference (Groq) category,
//! which speak the same `/chat/completions` dialect:
//! - System prompt as the first `system` message
//! - Windowed history as alternating `user` / `assistant` messages
//! - Images as `image_url` parts carrying a `data:` URL

use async_trait::async_trait;
use parley_core::{
    ChatProvider, ChatRequest, ChatTransport, ImageAttachment, ProviderCategory, ProviderError,
    Role, TransportRequest,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::images;
use crate::prompt;
use crate::settings::ProviderSettings;
use crate::window;

/// An OpenAI-compatible chat provider.
pub struct OpenAiCompatProvider {
    category: ProviderCategory,
    settings: ProviderSettings,
}

impl OpenAiCompatProvider {
    /// Create a provider for `category` (OpenAi or Groq).
    pub fn new(category: ProviderCategory, settings: ProviderSettings) -> Self {
        Self { category, settings }
    }

    /// OpenAI at its public endpoint (convenience constructor).
    pub fn openai(api_key: impl Into<String>, transport: Arc<dyn ChatTransport>) -> Self {
        let category = ProviderCategory::OpenAi;
        let base_url = category.default_base_url().unwrap_or_default();
        Self::new(category, ProviderSettings::new(category, api_key, base_url, transport))
    }

    /// Groq at its public endpoint (convenience constructor).
    pub fn groq(api_key: impl Into<String>, transport: Arc<dyn ChatTransport>) -> Self {
        let category = ProviderCategory::Groq;
        let base_url = category.default_base_url().unwrap_or_default();
        Self::new(category, ProviderSettings::new(category, api_key, base_url, transport))
    }

    pub fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    /// Build the `/chat/completions` request for one call.
    pub fn build_request(&self, request: &ChatRequest<'_>) -> TransportRequest {
        let composed = prompt::compose(request);
        let counter = self.settings.counter.as_ref();
        let fixed_cost = counter.count(Role::System, &composed.system)
            + counter.count(Role::User, &composed.user_message);
        let history =
            self.settings
                .history_window(&request.assistant.model, request.history, fixed_cost);
        let images = images::embeddable(request.images, self.name());

        let messages =
            Self::to_api_messages(&composed.system, history, composed.user_message, &images);

        let body = serde_json::json!({
            "model": request.assistant.model.id,
            "messages": messages,
            "temperature": request.assistant.temperature,
            "top_p": request.assistant.top_p,
            "max_tokens": self.settings.reserved_output_tokens,
            "stream": false,
        });

        TransportRequest::new(format!("{}/chat/completions", self.settings.base_url), body)
            .header("Authorization", format!("Bearer {}", self.settings.api_key))
    }

    /// `[system] + window + [user]`, with image parts on the final user message.
    fn to_api_messages(
        system: &str,
        history: &[parley_core::ConversationTurn],
        user_message: String,
        images: &[&ImageAttachment],
    ) -> Vec<ApiMessage> {
        let mut messages = vec![ApiMessage {
            role: Role::System.as_str().into(),
            content: ApiContent::Text(system.to_string()),
        }];

        messages.extend(window::role_interleaved(history).into_iter().map(|(role, text)| {
            ApiMessage {
                role: role.as_str().into(),
                content: ApiContent::Text(text.to_string()),
            }
        }));

        let content = if images.is_empty() {
            ApiContent::Text(user_message)
        } else {
            let mut parts = vec![ContentPart::Text { text: user_message }];
            parts.extend(images.iter().map(|image| ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: format!(
                        "data:{};base64,{}",
                        image.normalized_mime_type(),
                        image.base64_data.trim()
                    ),
                },
            }));
            ApiContent::Parts(parts)
        };
        messages.push(ApiMessage {
            role: Role::User.as_str().into(),
            content,
        });

        messages
    }

    /// Pull the first choice's text out of a completion response.
    fn parse_response(value: serde_json::Value) -> Result<String, ProviderError> {
        let api_response: ApiResponse = serde_json::from_value(value)
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::EmptyCompletion("No choices in response".into()))?;

        match choice.message.content {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(ProviderError::EmptyCompletion(
                "First choice has no content".into(),
            )),
        }
    }
}

#[async_trait]
impl ChatProvider for OpenAiCompatProvider {
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
        let transport_request = self.build_request(&request);
        debug!(
            provider = %self.name(),
            model = %request.assistant.model.id,
            history = request.history.len(),
            images = request.images.len(),
            "Sending completion request"
        );
        let reply = self
            .settings
            .execute(self.name(), transport_request, Self::parse_response)
            .await?;
        Ok(Some(reply))
    }
}

// --- OpenAI API types ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    content: ApiContent,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum ApiContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize, Deserialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::fixtures::{PNG_BASE64, broken, png};
    use crate::testing::{ScriptedTransport, assistant};
    use parley_core::{Backoff, ConversationTurn, ModelRef, RetryPolicy};
    use serde_json::json;
    use std::time::Duration;

    fn completion(text: &str) -> serde_json::Value {
        json!({
            "id": "chatcmpl-1",
            "model": "gpt-4o",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": text}}]
        })
    }

    fn provider(transport: Arc<ScriptedTransport>) -> OpenAiCompatProvider {
        let p = OpenAiCompatProvider::openai("sk-test", transport);
        let settings = p
            .settings()
            .clone()
            .with_retry(RetryPolicy::new(3, Backoff::Fixed(Duration::ZERO)));
        OpenAiCompatProvider::new(ProviderCategory::OpenAi, settings)
    }

    #[test]
    fn constructors() {
        let openai = OpenAiCompatProvider::openai("sk", Arc::new(ScriptedTransport::default()));
        assert_eq!(openai.name(), "openai");
        assert_eq!(openai.settings().base_url, "https://api.openai.com/v1");

        let groq = OpenAiCompatProvider::groq("gsk", Arc::new(ScriptedTransport::default()));
        assert_eq!(groq.category(), ProviderCategory::Groq);
        assert_eq!(groq.settings().retry.max_attempts, 2);
    }

    #[test]
    fn request_shape_text_only() {
        let p = provider(Arc::new(ScriptedTransport::default()));
        let a = assistant(ModelRef::new("gpt-4o"));
        let history = vec![ConversationTurn::new("Hi", "Hello!", "asst-1")];
        let req = p.build_request(&ChatRequest::new(&history, "How are you?", "", &a));

        assert_eq!(req.url, "https://api.openai.com/v1/chat/completions");
        assert_eq!(req.header_value("Authorization"), Some("Bearer sk-test"));

        let messages = req.body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0]["role"], "system");
        assert!(messages[0]["content"].as_str().unwrap().contains("You are Ada"));
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(messages[1]["content"], "Hi");
        assert_eq!(messages[2]["role"], "assistant");
        assert_eq!(messages[3]["content"], "How are you?\nBe concise.");

        assert_eq!(req.body["model"], "gpt-4o");
        assert_eq!(req.body["max_tokens"], 4000);
        assert!((req.body["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn request_shape_with_images() {
        let p = provider(Arc::new(ScriptedTransport::default()));
        let a = assistant(ModelRef::new("gpt-4o").with_vision());
        let images = vec![png("a.png"), broken("b.png")];
        let req = p.build_request(&ChatRequest::new(&[], "What is this?", "", &a).with_images(&images));

        let user = req.body["messages"].as_array().unwrap().last().unwrap().clone();
        let parts = user["content"].as_array().unwrap();
        assert_eq!(parts.len(), 2); // text + the one valid image
        assert_eq!(parts[0]["type"], "text");
        assert_eq!(parts[1]["type"], "image_url");
        assert_eq!(
            parts[1]["image_url"]["url"],
            format!("data:image/png;base64,{PNG_BASE64}")
        );
    }

    #[test]
    fn retrieval_goes_into_user_message() {
        let p = provider(Arc::new(ScriptedTransport::default()));
        let a = assistant(ModelRef::new("gpt-4o"));
        let req = p.build_request(&ChatRequest::new(&[], "Q?", "doc text", &a));
        let user = req.body["messages"][1]["content"].as_str().unwrap().to_string();
        assert_eq!(user.matches("fetchedStart").count(), 1);
        assert_eq!(user.matches("fetchedEnd").count(), 1);
    }

    #[test]
    fn history_is_windowed_to_context() {
        let p = provider(Arc::new(ScriptedTransport::default()));
        let a = assistant(ModelRef::new("small").with_context_window(4_300));
        let history: Vec<ConversationTurn> = (0..100)
            .map(|i| ConversationTurn::new("q".repeat(80), format!("answer {i}"), "a"))
            .collect();
        let req = p.build_request(&ChatRequest::new(&history, "latest", "", &a));
        let messages = req.body["messages"].as_array().unwrap();
        assert!(messages.len() < 2 + 200);
        // newest history turn is always present right before the current message
        assert_eq!(messages[messages.len() - 2]["content"], "answer 99");
    }

    #[test]
    fn parse_text_response() {
        assert_eq!(
            OpenAiCompatProvider::parse_response(completion("Hello!")).unwrap(),
            "Hello!"
        );
    }

    #[test]
    fn parse_degenerate_responses() {
        assert!(matches!(
            OpenAiCompatProvider::parse_response(json!({"choices": []})),
            Err(ProviderError::EmptyCompletion(_))
        ));
        assert!(matches!(
            OpenAiCompatProvider::parse_response(json!({"choices": [{"message": {"content": null}}]})),
            Err(ProviderError::EmptyCompletion(_))
        ));
        assert!(matches!(
            OpenAiCompatProvider::parse_response(json!({"choices": "nope"})),
            Err(ProviderError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn completes_via_transport() {
        let transport = Arc::new(ScriptedTransport::new(vec![Ok(completion("Hi {{{Greeting}}}"))]));
        let p = provider(transport.clone());
        let a = assistant(ModelRef::new("gpt-4o"));
        let reply = p
            .get_chat_completion(ChatRequest::new(&[], "Hello", "", &a))
            .await
            .unwrap();
        assert_eq!(reply.as_deref(), Some("Hi {{{Greeting}}}"));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn empty_completion_is_retried() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Ok(json!({"choices": []})),
            Err(ProviderError::ApiError {
                status_code: 503,
                message: "overloaded".into(),
            }),
            Ok(completion("Recovered")),
        ]));
        let p = provider(transport.clone());
        let a = assistant(ModelRef::new("gpt-4o"));
        let reply = p
            .get_chat_completion(ChatRequest::new(&[], "Hello", "", &a))
            .await
            .unwrap();
        assert_eq!(reply.as_deref(), Some("Recovered"));
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_backend_error() {
        let err = ProviderError::RateLimited { retry_after_secs: 0 };
        let transport = Arc::new(ScriptedTransport::new(vec![
            Err(err.clone()),
            Err(err.clone()),
            Err(err.clone()),
        ]));
        let p = provider(transport.clone());
        let a = assistant(ModelRef::new("gpt-4o"));
        let result = p
            .get_chat_completion(ChatRequest::new(&[], "Hello", "", &a))
            .await;
        assert_eq!(result.unwrap_err(), err);
        assert_eq!(transport.calls(), 3);
    }
}
