//! Provider and transport traits, the seams between the orchestration layer
//! and the outside world.
//!
//! A [`ChatProvider`] turns one [`ChatRequest`] into a reply using a backend's
//! wire format. It does its network I/O through a [`ChatTransport`], so the
//! vendor HTTP client can be swapped for a test double.

use async_trait::async_trait;
use serde::Serialize;

use crate::assistant::AssistantConfig;
use crate::category::ProviderCategory;
use crate::error::ProviderError;
use crate::message::{ConversationTurn, ImageAttachment};

/// Everything one `get_chat_completion` call needs, borrowed from the caller.
#[derive(Debug, Clone, Copy)]
pub struct ChatRequest<'a> {
    /// Prior turns, oldest first
    pub history: &'a [ConversationTurn],

    /// The message being answered
    pub message: &'a str,

    /// Pre-fetched retrieval context; empty means no augmentation
    pub retrieved_text: &'a str,

    pub assistant: &'a AssistantConfig,

    pub images: &'a [ImageAttachment],
}

impl<'a> ChatRequest<'a> {
    pub fn new(
        history: &'a [ConversationTurn],
        message: &'a str,
        retrieved_text: &'a str,
        assistant: &'a AssistantConfig,
    ) -> Self {
        Self {
            history,
            message,
            retrieved_text,
            assistant,
            images: &[],
        }
    }

    pub fn with_images(mut self, images: &'a [ImageAttachment]) -> Self {
        self.images = images;
        self
    }

    pub fn has_retrieval(&self) -> bool {
        !self.retrieved_text.trim().is_empty()
    }
}

/// A conversational backend.
///
/// Implementations hold only immutable construction-time state (credentials,
/// endpoint, transport), so one instance can serve many concurrent calls.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openai", "gemini").
    fn name(&self) -> &str;

    fn category(&self) -> ProviderCategory;

    /// Produce the next assistant turn.
    ///
    /// `Ok(None)` means the provider is unavailable without having attempted
    /// any I/O; only the self-hosted provider returns it, when it was built
    /// without a credential.
    async fn get_chat_completion(
        &self,
        request: ChatRequest<'_>,
    ) -> std::result::Result<Option<String>, ProviderError>;
}

/// A JSON POST to a backend.
#[derive(Clone, Serialize)]
pub struct TransportRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: serde_json::Value,
}

impl TransportRequest {
    pub fn new(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            body,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

const SECRET_HEADERS: &[&str] = &["authorization", "x-api-key", "x-goog-api-key"];

impl std::fmt::Debug for TransportRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let headers: Vec<(&str, &str)> = self
            .headers
            .iter()
            .map(|(k, v)| {
                if SECRET_HEADERS.iter().any(|s| k.eq_ignore_ascii_case(s)) {
                    (k.as_str(), "[REDACTED]")
                } else {
                    (k.as_str(), v.as_str())
                }
            })
            .collect();
        f.debug_struct("TransportRequest")
            .field("url", &self.url)
            .field("headers", &headers)
            .field("body", &self.body)
            .finish()
    }
}

/// The narrow "send a chat request" capability every provider depends on.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// POST `request.body` as JSON and return the parsed JSON response.
    ///
    /// Non-success statuses are reported as [`ProviderError`]s.
    async fn post_json(
        &self,
        request: TransportRequest,
    ) -> std::result::Result<serde_json::Value, ProviderError>;
}
