//! Conversation value objects.
//!
//! The caller owns the conversation log; these types are handed to a provider
//! by reference for a single call and never mutated by the core.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The AI assistant
    Assistant,
    /// System instructions (persona, rules)
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

/// One (user text, assistant text) pair in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationTurn {
    pub user_text: String,
    pub assistant_text: String,
    /// Which assistant produced `assistant_text`.
    #[serde(default)]
    pub assistant_id: String,
}

impl ConversationTurn {
    pub fn new(
        user_text: impl Into<String>,
        assistant_text: impl Into<String>,
        assistant_id: impl Into<String>,
    ) -> Self {
        Self {
            user_text: user_text.into(),
            assistant_text: assistant_text.into(),
            assistant_id: assistant_id.into(),
        }
    }
}

/// Mime types any backend accepts for inline images.
pub const SUPPORTED_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

/// An image attached to the current user message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAttachment {
    /// Raw base64 payload (no `data:` prefix).
    pub base64_data: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub name: String,
}

impl ImageAttachment {
    pub fn new(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        base64_data: impl Into<String>,
    ) -> Self {
        let base64_data = base64_data.into();
        let size_bytes = (base64_data.len() as u64 * 3) / 4;
        Self {
            base64_data,
            mime_type: mime_type.into(),
            size_bytes,
            name: name.into(),
        }
    }

    /// Mime type lowercased, with `image/jpg` folded into `image/jpeg`.
    pub fn normalized_mime_type(&self) -> String {
        let mime = self.mime_type.trim().to_ascii_lowercase();
        if mime == "image/jpg" {
            "image/jpeg".to_string()
        } else {
            mime
        }
    }

    /// Check the attachment can be embedded inline: supported mime type and
    /// a payload that actually decodes as standard base64.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let mime = self.normalized_mime_type();
        if !SUPPORTED_IMAGE_TYPES.contains(&mime.as_str()) {
            return Err(format!("unsupported mime type '{}'", self.mime_type));
        }
        if self.base64_data.trim().is_empty() {
            return Err("empty image payload".into());
        }
        STANDARD
            .decode(self.base64_data.trim())
            .map(|_| ())
            .map_err(|e| format!("payload is not valid base64: {e}"))
    }
}
