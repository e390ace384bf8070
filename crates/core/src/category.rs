//! Provider categories: the closed set of backend wire-shape families.

use crate::error::Error;
use crate::retry::{Backoff, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Every backend Parley knows how to talk to.
///
/// Adding a variant forces every `match` over categories (factory dispatch,
/// request shape, retry defaults) to be revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderCategory {
    /// General-purpose completion API with role-tagged messages.
    OpenAi,
    /// General-purpose API with the system prompt as a separate field.
    Anthropic,
    /// Turn-keyed "parts" API with multimodal turns.
    Gemini,
    /// Fast-inference host speaking the role-array dialect.
    Groq,
    /// Self-hosted backend served from CPU.
    SelfHostedSmall,
    /// Self-hosted backend served from GPU.
    SelfHostedLarge,
}

/// The request shape a category is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestShape {
    RoleArray,
    SystemField,
    TurnParts,
    SelfHostedHttp,
}

impl ProviderCategory {
    pub const ALL: [ProviderCategory; 6] = [
        ProviderCategory::OpenAi,
        ProviderCategory::Anthropic,
        ProviderCategory::Gemini,
        ProviderCategory::Groq,
        ProviderCategory::SelfHostedSmall,
        ProviderCategory::SelfHostedLarge,
    ];

    /// Canonical name, also used as the config table key.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderCategory::OpenAi => "openai",
            ProviderCategory::Anthropic => "anthropic",
            ProviderCategory::Gemini => "gemini",
            ProviderCategory::Groq => "groq",
            ProviderCategory::SelfHostedSmall => "self_hosted_small",
            ProviderCategory::SelfHostedLarge => "self_hosted_large",
        }
    }

    pub fn shape(&self) -> RequestShape {
        match self {
            ProviderCategory::OpenAi | ProviderCategory::Groq => RequestShape::RoleArray,
            ProviderCategory::Anthropic => RequestShape::SystemField,
            ProviderCategory::Gemini => RequestShape::TurnParts,
            ProviderCategory::SelfHostedSmall | ProviderCategory::SelfHostedLarge => {
                RequestShape::SelfHostedHttp
            }
        }
    }

    pub fn is_self_hosted(&self) -> bool {
        self.shape() == RequestShape::SelfHostedHttp
    }

    /// Public endpoint used when no override is configured.
    /// Self-hosted categories have none and must be given a base URL.
    pub fn default_base_url(&self) -> Option<&'static str> {
        match self {
            ProviderCategory::OpenAi => Some("https://api.openai.com/v1"),
            ProviderCategory::Anthropic => Some("https://api.anthropic.com"),
            ProviderCategory::Gemini => Some("https://generativelanguage.googleapis.com/v1beta"),
            ProviderCategory::Groq => Some("https://api.groq.com/openai/v1"),
            ProviderCategory::SelfHostedSmall | ProviderCategory::SelfHostedLarge => None,
        }
    }

    /// Context window assumed when the model declares none.
    pub fn default_context_window(&self) -> u32 {
        match self {
            ProviderCategory::OpenAi => 128_000,
            ProviderCategory::Anthropic => 200_000,
            ProviderCategory::Gemini => 1_000_000,
            ProviderCategory::Groq => 32_768,
            ProviderCategory::SelfHostedSmall => 8_192,
            ProviderCategory::SelfHostedLarge => 32_768,
        }
    }

    pub fn default_retry_policy(&self) -> RetryPolicy {
        match self {
            ProviderCategory::OpenAi | ProviderCategory::Anthropic => RetryPolicy::new(
                3,
                Backoff::Exponential {
                    initial: Duration::from_millis(1_000),
                    multiplier: 2,
                    max: Duration::from_secs(20),
                },
            ),
            ProviderCategory::Gemini => RetryPolicy::new(
                4,
                Backoff::Exponential {
                    initial: Duration::from_millis(1_000),
                    multiplier: 2,
                    max: Duration::from_secs(30),
                },
            ),
            ProviderCategory::Groq => {
                RetryPolicy::new(2, Backoff::Fixed(Duration::from_millis(500)))
            }
            ProviderCategory::SelfHostedSmall | ProviderCategory::SelfHostedLarge => {
                RetryPolicy::new(4, Backoff::Linear(Duration::from_millis(1_000)))
            }
        }
    }
}

impl std::fmt::Display for ProviderCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        let category = match normalized.as_str() {
            "openai" | "open_ai" => ProviderCategory::OpenAi,
            "anthropic" | "claude" => ProviderCategory::Anthropic,
            "gemini" | "google" => ProviderCategory::Gemini,
            "groq" => ProviderCategory::Groq,
            "self_hosted_small" | "local_small" | "local_cpu" => ProviderCategory::SelfHostedSmall,
            "self_hosted_large" | "local_large" | "local_gpu" => ProviderCategory::SelfHostedLarge,
            _ => {
                return Err(Error::UnsupportedCategory {
                    category: s.to_string(),
                });
            }
        };
        Ok(category)
    }
}
