//! Assistant configuration supplied fresh with every call.

use crate::category::ProviderCategory;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Reference to the model an assistant runs on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelRef {
    /// Wire identifier (e.g., "gpt-4o", "claude-3-5-sonnet-latest")
    pub id: String,

    /// Human-readable label
    #[serde(default)]
    pub label: String,

    /// Declared context window, if the model publishes one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_window_tokens: Option<u32>,

    #[serde(default)]
    pub supports_vision: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_hint: Option<ProviderCategory>,

    /// Hardware tier a self-hosted server runs this model on. When unset the
    /// self-hosted category decides.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_tier: Option<ModelSizeTier>,
}

/// Size class of a self-hosted model: small models run on CPU, large on GPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelSizeTier {
    Small,
    Large,
}

impl ModelRef {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            context_window_tokens: None,
            supports_vision: false,
            category_hint: None,
            size_tier: None,
        }
    }

    pub fn with_context_window(mut self, tokens: u32) -> Self {
        self.context_window_tokens = Some(tokens);
        self
    }

    pub fn with_vision(mut self) -> Self {
        self.supports_vision = true;
        self
    }

    pub fn with_category_hint(mut self, category: ProviderCategory) -> Self {
        self.category_hint = Some(category);
        self
    }

    pub fn with_size_tier(mut self, tier: ModelSizeTier) -> Self {
        self.size_tier = Some(tier);
        self
    }
}

/// The persona and sampling parameters of one assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantConfig {
    pub name: String,

    /// Short description of what the assistant is for
    pub role: String,

    pub model: ModelRef,

    /// Instructions appended to every user message
    #[serde(default)]
    pub base_prompt: String,

    /// Sampling temperature, 0.0..=2.0
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Nucleus sampling, 0.0..=1.0
    #[serde(default = "default_top_p")]
    pub top_p: f32,
}

fn default_temperature() -> f32 {
    0.7
}
fn default_top_p() -> f32 {
    1.0
}

impl AssistantConfig {
    pub fn new(name: impl Into<String>, role: impl Into<String>, model: ModelRef) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
            model,
            base_prompt: String::new(),
            temperature: default_temperature(),
            top_p: default_top_p(),
        }
    }

    pub fn with_base_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.base_prompt = prompt.into();
        self
    }

    /// Reject sampling parameters outside the ranges every backend accepts.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(Error::InvalidInput(format!(
                "temperature must be between 0.0 and 2.0, got {}",
                self.temperature
            )));
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(Error::InvalidInput(format!(
                "top_p must be between 0.0 and 1.0, got {}",
                self.top_p
            )));
        }
        if self.model.id.trim().is_empty() {
            return Err(Error::InvalidInput("model id must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assistant() -> AssistantConfig {
        AssistantConfig::new("Ada", "research assistant", ModelRef::new("gpt-4o"))
    }

    #[test]
    fn defaults_are_valid() {
        let a = assistant();
        assert!((a.temperature - 0.7).abs() < f32::EPSILON);
        assert!(a.validate().is_ok());
    }

    #[test]
    fn temperature_out_of_range_rejected() {
        let a = AssistantConfig {
            temperature: 2.5,
            ..assistant()
        };
        let err = a.validate().unwrap_err();
        assert!(err.is_user_input());
        assert!(err.to_string().contains("temperature"));
    }

    #[test]
    fn top_p_out_of_range_rejected() {
        let a = AssistantConfig {
            top_p: -0.1,
            ..assistant()
        };
        assert!(a.validate().is_err());
    }

    #[test]
    fn model_ref_deserializes_with_defaults() {
        let m: ModelRef = serde_json::from_str(r#"{"id":"llama3"}"#).unwrap();
        assert_eq!(m.label, "");
        assert!(m.category_hint.is_none());
        assert!(!m.supports_vision);
        assert!(m.context_window_tokens.is_none());
        assert!(m.size_tier.is_none());
    }

    #[test]
    fn size_tier_uses_lowercase_names() {
        let m: ModelRef = serde_json::from_str(r#"{"id":"llama3-70b","sizeTier":"large"}"#).unwrap();
        assert_eq!(m.size_tier, Some(ModelSizeTier::Large));
        assert_eq!(
            serde_json::to_value(ModelRef::new("phi-3").with_size_tier(ModelSizeTier::Small)).unwrap()["sizeTier"],
            "small"
        );
    }
}
