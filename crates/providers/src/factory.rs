//! Provider factory: maps a category name and credentials to a ready provider.

use std::sync::Arc;

use parley_config::AppConfig;
use parley_core::{ChatProvider, ChatTransport, Error, ProviderCategory, RequestShape, Result};
use tracing::info;

use crate::anthropic::AnthropicProvider;
use crate::gemini::GeminiProvider;
use crate::openai_compat::OpenAiCompatProvider;
use crate::self_hosted::SelfHostedProvider;
use crate::settings::ProviderSettings;
use crate::transport::HttpTransport;

/// Builds providers from configuration, optionally over an injected transport.
///
/// Construction never touches the network.
#[derive(Default)]
pub struct ProviderFactory {
    config: AppConfig,
    transport: Option<Arc<dyn ChatTransport>>,
}

impl ProviderFactory {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            transport: None,
        }
    }

    /// Use `transport` for every provider instead of a fresh `HttpTransport`.
    pub fn with_transport(mut self, transport: Arc<dyn ChatTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Parse `category` and build the matching provider.
    ///
    /// Unknown categories fail with [`Error::UnsupportedCategory`] naming the
    /// offending value.
    pub fn create(
        &self,
        category: &str,
        credential: &str,
        base_url: Option<&str>,
    ) -> Result<Arc<dyn ChatProvider>> {
        let category: ProviderCategory = category.parse()?;
        self.create_for(category, credential, base_url)
    }

    /// Build the provider for an already-parsed category.
    ///
    /// The base URL is taken from `base_url`, then the configured override,
    /// then the category default. Self-hosted categories have no default and
    /// fail with [`Error::MissingBaseUrl`] when neither is given. An empty
    /// `credential` falls back to the configured API key.
    pub fn create_for(
        &self,
        category: ProviderCategory,
        credential: &str,
        base_url: Option<&str>,
    ) -> Result<Arc<dyn ChatProvider>> {
        let base_url = base_url
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .or_else(|| self.config.base_url(category).map(str::trim))
            .filter(|url| !url.is_empty())
            .or_else(|| category.default_base_url())
            .ok_or_else(|| Error::MissingBaseUrl {
                category: category.to_string(),
            })?;

        let credential = if credential.trim().is_empty() {
            self.config
                .provider(category)
                .and_then(|p| p.api_key.as_deref())
                .unwrap_or_default()
        } else {
            credential
        };

        let transport = match &self.transport {
            Some(transport) => transport.clone(),
            None => Arc::new(HttpTransport::new(self.config.request_timeout())?),
        };

        let settings =
            ProviderSettings::from_config(category, credential, base_url, &self.config, transport);

        info!(
            provider = %category,
            base_url = %settings.base_url,
            max_attempts = settings.retry.max_attempts,
            "Provider created"
        );

        let provider: Arc<dyn ChatProvider> = match category.shape() {
            RequestShape::RoleArray => Arc::new(OpenAiCompatProvider::new(category, settings)),
            RequestShape::SystemField => Arc::new(AnthropicProvider::new(settings)),
            RequestShape::TurnParts => Arc::new(GeminiProvider::new(settings)),
            RequestShape::SelfHostedHttp => Arc::new(SelfHostedProvider::new(category, settings)),
        };
        Ok(provider)
    }
}

/// Build a provider with default configuration and the HTTP transport.
pub fn create_provider(
    category: &str,
    credential: &str,
    base_url: Option<&str>,
) -> Result<Arc<dyn ChatProvider>> {
    ProviderFactory::default().create(category, credential, base_url)
}
