//! Chat provider implementations for Parley.
//!
//! All providers implement the `parley_core::ChatProvider` trait. The factory
//! selects the correct provider from a category name; [`complete_chat`] runs
//! one call end to end and splits the reply into content and title.

pub mod anthropic;
pub mod factory;
pub mod gemini;
pub mod images;
pub mod openai_compat;
pub mod prompt;
pub mod retry;
pub mod self_hosted;
pub mod settings;
pub mod tag;
pub mod token;
pub mod transport;
pub mod window;

#[cfg(test)]
mod testing;

pub use anthropic::AnthropicProvider;
pub use factory::{ProviderFactory, create_provider};
pub use gemini::GeminiProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use retry::RetryExecutor;
pub use self_hosted::SelfHostedProvider;
pub use settings::ProviderSettings;
pub use tag::{ExtractionResult, extract, extract_message_content, extract_subject_title};
pub use token::{HeuristicCounter, TokenCounter};
pub use transport::HttpTransport;

use parley_core::{ChatProvider, ChatRequest, Result};
use tracing::Instrument;

/// Validate the request, ask `provider` for a reply, and extract its title.
///
/// `Ok(None)` is passed through from providers that skipped the call (a
/// self-hosted provider without a credential).
pub async fn complete_chat(
    provider: &dyn ChatProvider,
    request: ChatRequest<'_>,
) -> Result<Option<ExtractionResult>> {
    request.assistant.validate()?;

    let span = tracing::info_span!(
        "chat_completion",
        request_id = %uuid::Uuid::new_v4(),
        provider = %provider.name(),
        model = %request.assistant.model.id,
    );

    async move {
        let reply = provider.get_chat_completion(request).await?;
        let result = reply.as_deref().map(tag::extract);
        if let Some(result) = &result {
            tracing::debug!(title = %result.title, chars = result.content.len(), "Reply received");
        }
        Ok::<_, parley_core::Error>(result)
    }
    .instrument(span)
    .await
}
