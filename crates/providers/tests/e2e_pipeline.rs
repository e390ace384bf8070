//! End-to-end tests for the chat orchestration pipeline.
//!
//! These drive `complete_chat` through the factory for every category, with a
//! recording transport standing in for the network: prompt composition,
//! windowing, request shaping, retry, and title extraction all run for real.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use parley_config::{AppConfig, BackoffKind, ProviderConfig, RetryConfig};
use parley_core::{
    AssistantConfig, ChatRequest, ChatTransport, ConversationTurn, Error, ImageAttachment,
    ModelRef, ProviderCategory, ProviderError, TransportRequest,
};
use parley_providers::{ProviderFactory, complete_chat};
use serde_json::{Value, json};

// ── Recording Transport ──────────────────────────────────────────────────

/// Replays scripted responses in order and keeps every request it was sent.
#[derive(Default)]
struct RecordingTransport {
    responses: Mutex<VecDeque<Result<Value, ProviderError>>>,
    sent: Mutex<Vec<TransportRequest>>,
}

impl RecordingTransport {
    fn new(responses: Vec<Result<Value, ProviderError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            sent: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    fn last(&self) -> TransportRequest {
        self.sent.lock().unwrap().last().cloned().expect("no request sent")
    }
}

#[async_trait::async_trait]
impl ChatTransport for RecordingTransport {
    async fn post_json(&self, request: TransportRequest) -> Result<Value, ProviderError> {
        self.sent.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("RecordingTransport exhausted"))
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────

const PNG: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

const REPLY: &str = "Paris is the capital of France.\n\n**{{{French Capital}}}**";

fn assistant(model: ModelRef) -> AssistantConfig {
    AssistantConfig::new("Atlas", "geography tutor", model).with_base_prompt("Answer briefly.")
}

fn history() -> Vec<ConversationTurn> {
    vec![
        ConversationTurn::new("Hello", "Hi! Ask me about geography.", "a1"),
        ConversationTurn::new("What continent is France on?", "Europe.", "a2"),
    ]
}

/// A successful reply in the wire shape of `category`.
fn reply_for(category: ProviderCategory, text: &str) -> Value {
    match category {
        ProviderCategory::OpenAi | ProviderCategory::Groq => {
            json!({"choices": [{"message": {"role": "assistant", "content": text}}]})
        }
        ProviderCategory::Anthropic => json!({"content": [{"type": "text", "text": text}]}),
        ProviderCategory::Gemini => {
            json!({"candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]})
        }
        ProviderCategory::SelfHostedSmall | ProviderCategory::SelfHostedLarge => {
            json!({"response": text})
        }
    }
}

/// Retry quickly so tests don't sleep through real backoff.
fn fast_retry_config() -> AppConfig {
    let mut config = AppConfig::default();
    for category in ProviderCategory::ALL {
        config.providers.insert(
            category.as_str().to_string(),
            ProviderConfig {
                retry: Some(RetryConfig {
                    max_attempts: 3,
                    backoff: BackoffKind::Fixed,
                    initial_delay_ms: 1,
                    max_delay_ms: 5,
                }),
                ..ProviderConfig::default()
            },
        );
    }
    config
}

// ── E2E: Every Category ──────────────────────────────────────────────────

#[tokio::test]
async fn e2e_every_category_yields_content_and_title() {
    for category in ProviderCategory::ALL {
        let transport = RecordingTransport::new(vec![Ok(reply_for(category, REPLY))]);
        let provider = ProviderFactory::new(fast_retry_config())
            .with_transport(transport.clone())
            .create(category.as_str(), "secret-key", Some("http://backend.test"))
            .unwrap();

        let a = assistant(ModelRef::new("model-x"));
        let turns = history();
        let result = complete_chat(
            provider.as_ref(),
            ChatRequest::new(&turns, "What is the capital of France?", "", &a),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(result.content, "Paris is the capital of France.", "{category}");
        assert_eq!(result.title, "French Capital", "{category}");
        assert_eq!(transport.calls(), 1, "{category}");
        assert!(transport.last().url.starts_with("http://backend.test/"));
    }
}

#[tokio::test]
async fn e2e_retrieval_context_reaches_every_backend_once() {
    let retrieved = "France's capital has been Paris since 987.";
    for category in ProviderCategory::ALL {
        let transport = RecordingTransport::new(vec![Ok(reply_for(category, "Paris {{{Capital}}}"))]);
        let provider = ProviderFactory::default()
            .with_transport(transport.clone())
            .create_for(category, "k", Some("http://backend.test"))
            .unwrap();

        let a = assistant(ModelRef::new("model-x"));
        complete_chat(
            provider.as_ref(),
            ChatRequest::new(&[], "Capital of France?", retrieved, &a),
        )
        .await
        .unwrap();

        let body = transport.last().body.to_string();
        assert_eq!(body.matches(retrieved).count(), 1, "{category}");
        if !category.is_self_hosted() {
            assert_eq!(body.matches("fetchedStart").count(), 1, "{category}");
            assert_eq!(body.matches("fetchedEnd").count(), 1, "{category}");
        }
    }
}

#[tokio::test]
async fn e2e_images_embedded_in_the_backend_shape() {
    let images = vec![
        ImageAttachment::new("map.png", "image/png", PNG),
        ImageAttachment::new("corrupt.png", "image/png", "@@not-base64@@"),
    ];
    let cases = [
        (ProviderCategory::OpenAi, "image_url"),
        (ProviderCategory::Anthropic, "\"media_type\":\"image/png\""),
        (ProviderCategory::Gemini, "inline_data"),
    ];

    for (category, marker) in cases {
        let transport = RecordingTransport::new(vec![Ok(reply_for(category, "A map {{{Map}}}"))]);
        let provider = ProviderFactory::default()
            .with_transport(transport.clone())
            .create_for(category, "k", None)
            .unwrap();

        let a = assistant(ModelRef::new("vision-model").with_vision());
        let result = complete_chat(
            provider.as_ref(),
            ChatRequest::new(&[], "What is this?", "", &a).with_images(&images),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(result.title, "Map");

        let body = transport.last().body.to_string();
        assert!(body.contains(marker), "{category}: {body}");
        assert_eq!(body.matches(PNG).count(), 1, "{category}");
        assert!(!body.contains("@@not-base64@@"), "{category}");
    }
}

// ── E2E: Windowing ───────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_long_history_is_trimmed_oldest_first() {
    let long_history: Vec<ConversationTurn> = (0..500)
        .map(|i| {
            ConversationTurn::new(
                format!("Question number {i}: {}", "lorem ipsum ".repeat(20)),
                format!("Answer number {i}"),
                format!("a{i}"),
            )
        })
        .collect();

    let transport = RecordingTransport::new(vec![Ok(reply_for(ProviderCategory::OpenAi, "ok"))]);
    let provider = ProviderFactory::default()
        .with_transport(transport.clone())
        .create("openai", "k", None)
        .unwrap();

    let a = assistant(ModelRef::new("gpt-small").with_context_window(8_000));
    complete_chat(
        provider.as_ref(),
        ChatRequest::new(&long_history, "Latest question", "", &a),
    )
    .await
    .unwrap();

    let body = transport.last().body;
    let messages = body["messages"].as_array().unwrap();
    // system + some history + current
    assert!(messages.len() > 3);
    assert!(messages.len() < 2 + 2 * 500);
    assert_eq!(messages[messages.len() - 2]["content"], "Answer number 499");
    assert_eq!(
        messages.last().unwrap()["content"],
        "Latest question\nAnswer briefly."
    );
    assert!(!body.to_string().contains("Answer number 0\""));
}

// ── E2E: Failure Paths ───────────────────────────────────────────────────

#[tokio::test]
async fn e2e_transient_failures_are_retried() {
    let transport = RecordingTransport::new(vec![
        Err(ProviderError::Network("connection reset".into())),
        Ok(json!({"choices": []})),
        Ok(reply_for(ProviderCategory::Groq, "Third time lucky {{{Luck}}}")),
    ]);
    let provider = ProviderFactory::new(fast_retry_config())
        .with_transport(transport.clone())
        .create("groq", "gsk", None)
        .unwrap();

    let a = assistant(ModelRef::new("llama-3.1-8b-instant"));
    let result = complete_chat(provider.as_ref(), ChatRequest::new(&[], "Try", "", &a))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(result.title, "Luck");
    assert_eq!(transport.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn e2e_default_policy_gives_up_with_last_error() {
    let last = ProviderError::ApiError {
        status_code: 529,
        message: "overloaded".into(),
    };
    let transport = RecordingTransport::new(vec![
        Err(ProviderError::Timeout("slow".into())),
        Err(ProviderError::RateLimited { retry_after_secs: 2 }),
        Err(last.clone()),
    ]);
    let provider = ProviderFactory::default()
        .with_transport(transport.clone())
        .create("anthropic", "sk-ant", None)
        .unwrap();

    let a = assistant(ModelRef::new("claude-sonnet-4"));
    let err = complete_chat(provider.as_ref(), ChatRequest::new(&[], "Hi", "", &a))
        .await
        .unwrap_err();
    match err {
        Error::Provider(inner) => assert_eq!(inner, last),
        other => panic!("expected provider error, got {other:?}"),
    }
    assert_eq!(transport.calls(), 3);
}

#[tokio::test]
async fn e2e_self_hosted_without_credential_is_skipped() {
    let transport = RecordingTransport::new(vec![]);
    let provider = ProviderFactory::default()
        .with_transport(transport.clone())
        .create("self_hosted_large", "", Some("http://gpu.internal"))
        .unwrap();

    let a = assistant(ModelRef::new("llama-3-70b"));
    let result = complete_chat(provider.as_ref(), ChatRequest::new(&[], "Hi", "", &a))
        .await
        .unwrap();
    assert!(result.is_none());
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn e2e_reply_without_marker_gets_fallback_title() {
    let transport = RecordingTransport::new(vec![Ok(reply_for(
        ProviderCategory::Gemini,
        "The Eiffel Tower (built in 1889) is 330 metres tall. It was the tallest structure.",
    ))]);
    let provider = ProviderFactory::default()
        .with_transport(transport)
        .create("gemini", "AIza", None)
        .unwrap();

    let a = assistant(ModelRef::new("gemini-2.0-flash"));
    let result = complete_chat(provider.as_ref(), ChatRequest::new(&[], "Tower?", "", &a))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(result.title, "The Eiffel Tower is 330 metres tall");
    assert!(result.content.starts_with("The Eiffel Tower (built in 1889)"));
}
