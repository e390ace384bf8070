//! Prompt composition: system prompt fragments and the augmented user message.

use parley_core::{AssistantConfig, ChatRequest};

/// Opening delimiter wrapped around retrieved text in the user message.
pub const FETCHED_START: &str = "fetchedStart";
/// Closing delimiter wrapped around retrieved text in the user message.
pub const FETCHED_END: &str = "fetchedEnd";

const REASONING_FRAGMENT: &str = "When a question is difficult, decompose it and work through it \
step by step before giving your final answer.";

const TITLE_FRAGMENT: &str = "Terminate every reply with a short subject title for the \
conversation, on its own line, wrapped in triple curly braces like {{{Subject Title}}}. \
Do not use triple curly braces anywhere else in the reply.";

const RETRIEVAL_FRAGMENT: &str = "Some user messages include reference material retrieved \
from the user's documents, enclosed between triple single quotes ('''). Use that material \
only when it is relevant to the question; otherwise answer from your own knowledge. Never \
mention, quote or reveal the delimiter markers around the material.";

/// The system prompt and user message sent for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedPrompt {
    pub system: String,
    pub user_message: String,
}

/// Compose both halves of the prompt for a request.
pub fn compose(request: &ChatRequest<'_>) -> ComposedPrompt {
    ComposedPrompt {
        system: system_prompt(request.assistant, request.has_retrieval()),
        user_message: augment_user_message(
            request.message,
            request.retrieved_text,
            &request.assistant.base_prompt,
        ),
    }
}

fn persona_fragment(assistant: &AssistantConfig) -> String {
    let mut persona = format!("You are {}.", assistant.name);
    if !assistant.role.trim().is_empty() {
        persona.push_str(&format!(" Your role: {}.", assistant.role.trim()));
    }
    if assistant.model.supports_vision {
        persona.push_str(
            " You can see images the user attaches to their message; describe and reason \
about them directly when they are relevant.",
        );
    } else {
        persona.push_str(
            " You work with text only. If the user refers to an image, explain that you \
cannot view it and answer from the text you have.",
        );
    }
    persona
}

/// Build the system prompt from its fragments, in order: persona, retrieval
/// handling (only with retrieved text), reasoning strategy, title tag.
pub fn system_prompt(assistant: &AssistantConfig, has_retrieval: bool) -> String {
    let mut fragments = vec![persona_fragment(assistant)];
    if has_retrieval {
        fragments.push(RETRIEVAL_FRAGMENT.to_string());
    }
    fragments.push(REASONING_FRAGMENT.to_string());
    fragments.push(TITLE_FRAGMENT.to_string());
    fragments.join("\n\n")
}

/// Append retrieved text (between the fetch delimiters) and the assistant's
/// base prompt to the user's message.
///
/// Delimiter literals are removed from all three inputs, so the result holds
/// each delimiter exactly once with retrieved text and neither without.
pub fn augment_user_message(message: &str, retrieved_text: &str, base_prompt: &str) -> String {
    let message = strip_delimiters(message);
    let base_prompt = strip_delimiters(base_prompt);
    if retrieved_text.trim().is_empty() {
        return format!("{message}\n{base_prompt}");
    }
    let retrieved = strip_delimiters(retrieved_text);
    format!("{message}\n'''{FETCHED_START} {retrieved} {FETCHED_END}'''\n{base_prompt}")
}

fn strip_delimiters(text: &str) -> String {
    let mut out = text.to_string();
    // removing one literal can splice another together, so repeat until clean
    while out.contains(FETCHED_START) || out.contains(FETCHED_END) {
        out = out.replace(FETCHED_START, "").replace(FETCHED_END, "");
    }
    out
}
