//! Token estimation utilities.
//!
//! Uses a character-based heuristic: ~4 characters per token, plus a fixed
//! per-message overhead for role names and delimiters in the wire format.

use parley_core::Role;

/// A token-cost function over one message.
pub trait TokenCounter: Send + Sync {
    fn count(&self, role: Role, text: &str) -> usize;
}

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 characters. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    text.len().div_ceil(4)
}

/// The default counter: [`estimate_tokens`] plus 4 tokens of overhead per message.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicCounter;

const MESSAGE_OVERHEAD: usize = 4;

impl TokenCounter for HeuristicCounter {
    fn count(&self, _role: Role, text: &str) -> usize {
        MESSAGE_OVERHEAD + estimate_tokens(text)
    }
}
