//! History windowing: fit the newest part of a conversation into a token budget.
//!
//! The window is always a contiguous suffix of the turn log. The most recent
//! turn is kept even when it alone exceeds the budget; an oversized request is
//! left for the backend to reject rather than silently losing context.

use parley_core::{ConversationTurn, Role};
use tracing::debug;

use crate::token::TokenCounter;

/// Tokens left for history once the fixed parts of the request are paid for.
///
/// `fixed_cost` covers the system prompt, the current message and any
/// retrieved text. Saturates at zero.
pub fn history_budget(context_window: u32, reserved_output: u32, fixed_cost: usize) -> usize {
    (context_window as usize)
        .saturating_sub(fixed_cost)
        .saturating_sub(reserved_output as usize)
}

/// Cost of one turn: its user entry plus its assistant entry.
pub fn turn_cost(counter: &dyn TokenCounter, turn: &ConversationTurn) -> usize {
    counter.count(Role::User, &turn.user_text) + counter.count(Role::Assistant, &turn.assistant_text)
}

/// Select the newest turns that fit `budget`, in chronological order.
///
/// Walks from the most recent turn backwards and stops at the first turn that
/// no longer fits, so the result never has gaps.
pub fn select<'a>(
    turns: &'a [ConversationTurn],
    counter: &dyn TokenCounter,
    budget: usize,
) -> &'a [ConversationTurn] {
    let mut remaining = budget;
    let mut taken = 0;

    for (i, turn) in turns.iter().rev().enumerate() {
        let cost = turn_cost(counter, turn);
        if i == 0 {
            // the newest turn is mandatory
            taken = 1;
            remaining = remaining.saturating_sub(cost);
            continue;
        }
        if cost > remaining {
            break;
        }
        remaining -= cost;
        taken += 1;
    }

    if taken < turns.len() {
        debug!(
            kept = taken,
            dropped = turns.len() - taken,
            budget,
            "History window truncated"
        );
    }

    &turns[turns.len() - taken..]
}

/// Role-interleaved shape: a user entry and an assistant entry per turn.
/// Empty texts are skipped.
pub fn role_interleaved(turns: &[ConversationTurn]) -> Vec<(Role, &str)> {
    let mut entries = Vec::with_capacity(turns.len() * 2);
    for turn in turns {
        if !turn.user_text.is_empty() {
            entries.push((Role::User, turn.user_text.as_str()));
        }
        if !turn.assistant_text.is_empty() {
            entries.push((Role::Assistant, turn.assistant_text.as_str()));
        }
    }
    entries
}

/// Turn-keyed shape: one `(user, assistant)` pair per turn.
pub fn turn_pairs(turns: &[ConversationTurn]) -> Vec<(&str, &str)> {
    turns
        .iter()
        .map(|t| (t.user_text.as_str(), t.assistant_text.as_str()))
        .collect()
}

/// History plus the current user message, with roles strictly alternating.
#[derive(Debug, PartialEq)]
pub struct Alternating {
    /// Starts with a user entry and ends with an assistant entry.
    pub history: Vec<(Role, String)>,
    /// The current message, with any unanswered user text folded in front.
    pub current: String,
}

/// Build a strictly alternating history from turn pairs, for backends that
/// reject two consecutive entries with the same role.
///
/// Empty sides are skipped and adjacent same-role texts are joined with a blank
/// line. An assistant reply with no user entry before it is dropped. A trailing
/// unanswered user text is merged into `current`.
pub fn alternating(turns: &[ConversationTurn], current: String) -> Alternating {
    let mut history: Vec<(Role, String)> = Vec::with_capacity(turns.len() * 2);

    for (user, assistant) in turn_pairs(turns) {
        for (role, text) in [(Role::User, user), (Role::Assistant, assistant)] {
            if text.trim().is_empty() {
                continue;
            }
            let last_role = history.last().map(|(last, _)| *last);
            if last_role == Some(role) {
                if let Some((_, joined)) = history.last_mut() {
                    joined.push_str("\n\n");
                    joined.push_str(text);
                }
            } else if last_role.is_none() && role == Role::Assistant {
                debug!("Dropping assistant reply with no preceding user entry");
            } else {
                history.push((role, text.to_string()));
            }
        }
    }

    let current = match history.pop_if(|(role, _)| *role == Role::User) {
        Some((_, pending)) => format!("{pending}\n\n{current}"),
        None => current,
    };

    Alternating { history, current }
}
