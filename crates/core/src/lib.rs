//! # Parley Core
//!
//! Domain types, traits, and error definitions for the Parley chat
//! orchestration layer. Provider implementations live in `parley-providers`;
//! this crate defines the model they implement against.
//!
//! ## Design Philosophy
//!
//! Every seam is a trait here ([`ChatProvider`], [`ChatTransport`]). This enables:
//! - Selecting backends by a closed [`ProviderCategory`]
//! - Easy testing with mock transports
//! - Clean dependency graph (all crates depend inward on core)

pub mod assistant;
pub mod category;
pub mod error;
pub mod message;
pub mod provider;
pub mod retry;

// Re-export key types at crate root for ergonomics
pub use assistant::{AssistantConfig, ModelRef, ModelSizeTier};
pub use category::{ProviderCategory, RequestShape};
pub use error::{Error, ProviderError, Result};
pub use message::{ConversationTurn, ImageAttachment, Role};
pub use provider::{ChatProvider, ChatRequest, ChatTransport, TransportRequest};
pub use retry::{Backoff, RetryPolicy};
