//! Error types for the Parley orchestration layer.
//!
//! Uses `thiserror` for ergonomic error definitions. The top-level [`Error`]
//! separates user-input failures (never retried) from application failures
//! (construction-time surprises) and backend failures ([`ProviderError`]).

use thiserror::Error;

/// The top-level error type for all Parley operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- User-input errors ---
    #[error("Unsupported provider category: {category}")]
    UnsupportedCategory { category: String },

    #[error("Provider category '{category}' requires a base URL")]
    MissingBaseUrl { category: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // --- Application errors ---
    #[error("Application error: {message}")]
    Application { message: String },

    // --- Backend errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

impl Error {
    /// Wrap an unexpected failure, keeping its message.
    pub fn application(source: impl std::fmt::Display) -> Self {
        Self::Application {
            message: source.to_string(),
        }
    }

    /// Whether this error was caused by caller-supplied input.
    pub fn is_user_input(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedCategory { .. } | Self::MissingBaseUrl { .. } | Self::InvalidInput(_)
        )
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures reported by (or while talking to) a backend.
///
/// These flow through the retry executor unchanged: after the last attempt the
/// original value is handed back to the caller.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response from provider: {0}")]
    InvalidResponse(String),

    #[error("Provider returned no completion: {0}")]
    EmptyCompletion(String),
}

impl ProviderError {
    /// Minimum wait the backend asked for before the next attempt, if any.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        }
    }
}
