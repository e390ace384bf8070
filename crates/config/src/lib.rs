//! Configuration loading, validation, and management for Parley.
//!
//! Loads configuration from `~/.parley/config.toml` with environment
//! variable overrides. Validates all settings at load time.

use parley_core::{Backoff, ProviderCategory, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.parley/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Tokens kept free for the model's reply when windowing history
    #[serde(default = "default_reserved_output_tokens")]
    pub reserved_output_tokens: u32,

    /// Per-request HTTP timeout
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Per-category settings, keyed by category name (e.g. "openai", "self_hosted_small")
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_reserved_output_tokens() -> u32 {
    4000
}
fn default_request_timeout_secs() -> u64 {
    120
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Endpoint override (required for self-hosted categories)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Context window assumed for models that declare none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_context_window: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("default_context_window", &self.default_context_window)
            .field("retry", &self.retry)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    Fixed,
    Linear,
    Exponential,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,

    #[serde(default = "default_backoff_kind")]
    pub backoff: BackoffKind,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_backoff_kind() -> BackoffKind {
    BackoffKind::Exponential
}
fn default_initial_delay_ms() -> u64 {
    1_000
}
fn default_max_delay_ms() -> u64 {
    30_000
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        let initial = Duration::from_millis(self.initial_delay_ms);
        let backoff = match self.backoff {
            BackoffKind::Fixed => Backoff::Fixed(initial),
            BackoffKind::Linear => Backoff::Linear(initial),
            BackoffKind::Exponential => Backoff::Exponential {
                initial,
                multiplier: 2,
                max: Duration::from_millis(self.max_delay_ms),
            },
        };
        RetryPolicy::new(self.max_attempts, backoff)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.parley/config.toml).
    ///
    /// Environment variables override the file:
    /// - `PARLEY_<CATEGORY>_API_KEY` (e.g. `PARLEY_OPENAI_API_KEY`)
    /// - `PARLEY_<CATEGORY>_BASE_URL` (e.g. `PARLEY_SELF_HOSTED_LARGE_BASE_URL`)
    /// - `PARLEY_LOG`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.canonicalize_provider_keys()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in `load`).
    ///
    /// Blank values count as unset.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        for category in ProviderCategory::ALL {
            let prefix = format!("PARLEY_{}", category.as_str().to_ascii_uppercase());
            let key = lookup(&format!("{prefix}_API_KEY"));
            let url = lookup(&format!("{prefix}_BASE_URL"));
            if key.is_none() && url.is_none() {
                continue;
            }
            let entry = self.providers.entry(category.as_str().to_string()).or_default();
            if key.is_some() {
                entry.api_key = key;
            }
            if url.is_some() {
                entry.base_url = url;
            }
        }

        if let Some(level) = lookup("PARLEY_LOG") {
            self.logging.level = level;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".parley")
    }

    /// Settings for one category, if configured.
    pub fn provider(&self, category: ProviderCategory) -> Option<&ProviderConfig> {
        self.providers.get(category.as_str())
    }

    /// Retry policy for a category: configured override, else the category default.
    pub fn retry_policy(&self, category: ProviderCategory) -> RetryPolicy {
        self.provider(category)
            .and_then(|p| p.retry.as_ref())
            .map(RetryConfig::to_policy)
            .unwrap_or_else(|| category.default_retry_policy())
    }

    /// Context window assumed for models that declare none.
    pub fn default_context_window(&self, category: ProviderCategory) -> u32 {
        self.provider(category)
            .and_then(|p| p.default_context_window)
            .unwrap_or_else(|| category.default_context_window())
    }

    /// Configured base URL override for a category. Blank values count as unset.
    pub fn base_url(&self, category: ProviderCategory) -> Option<&str> {
        self.provider(category)
            .and_then(|p| p.base_url.as_deref())
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Re-key `providers` by canonical category name, so `[providers.claude]`
    /// lands under `anthropic`. Two keys naming the same category are rejected.
    fn canonicalize_provider_keys(&mut self) -> Result<(), ConfigError> {
        let mut canonical = HashMap::with_capacity(self.providers.len());
        for (name, provider) in std::mem::take(&mut self.providers) {
            let category: ProviderCategory = name.parse().map_err(|_| {
                ConfigError::ValidationError(format!("unknown provider category '{name}'"))
            })?;
            if canonical
                .insert(category.as_str().to_string(), provider)
                .is_some()
            {
                return Err(ConfigError::ValidationError(format!(
                    "providers.{name} configures '{category}' a second time"
                )));
            }
        }
        self.providers = canonical;
        Ok(())
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "request_timeout_secs must be > 0".into(),
            ));
        }

        for (name, provider) in &self.providers {
            match name.parse::<ProviderCategory>() {
                Ok(category) if category.as_str() == name => {}
                Ok(category) => {
                    return Err(ConfigError::ValidationError(format!(
                        "providers.{name} must be keyed by its canonical name '{category}'"
                    )));
                }
                Err(_) => {
                    return Err(ConfigError::ValidationError(format!(
                        "unknown provider category '{name}'"
                    )));
                }
            }
            if let Some(retry) = &provider.retry {
                if retry.max_attempts == 0 {
                    return Err(ConfigError::ValidationError(format!(
                        "providers.{name}.retry.max_attempts must be >= 1"
                    )));
                }
                if retry.max_delay_ms < retry.initial_delay_ms {
                    return Err(ConfigError::ValidationError(format!(
                        "providers.{name}.retry.max_delay_ms must be >= initial_delay_ms"
                    )));
                }
            }
            if provider.default_context_window == Some(0) {
                return Err(ConfigError::ValidationError(format!(
                    "providers.{name}.default_context_window must be > 0"
                )));
            }
        }

        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            reserved_output_tokens: default_reserved_output_tokens(),
            request_timeout_secs: default_request_timeout_secs(),
            providers: HashMap::new(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Install a global `tracing` subscriber for a host application.
///
/// `RUST_LOG` wins over `logging.level`. Returns an error if a subscriber is
/// already installed.
pub fn init_tracing(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let result = if logging.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| ConfigError::ValidationError(format!("tracing already initialized: {e}")))
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
