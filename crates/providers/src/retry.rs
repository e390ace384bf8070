//! Retry executor: bounded re-attempts of one backend call.
//!
//! Every provider routes its network call through [`RetryExecutor::run`]. On
//! failure it waits according to the category's [`RetryPolicy`] and tries
//! again; once attempts are exhausted the last error is returned as-is.

use parley_core::{ProviderError, RetryPolicy};
use std::future::Future;
use tracing::{info, warn};

/// Applies a [`RetryPolicy`] to a fallible async operation.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    label: String,
    policy: RetryPolicy,
}

impl RetryExecutor {
    /// `label` names the provider in log lines.
    pub fn new(label: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            label: label.into(),
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `op` until it succeeds or `max_attempts` calls have failed.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(provider = %self.label, attempt, "Request succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if attempt < max_attempts => {
                    let delay = self.policy.delay_for(attempt, &e);
                    warn!(
                        provider = %self.label,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(
                        provider = %self.label,
                        attempts = attempt,
                        error = %e,
                        "Request failed, giving up"
                    );
                    return Err(e);
                }
            }
        }
    }
}
