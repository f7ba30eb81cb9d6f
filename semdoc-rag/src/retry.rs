//! Bounded retry and concurrency for outbound provider calls.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{error, warn};

use crate::config::{RagConfig, RetryPolicy};
use crate::error::{ProviderResult, RagError, Result};

/// Shared gate in front of the embedding and generation providers.
///
/// The semaphore bounds how many provider calls are in flight across the
/// whole process. A permit covers one attempt and is released before any
/// backoff sleep. Cloning shares the same permits.
#[derive(Debug, Clone)]
pub struct ProviderGate {
    retry: RetryPolicy,
    permits: Arc<Semaphore>,
}

impl ProviderGate {
    pub fn new(retry: RetryPolicy, max_concurrent_calls: usize) -> Self {
        Self { retry, permits: Arc::new(Semaphore::new(max_concurrent_calls.max(1))) }
    }

    pub fn from_config(config: &RagConfig) -> Self {
        Self::new(config.retry.clone(), config.max_concurrent_calls)
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Run `call` until it succeeds, fails with a rejection, or the retry budget is spent.
    ///
    /// # Errors
    ///
    /// - [`RagError::ProviderRejected`] on the first non-retryable failure.
    /// - [`RagError::ProviderUnavailable`] once `max_attempts` transient failures occurred.
    pub async fn call<T, F, Fut>(&self, provider: &str, operation: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ProviderResult<T>>,
    {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = {
                let _permit = self.permits.acquire().await.map_err(|_| {
                    RagError::Internal("provider connection pool is closed".to_string())
                })?;
                call().await
            };

            let failure = match outcome {
                Ok(value) => return Ok(value),
                Err(failure) => failure,
            };

            if !failure.is_transient() {
                error!(provider, operation, attempt, error = %failure.message, "provider rejected request");
                return Err(RagError::ProviderRejected {
                    provider: provider.to_string(),
                    message: failure.message,
                });
            }

            if attempt >= max_attempts {
                error!(provider, operation, attempt, error = %failure.message, "provider unavailable, retries exhausted");
                return Err(RagError::ProviderUnavailable {
                    provider: provider.to_string(),
                    message: format!("{} (after {attempt} attempts)", failure.message),
                });
            }

            let delay = self.retry.backoff(attempt);
            warn!(
                provider,
                operation,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %failure.message,
                "transient provider failure, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}
