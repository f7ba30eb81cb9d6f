//! Configuration for the document store and QA pipeline.
//!
//! A [`RagConfig`] is built once at process start and handed to
//! [`SemdocPipeline`](crate::SemdocPipeline); components keep their own copy
//! of the values they need.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Answer returned when retrieval finds nothing above the threshold.
pub const DEFAULT_INSUFFICIENT_CONTEXT_ANSWER: &str =
    "I don't have enough information in the stored documents to answer that question.";

/// Bounded exponential backoff for transient provider failures.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_backoff_ms: u64,
    /// Upper bound for any single delay.
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, initial_backoff_ms: 200, max_backoff_ms: 2_000 }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self { max_attempts: 1, ..Self::default() }
    }

    /// Delay to wait after the given failed attempt (1-based): 200ms, 400ms, 800ms, ... capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self.initial_backoff_ms.saturating_mul(1u64 << exponent);
        Duration::from_millis(delay.min(self.max_backoff_ms))
    }
}

/// Tunables for retrieval, synthesis and provider access.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Number of matches requested when a query does not set `top_k`.
    pub top_k: usize,
    /// Largest `top_k` a query may request.
    pub max_top_k: usize,
    /// Minimum similarity score for a match to be used as context.
    pub similarity_threshold: f32,
    /// Maximum number of characters of document content placed in one prompt.
    pub context_budget: usize,
    /// Largest page size accepted by list operations.
    pub max_page_size: usize,
    /// Canned answer used when no document clears the threshold.
    pub insufficient_context_answer: String,
    /// Retry policy for embedding and generation calls.
    pub retry: RetryPolicy,
    /// Upper bound on concurrent outbound provider calls.
    pub max_concurrent_calls: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            max_top_k: 50,
            similarity_threshold: 0.0,
            context_budget: 4_000,
            max_page_size: 100,
            insufficient_context_answer: DEFAULT_INSUFFICIENT_CONTEXT_ANSWER.to_string(),
            retry: RetryPolicy::default(),
            max_concurrent_calls: 16,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the default number of matches per query.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the largest `top_k` a query may ask for.
    pub fn max_top_k(mut self, k: usize) -> Self {
        self.config.max_top_k = k;
        self
    }

    /// Set the minimum similarity threshold for filtering results.
    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.config.similarity_threshold = threshold;
        self
    }

    /// Set the prompt context budget in characters.
    pub fn context_budget(mut self, budget: usize) -> Self {
        self.config.context_budget = budget;
        self
    }

    pub fn max_page_size(mut self, size: usize) -> Self {
        self.config.max_page_size = size;
        self
    }

    pub fn insufficient_context_answer(mut self, answer: impl Into<String>) -> Self {
        self.config.insufficient_context_answer = answer.into();
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.config.retry = retry;
        self
    }

    pub fn max_concurrent_calls(mut self, calls: usize) -> Self {
        self.config.max_concurrent_calls = calls;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if:
    /// - `top_k == 0` or `top_k > max_top_k`
    /// - `similarity_threshold` is not finite
    /// - `context_budget`, `max_page_size`, `max_concurrent_calls` or `retry.max_attempts` is zero
    /// - `insufficient_context_answer` is blank
    pub fn build(self) -> Result<RagConfig> {
        let config = self.config;
        if config.top_k == 0 {
            return Err(RagError::Config("top_k must be greater than zero".to_string()));
        }
        if config.top_k > config.max_top_k {
            return Err(RagError::Config(format!(
                "top_k ({}) must not exceed max_top_k ({})",
                config.top_k, config.max_top_k
            )));
        }
        if !config.similarity_threshold.is_finite() {
            return Err(RagError::Config("similarity_threshold must be finite".to_string()));
        }
        if config.context_budget == 0 {
            return Err(RagError::Config("context_budget must be greater than zero".to_string()));
        }
        if config.max_page_size == 0 {
            return Err(RagError::Config("max_page_size must be greater than zero".to_string()));
        }
        if config.max_concurrent_calls == 0 {
            return Err(RagError::Config(
                "max_concurrent_calls must be greater than zero".to_string(),
            ));
        }
        if config.retry.max_attempts == 0 {
            return Err(RagError::Config("retry.max_attempts must be at least one".to_string()));
        }
        if config.insufficient_context_answer.trim().is_empty() {
            return Err(RagError::Config(
                "insufficient_context_answer must not be empty".to_string(),
            ));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RagConfig::builder().build().unwrap();
        assert_eq!(config, RagConfig::default());
        assert_eq!(config.top_k, 5);
    }

    #[test]
    fn rejects_inconsistent_values() {
        assert!(RagConfig::builder().top_k(0).build().is_err());
        assert!(RagConfig::builder().top_k(60).max_top_k(50).build().is_err());
        assert!(RagConfig::builder().similarity_threshold(f32::NAN).build().is_err());
        assert!(RagConfig::builder().context_budget(0).build().is_err());
        assert!(RagConfig::builder().max_concurrent_calls(0).build().is_err());
        assert!(RagConfig::builder().insufficient_context_answer("  ").build().is_err());
        assert!(
            RagConfig::builder()
                .retry(RetryPolicy { max_attempts: 0, ..RetryPolicy::default() })
                .build()
                .is_err()
        );
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy { max_attempts: 10, initial_backoff_ms: 100, max_backoff_ms: 500 };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
        assert_eq!(policy.backoff(4), Duration::from_millis(500));
        assert_eq!(policy.backoff(40), Duration::from_millis(500));
    }
}
