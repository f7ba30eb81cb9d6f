//! Embedding provider trait and the retrying [`EmbeddingClient`] in front of it.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{ProviderResult, RagError, Result};
use crate::retry::ProviderGate;

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap specific embedding backends behind a unified async
/// interface and classify every failure as transient or rejected. The
/// default [`embed_batch`](EmbeddingProvider::embed_batch) implementation
/// calls [`embed`](EmbeddingProvider::embed) sequentially; backends that
/// support native batching should override it.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> ProviderResult<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs, in input order.
    async fn embed_batch(&self, texts: &[&str]) -> ProviderResult<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;
}

/// Validates input, applies the retry policy and checks provider output.
///
/// Stateless apart from the shared [`ProviderGate`]; clone it freely.
#[derive(Clone)]
pub struct EmbeddingClient {
    provider: Arc<dyn EmbeddingProvider>,
    gate: ProviderGate,
}

impl EmbeddingClient {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, gate: ProviderGate) -> Self {
        Self { provider, gate }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn dimensions(&self) -> usize {
        self.provider.dimensions()
    }

    /// Embed one text.
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidInput`] if `text` is empty after trimming.
    /// - [`RagError::ProviderUnavailable`] / [`RagError::ProviderRejected`] from the provider.
    /// - [`RagError::Internal`] if the provider returns an empty vector.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        validate_text(text)?;
        let provider = self.provider.as_ref();
        debug!(provider = provider.name(), text_len = text.len(), "embedding text");

        let vector = self.gate.call(provider.name(), "embed", move || provider.embed(text)).await?;
        if vector.is_empty() {
            return Err(RagError::Internal(format!(
                "embedding provider '{}' returned an empty vector",
                provider.name()
            )));
        }
        Ok(vector)
    }

    /// Embed several texts. Equivalent to calling [`embed`](Self::embed) on each, in order.
    ///
    /// Every text is validated before any provider call is made.
    pub async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        for text in texts {
            validate_text(text)?;
        }
        let provider = self.provider.as_ref();
        debug!(provider = provider.name(), batch_size = texts.len(), "embedding batch");

        let vectors =
            self.gate.call(provider.name(), "embed_batch", move || provider.embed_batch(texts)).await?;
        if vectors.len() != texts.len() {
            return Err(RagError::Internal(format!(
                "embedding provider '{}' returned {} vectors for {} inputs",
                provider.name(),
                vectors.len(),
                texts.len()
            )));
        }
        if vectors.iter().any(Vec::is_empty) {
            return Err(RagError::Internal(format!(
                "embedding provider '{}' returned an empty vector",
                provider.name()
            )));
        }
        Ok(vectors)
    }
}

fn validate_text(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(RagError::InvalidInput("text to embed must not be empty".to_string()));
    }
    Ok(())
}
