//! Generation model trait used by the answer synthesizer.

use async_trait::async_trait;

use crate::error::ProviderResult;

/// A text generation model, usually the chat sibling of the embedding model.
///
/// Failures must be classified the same way as
/// [`EmbeddingProvider`](crate::EmbeddingProvider) failures.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Complete `prompt` and return the generated text.
    async fn generate(&self, prompt: &str) -> ProviderResult<String>;
}
