//! Deterministic providers for tests, demos and offline runs.
//!
//! - [`KeywordEmbedder`] - bag-of-words embeddings over a fixed vocabulary
//! - [`MockGenerator`] - canned generation with a call counter
//!
//! Both can be primed with a queue of [`ProviderFailure`]s that are returned,
//! one per call, before normal behaviour resumes.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::embedding::EmbeddingProvider;
use crate::error::{ProviderFailure, ProviderResult};
use crate::generation::GenerationProvider;

fn next_failure(queue: &Mutex<VecDeque<ProviderFailure>>) -> Option<ProviderFailure> {
    queue.lock().map(|mut q| q.pop_front()).unwrap_or_default()
}

/// Embeds text as word counts over a fixed vocabulary.
///
/// Each vocabulary word is one dimension; words outside the vocabulary are
/// ignored. Texts sharing vocabulary words get a positive cosine similarity,
/// texts sharing none score zero.
#[derive(Debug)]
pub struct KeywordEmbedder {
    vocabulary: Vec<String>,
    calls: AtomicUsize,
    failures: Mutex<VecDeque<ProviderFailure>>,
}

impl KeywordEmbedder {
    pub fn new<I, S>(vocabulary: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            vocabulary: vocabulary.into_iter().map(|w| w.into().to_lowercase()).collect(),
            calls: AtomicUsize::new(0),
            failures: Mutex::new(VecDeque::new()),
        }
    }

    /// Return these failures from the next calls, in order.
    pub fn with_failures(self, failures: impl IntoIterator<Item = ProviderFailure>) -> Self {
        if let Ok(mut queue) = self.failures.lock() {
            queue.extend(failures);
        }
        self
    }

    /// Number of provider calls made so far, including failed ones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The embedding this provider produces for `text`, without counting a call.
    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; self.vocabulary.len()];
        for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            let word = word.to_lowercase();
            if let Some(position) = self.vocabulary.iter().position(|v| *v == word) {
                vector[position] += 1.0;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn name(&self) -> &str {
        "keyword-mock"
    }

    async fn embed(&self, text: &str) -> ProviderResult<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = next_failure(&self.failures) {
            return Err(failure);
        }
        Ok(self.vector_for(text))
    }

    fn dimensions(&self) -> usize {
        self.vocabulary.len()
    }
}

/// A generation model that returns a fixed reply and records its prompts.
#[derive(Debug)]
pub struct MockGenerator {
    reply: String,
    calls: AtomicUsize,
    failures: Mutex<VecDeque<ProviderFailure>>,
    last_prompt: Mutex<Option<String>>,
}

impl MockGenerator {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            calls: AtomicUsize::new(0),
            failures: Mutex::new(VecDeque::new()),
            last_prompt: Mutex::new(None),
        }
    }

    /// Return these failures from the next calls, in order.
    pub fn with_failures(self, failures: impl IntoIterator<Item = ProviderFailure>) -> Self {
        if let Ok(mut queue) = self.failures.lock() {
            queue.extend(failures);
        }
        self
    }

    /// Number of generate calls made so far, including failed ones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The prompt passed to the most recent call.
    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().ok().and_then(|p| p.clone())
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new("Based on the provided context [1].")
    }
}

#[async_trait]
impl GenerationProvider for MockGenerator {
    fn name(&self) -> &str {
        "mock-generator"
    }

    async fn generate(&self, prompt: &str) -> ProviderResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_prompt.lock() {
            *last = Some(prompt.to_string());
        }
        if let Some(failure) = next_failure(&self.failures) {
            return Err(failure);
        }
        Ok(self.reply.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_vectors_count_vocabulary_words() {
        let embedder = KeywordEmbedder::new(["paris", "france", "capital"]);
        assert_eq!(embedder.vector_for("Paris, France: the capital of France!"), [1.0, 2.0, 1.0]);
        assert_eq!(embedder.vector_for("nothing relevant"), [0.0, 0.0, 0.0]);
    }

    #[tokio::test]
    async fn primed_failures_come_first() {
        let embedder = KeywordEmbedder::new(["a"]).with_failures([ProviderFailure::transient("x")]);
        assert!(embedder.embed("a").await.is_err());
        assert_eq!(embedder.embed("a").await.unwrap(), [1.0]);
        assert_eq!(embedder.calls(), 2);
    }
}
