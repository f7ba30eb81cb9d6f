//! Pipeline composition root.
//!
//! The [`SemdocPipeline`] wires one [`EmbeddingClient`] and one
//! [`VectorIndex`] into both the ingestion side ([`DocumentStore`]) and the
//! QA side ([`RetrievalEngine`] + [`AnswerSynthesizer`]). The two sides share
//! nothing else; they see each other's writes only through the index.
//!
//! # Example
//!
//! ```rust,ignore
//! use semdoc_rag::{InMemoryVectorIndex, Query, RagConfig, SemdocPipeline};
//!
//! let pipeline = SemdocPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(my_embedder))
//!     .generation_provider(Arc::new(my_llm))
//!     .vector_index(Arc::new(InMemoryVectorIndex::new()))
//!     .build()?;
//!
//! pipeline.documents().create("Paris is the capital of France", Metadata::new()).await?;
//! let outcome = pipeline.search(&Query::new("What is the capital of France?")).await?;
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::RagConfig;
use crate::document::{Answer, Query, RetrievedMatch};
use crate::embedding::{EmbeddingClient, EmbeddingProvider};
use crate::error::{RagError, Result};
use crate::generation::GenerationProvider;
use crate::repository::{DocumentRepository, InMemoryDocumentRepository};
use crate::retrieval::RetrievalEngine;
use crate::retry::ProviderGate;
use crate::store::DocumentStore;
use crate::synthesis::AnswerSynthesizer;
use crate::vectorstore::{VectorIndex, VectorIndexProvider};

/// An answer plus the matches it was built from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchOutcome {
    pub answer: Answer,
    pub matches: Vec<RetrievedMatch>,
}

/// The assembled ingestion and QA pipelines. Cheap to clone.
#[derive(Clone)]
pub struct SemdocPipeline {
    config: Arc<RagConfig>,
    index: VectorIndex,
    documents: DocumentStore,
    retrieval: RetrievalEngine,
    synthesizer: AnswerSynthesizer,
}

impl SemdocPipeline {
    /// Create a new [`SemdocPipelineBuilder`].
    pub fn builder() -> SemdocPipelineBuilder {
        SemdocPipelineBuilder::default()
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// The ingestion side.
    pub fn documents(&self) -> &DocumentStore {
        &self.documents
    }

    /// Read access to the shared vector index.
    pub fn vector_index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn retrieval(&self) -> &RetrievalEngine {
        &self.retrieval
    }

    pub fn synthesizer(&self) -> &AnswerSynthesizer {
        &self.synthesizer
    }

    /// Retrieve matches for `query` and synthesize an answer from them.
    ///
    /// Provider and index errors are returned as errors; the canned answer is
    /// only produced when retrieval legitimately comes back empty.
    pub async fn search(&self, query: &Query) -> Result<SearchOutcome> {
        let matches = self.retrieval.retrieve(query).await?;
        let answer = self.synthesizer.answer(&query.question, &matches).await?;
        info!(match_count = matches.len(), source_count = answer.sources.len(), "search completed");
        Ok(SearchOutcome { answer, matches })
    }
}

/// Builder for constructing a [`SemdocPipeline`].
///
/// All providers are required; the document repository defaults to
/// [`InMemoryDocumentRepository`] and the config to [`RagConfig::default`].
#[derive(Default)]
pub struct SemdocPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    generation_provider: Option<Arc<dyn GenerationProvider>>,
    vector_index: Option<Arc<dyn VectorIndexProvider>>,
    repository: Option<Arc<dyn DocumentRepository>>,
}

impl SemdocPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the generation model.
    pub fn generation_provider(mut self, provider: Arc<dyn GenerationProvider>) -> Self {
        self.generation_provider = Some(provider);
        self
    }

    /// Set the vector index backend.
    pub fn vector_index(mut self, index: Arc<dyn VectorIndexProvider>) -> Self {
        self.vector_index = Some(index);
        self
    }

    /// Set where document records are kept.
    pub fn repository(mut self, repository: Arc<dyn DocumentRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Build the [`SemdocPipeline`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if a provider is missing.
    pub fn build(self) -> Result<SemdocPipeline> {
        let config = self.config.unwrap_or_default();
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::Config("embedding_provider is required".to_string()))?;
        let generation_provider = self
            .generation_provider
            .ok_or_else(|| RagError::Config("generation_provider is required".to_string()))?;
        let vector_index = self
            .vector_index
            .ok_or_else(|| RagError::Config("vector_index is required".to_string()))?;
        let repository = self.repository.unwrap_or_else(|| {
            Arc::new(InMemoryDocumentRepository::new()) as Arc<dyn DocumentRepository>
        });

        let gate = ProviderGate::from_config(&config);
        let embeddings = EmbeddingClient::new(embedding_provider, gate.clone());
        let index = VectorIndex::new(vector_index, config.max_page_size);

        let documents =
            DocumentStore::new(embeddings.clone(), index.clone(), repository, config.max_page_size);
        let retrieval = RetrievalEngine::new(embeddings, index.clone(), &config);
        let synthesizer = AnswerSynthesizer::new(generation_provider, gate, &config);

        Ok(SemdocPipeline { config: Arc::new(config), index, documents, retrieval, synthesizer })
    }
}
