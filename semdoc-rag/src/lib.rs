//! # semdoc-rag
//!
//! Store free-text documents, retrieve them by meaning, and answer questions
//! from the best matches.
//!
//! The crate is organised around two pipelines that share an
//! [`EmbeddingClient`] and a [`VectorIndex`]:
//!
//! - **Ingestion**: [`DocumentStore`] validates documents, embeds them and
//!   keeps the vector index in step with every create, update and delete.
//! - **Question answering**: [`RetrievalEngine`] embeds the question, queries
//!   the index and applies the relevance threshold; [`AnswerSynthesizer`]
//!   packs the ranked matches into a bounded prompt and calls the generation
//!   model.
//!
//! [`SemdocPipeline`] wires both together from an [`EmbeddingProvider`], a
//! [`GenerationProvider`] and a [`VectorIndexProvider`].
//!
//! ## Features
//!
//! | Feature | Provides |
//! |---------|----------|
//! | `openai` | [`openai::OpenAIClient`] for embeddings and chat completions |
//! | `qdrant` | [`qdrant::QdrantVectorIndex`] |
//! | `full` | everything above |
//!
//! The in-memory index, the in-memory document repository and the
//! deterministic [`mock`] providers are always available.

pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod inmemory;
pub mod mock;
pub mod pipeline;
pub mod repository;
pub mod retrieval;
pub mod retry;
pub mod store;
pub mod synthesis;
pub mod vectorstore;

#[cfg(feature = "openai")]
pub mod openai;

#[cfg(feature = "qdrant")]
pub mod qdrant;

pub use config::{RagConfig, RagConfigBuilder, RetryPolicy};
pub use document::{
    Answer, Document, IndexEntry, Metadata, MetadataFilter, MetadataValue, Page, PageRequest,
    Query, RetrievedMatch, UpdateDocument, metadata_from_json,
};
pub use embedding::{EmbeddingClient, EmbeddingProvider};
pub use error::{FailureKind, ProviderFailure, ProviderResult, RagError, Result};
pub use generation::GenerationProvider;
pub use inmemory::InMemoryVectorIndex;
pub use pipeline::{SearchOutcome, SemdocPipeline, SemdocPipelineBuilder};
pub use repository::{DocumentRepository, InMemoryDocumentRepository};
pub use retrieval::RetrievalEngine;
pub use retry::ProviderGate;
pub use store::DocumentStore;
pub use synthesis::AnswerSynthesizer;
pub use vectorstore::{VectorIndex, VectorIndexProvider};
