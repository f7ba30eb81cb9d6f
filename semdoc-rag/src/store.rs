//! The document store: CRUD over documents, keeping the vector index in sync.
//!
//! Every mutation finishes its index write before it returns, so a caller
//! that saw `Ok` will find the entry's vector equal to the embedding of the
//! document's current content. Ordering per operation:
//!
//! - create: embed → upsert entry → write record
//! - update: embed (only if content changed) → upsert entry → write record
//! - delete: delete entry → remove record
//!
//! The store is the only writer of the [`VectorIndex`].

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::document::{
    Document, IndexEntry, Metadata, Page, PageRequest, UpdateDocument, validate_metadata,
};
use crate::embedding::EmbeddingClient;
use crate::error::{RagError, Result};
use crate::repository::DocumentRepository;
use crate::vectorstore::{VectorIndex, validate_page};

/// Authoritative CRUD layer over [`Document`]s.
#[derive(Clone)]
pub struct DocumentStore {
    embeddings: EmbeddingClient,
    index: VectorIndex,
    repository: Arc<dyn DocumentRepository>,
    max_page_size: usize,
}

impl DocumentStore {
    pub fn new(
        embeddings: EmbeddingClient,
        index: VectorIndex,
        repository: Arc<dyn DocumentRepository>,
        max_page_size: usize,
    ) -> Self {
        Self { embeddings, index, repository, max_page_size }
    }

    /// Create a document from `content` and `metadata`.
    ///
    /// Nothing is written unless embedding succeeds. If the record write
    /// fails after the index upsert, the entry is deleted again before the
    /// error is returned.
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidInput`] for blank content or invalid metadata.
    /// - Embedding errors from the [`EmbeddingClient`].
    /// - [`RagError::IndexUnavailable`] if the upsert fails.
    pub async fn create(&self, content: impl Into<String>, metadata: Metadata) -> Result<Document> {
        let content = content.into();
        validate_content(&content)?;
        validate_metadata(&metadata)?;

        let embedding = self.embeddings.embed(&content).await.map_err(|e| {
            error!(error = %e, "embedding failed during create");
            e
        })?;

        let now = Utc::now();
        let document = Document {
            id: Uuid::new_v4().to_string(),
            content,
            metadata,
            embedding,
            created_at: now,
            updated_at: now,
        };

        self.index.upsert(index_entry(&document)).await.map_err(|e| {
            error!(document.id = %document.id, error = %e, "upsert failed during create");
            e
        })?;

        if let Err(e) = self.repository.put(document.clone()).await {
            error!(document.id = %document.id, error = %e, "record write failed, removing index entry");
            if let Err(cleanup) = self.index.delete(&document.id).await {
                warn!(document.id = %document.id, error = %cleanup, "failed to remove orphaned index entry");
            }
            return Err(e);
        }

        info!(document.id = %document.id, content_len = document.content.len(), "created document");
        Ok(document)
    }

    /// Apply `changes` to an existing document.
    ///
    /// The embedding is recomputed only when the content actually changes;
    /// a metadata-only update re-upserts the stored vector with the new metadata.
    ///
    /// # Errors
    ///
    /// - [`RagError::NotFound`] if `id` is unknown.
    /// - [`RagError::InvalidInput`] if `changes` is empty or invalid.
    pub async fn update(&self, id: &str, changes: UpdateDocument) -> Result<Document> {
        if changes.content.is_none() && changes.metadata.is_none() {
            return Err(RagError::InvalidInput(
                "update requires new content, new metadata, or both".to_string(),
            ));
        }
        if let Some(content) = &changes.content {
            validate_content(content)?;
        }
        if let Some(metadata) = &changes.metadata {
            validate_metadata(metadata)?;
        }

        let previous = self.get(id).await?;
        let mut document = previous.clone();

        let mut reembedded = false;
        if let Some(content) = changes.content {
            if content != document.content || document.embedding.is_empty() {
                document.embedding = self.embeddings.embed(&content).await.map_err(|e| {
                    error!(document.id = id, error = %e, "embedding failed during update");
                    e
                })?;
                document.content = content;
                reembedded = true;
            }
        }
        if let Some(metadata) = changes.metadata {
            document.metadata = metadata;
        }
        document.updated_at = Utc::now();

        self.index.upsert(index_entry(&document)).await.map_err(|e| {
            error!(document.id = id, error = %e, "upsert failed during update");
            e
        })?;

        if let Err(e) = self.repository.put(document.clone()).await {
            error!(document.id = id, error = %e, "record write failed, restoring index entry");
            if let Err(restore) = self.index.upsert(index_entry(&previous)).await {
                warn!(document.id = id, error = %restore, "failed to restore index entry");
            }
            return Err(e);
        }

        info!(document.id = id, reembedded, "updated document");
        Ok(document)
    }

    /// Delete a document and its index entry.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::NotFound`] if `id` is unknown.
    pub async fn delete(&self, id: &str) -> Result<()> {
        if self.repository.get(id).await?.is_none() {
            return Err(RagError::NotFound(id.to_string()));
        }

        self.index.delete(id).await.map_err(|e| {
            error!(document.id = id, error = %e, "index delete failed");
            e
        })?;
        self.repository.remove(id).await?;

        info!(document.id = id, "deleted document");
        Ok(())
    }

    /// Fetch a document.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::NotFound`] if `id` is unknown.
    pub async fn get(&self, id: &str) -> Result<Document> {
        self.repository.get(id).await?.ok_or_else(|| RagError::NotFound(id.to_string()))
    }

    /// List documents by id ascending.
    pub async fn list(&self, page: &PageRequest) -> Result<Page<Document>> {
        validate_page(page, self.max_page_size)?;
        self.repository.list(page).await
    }
}

fn validate_content(content: &str) -> Result<()> {
    if content.trim().is_empty() {
        return Err(RagError::InvalidInput("document content must not be empty".to_string()));
    }
    Ok(())
}

fn index_entry(document: &Document) -> IndexEntry {
    IndexEntry {
        id: document.id.clone(),
        vector: document.embedding.clone(),
        content: document.content.clone(),
        metadata: document.metadata.clone(),
    }
}
