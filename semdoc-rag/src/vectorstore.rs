//! Vector index provider trait and the [`VectorIndex`] wrapper the pipeline talks to.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::document::{IndexEntry, MetadataFilter, Page, PageRequest, RetrievedMatch};
use crate::error::{RagError, Result};

/// A storage backend for `(id, vector, content, metadata)` entries with similarity search.
///
/// Implementations report connectivity problems as
/// [`RagError::IndexUnavailable`] and never retry internally.
///
/// # Example
///
/// ```rust,ignore
/// use semdoc_rag::{InMemoryVectorIndex, VectorIndexProvider};
///
/// let index = InMemoryVectorIndex::new();
/// index.upsert(entry).await?;
/// let matches = index.query(&query_embedding, 5, &MetadataFilter::new()).await?;
/// ```
#[async_trait]
pub trait VectorIndexProvider: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Insert or replace the entry with `entry.id`.
    async fn upsert(&self, entry: IndexEntry) -> Result<()>;

    /// Remove the entry for `id`. Removing a missing id is not an error.
    async fn delete(&self, id: &str) -> Result<()>;

    /// Fetch one entry.
    async fn get(&self, id: &str) -> Result<Option<IndexEntry>>;

    /// Return at most `top_k` entries satisfying `filter`, most similar first.
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<RetrievedMatch>>;

    /// Enumerate entries by id ascending.
    async fn list(&self, page: &PageRequest) -> Result<Page<IndexEntry>>;
}

/// Validating front for a [`VectorIndexProvider`].
///
/// Guarantees the ordering contract (score descending, id ascending) and the
/// `top_k` bound no matter how the backend orders its results.
#[derive(Clone)]
pub struct VectorIndex {
    provider: Arc<dyn VectorIndexProvider>,
    max_page_size: usize,
}

impl VectorIndex {
    pub fn new(provider: Arc<dyn VectorIndexProvider>, max_page_size: usize) -> Self {
        Self { provider, max_page_size }
    }

    pub fn backend_name(&self) -> &str {
        self.provider.name()
    }

    /// Insert or replace an entry. Idempotent for identical arguments.
    pub async fn upsert(&self, entry: IndexEntry) -> Result<()> {
        if entry.id.is_empty() {
            return Err(RagError::InvalidInput("index entry id must not be empty".to_string()));
        }
        if entry.vector.is_empty() {
            return Err(RagError::InvalidInput(format!(
                "index entry '{}' has an empty vector",
                entry.id
            )));
        }
        debug!(backend = self.provider.name(), entry.id = %entry.id, "upserting index entry");
        self.provider.upsert(entry).await
    }

    /// Remove an entry. Deleting an id that is not present succeeds.
    pub async fn delete(&self, id: &str) -> Result<()> {
        debug!(backend = self.provider.name(), entry.id = id, "deleting index entry");
        self.provider.delete(id).await
    }

    /// Fetch an entry.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::NotFound`] if no entry exists for `id`.
    pub async fn get(&self, id: &str) -> Result<IndexEntry> {
        self.provider.get(id).await?.ok_or_else(|| RagError::NotFound(id.to_string()))
    }

    /// k-nearest-neighbour query with an exact-match metadata filter.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidInput`] if `top_k == 0` or `vector` is empty.
    pub async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<RetrievedMatch>> {
        if top_k == 0 {
            return Err(RagError::InvalidInput("top_k must be at least 1".to_string()));
        }
        if vector.is_empty() {
            return Err(RagError::InvalidInput("query vector must not be empty".to_string()));
        }

        let mut matches = self.provider.query(vector, top_k, filter).await?;
        matches.retain(|m| filter.matches(&m.metadata));
        matches.sort_by(RetrievedMatch::rank_cmp);
        matches.truncate(top_k);
        debug!(backend = self.provider.name(), top_k, result_count = matches.len(), "index query");
        Ok(matches)
    }

    /// Enumerate entries page by page.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidInput`] if `page.limit` is zero or above the configured maximum.
    pub async fn list(&self, page: &PageRequest) -> Result<Page<IndexEntry>> {
        validate_page(page, self.max_page_size)?;
        self.provider.list(page).await
    }
}

pub(crate) fn validate_page(page: &PageRequest, max_page_size: usize) -> Result<()> {
    if page.limit == 0 || page.limit > max_page_size {
        return Err(RagError::InvalidInput(format!(
            "page limit must be between 1 and {max_page_size}, got {}",
            page.limit
        )));
    }
    Ok(())
}
