//! In-memory vector index using cosine similarity.
//!
//! This module provides [`InMemoryVectorIndex`], a zero-dependency index
//! backed by a `BTreeMap` protected by a `tokio::sync::RwLock`. It is suitable
//! for development, testing, and single-process deployments.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::document::{IndexEntry, MetadataFilter, Page, PageRequest, RetrievedMatch, paginate};
use crate::error::Result;
use crate::vectorstore::VectorIndexProvider;

/// An in-memory vector index using cosine similarity for search.
///
/// Entries are keyed by id in a `BTreeMap` so enumeration and tie-breaking
/// are deterministic.
#[derive(Debug, Default)]
pub struct InMemoryVectorIndex {
    entries: RwLock<BTreeMap<String, IndexEntry>>,
}

impl InMemoryVectorIndex {
    /// Create a new empty in-memory index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorIndexProvider for InMemoryVectorIndex {
    fn name(&self) -> &str {
        "memory"
    }

    async fn upsert(&self, entry: IndexEntry) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(entry.id.clone(), entry);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.remove(id);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<IndexEntry>> {
        let entries = self.entries.read().await;
        Ok(entries.get(id).cloned())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<RetrievedMatch>> {
        let entries = self.entries.read().await;

        let mut scored: Vec<RetrievedMatch> = entries
            .values()
            .filter(|entry| filter.matches(&entry.metadata))
            .map(|entry| RetrievedMatch {
                document_id: entry.id.clone(),
                content: entry.content.clone(),
                metadata: entry.metadata.clone(),
                score: cosine_similarity(&entry.vector, vector),
            })
            .collect();

        scored.sort_by(RetrievedMatch::rank_cmp);
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn list(&self, page: &PageRequest) -> Result<Page<IndexEntry>> {
        let entries = self.entries.read().await;
        Ok(paginate(entries.iter(), page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_identical_orthogonal_mismatched() {
        assert!((cosine_similarity(&[1.0, 2.0], &[1.0, 2.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[tokio::test]
    async fn upsert_replaces_and_delete_is_idempotent() {
        let index = InMemoryVectorIndex::new();
        let entry = |content: &str| IndexEntry {
            id: "a".into(),
            vector: vec![1.0, 0.0],
            content: content.into(),
            metadata: Default::default(),
        };
        index.upsert(entry("one")).await.unwrap();
        index.upsert(entry("two")).await.unwrap();
        assert_eq!(index.len().await, 1);
        assert_eq!(index.get("a").await.unwrap().unwrap().content, "two");

        index.delete("a").await.unwrap();
        index.delete("a").await.unwrap();
        assert!(index.get("a").await.unwrap().is_none());
    }
}
