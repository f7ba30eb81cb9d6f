//! Persistence for document records.
//!
//! The [`DocumentStore`](crate::DocumentStore) is the only caller; the
//! vector index never reads from here.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::document::{Document, Page, PageRequest, paginate};
use crate::error::Result;

/// Storage for authoritative [`Document`] records.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Insert or replace the record with `document.id`.
    async fn put(&self, document: Document) -> Result<()>;

    async fn get(&self, id: &str) -> Result<Option<Document>>;

    /// Remove a record, returning whether it existed.
    async fn remove(&self, id: &str) -> Result<bool>;

    /// Enumerate records by id ascending.
    async fn list(&self, page: &PageRequest) -> Result<Page<Document>>;
}

/// A [`DocumentRepository`] held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryDocumentRepository {
    documents: RwLock<BTreeMap<String, Document>>,
}

impl InMemoryDocumentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentRepository for InMemoryDocumentRepository {
    async fn put(&self, document: Document) -> Result<()> {
        self.documents.write().await.insert(document.id.clone(), document);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Document>> {
        Ok(self.documents.read().await.get(id).cloned())
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        Ok(self.documents.write().await.remove(id).is_some())
    }

    async fn list(&self, page: &PageRequest) -> Result<Page<Document>> {
        let documents = self.documents.read().await;
        Ok(paginate(documents.iter(), page))
    }
}
