//! Qdrant vector index backend.
//!
//! Provides [`QdrantVectorIndex`] which implements [`VectorIndexProvider`]
//! using the [qdrant-client](https://docs.rs/qdrant-client) crate over gRPC.
//! Each document is one point keyed by its UUID; content and metadata live in
//! the point payload.
//!
//! # Example
//!
//! ```rust,ignore
//! use semdoc_rag::qdrant::QdrantVectorIndex;
//!
//! let index = QdrantVectorIndex::connect("http://localhost:6334", "documents", 1536).await?;
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::vector_output::Vector;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter, GetPointsBuilder,
    PointId, PointStruct, PointsIdsList, Range, RetrievedPoint, ScrollPointsBuilder,
    SearchPointsBuilder, UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder,
    VectorsOutput,
};
use qdrant_client::{Payload, Qdrant};
use tracing::debug;
use uuid::Uuid;

use crate::document::{
    IndexEntry, Metadata, MetadataFilter, MetadataValue, Page, PageRequest, RetrievedMatch,
};
use crate::error::{RagError, Result};
use crate::vectorstore::VectorIndexProvider;

const BACKEND: &str = "qdrant";

/// A [`VectorIndexProvider`] backed by [Qdrant](https://qdrant.tech/).
///
/// Uses one collection with cosine distance. Metadata filters are pushed
/// down as `must` conditions on `metadata.<key>` payload fields.
pub struct QdrantVectorIndex {
    client: Qdrant,
    collection: String,
}

impl QdrantVectorIndex {
    /// Connect to `url` and make sure `collection` exists with `dimensions`-wide vectors.
    pub async fn connect(url: &str, collection: &str, dimensions: usize) -> Result<Self> {
        let client = Qdrant::from_url(url).build().map_err(Self::map_err)?;
        let index = Self::from_client(client, collection);
        index.ensure_collection(dimensions).await?;
        Ok(index)
    }

    /// Wrap an existing client. The collection must already exist.
    pub fn from_client(client: Qdrant, collection: impl Into<String>) -> Self {
        Self { client, collection: collection.into() }
    }

    async fn ensure_collection(&self, dimensions: usize) -> Result<()> {
        let exists =
            self.client.collection_exists(self.collection.clone()).await.map_err(Self::map_err)?;
        if exists {
            debug!(collection = %self.collection, "qdrant collection already exists, skipping creation");
            return Ok(());
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection)
                    .vectors_config(VectorParamsBuilder::new(dimensions as u64, Distance::Cosine)),
            )
            .await
            .map_err(Self::map_err)?;

        debug!(collection = %self.collection, dimensions, "created qdrant collection");
        Ok(())
    }

    fn map_err(e: qdrant_client::QdrantError) -> RagError {
        RagError::index_unavailable(BACKEND, e)
    }

    fn point_id(id: &str) -> Option<PointId> {
        Uuid::parse_str(id).ok().map(|uuid| PointId::from(uuid.to_string()))
    }

    fn point_id_string(id: Option<&PointId>) -> String {
        id.and_then(|pid| match &pid.point_id_options {
            Some(PointIdOptions::Uuid(s)) => Some(s.clone()),
            Some(PointIdOptions::Num(n)) => Some(n.to_string()),
            None => None,
        })
        .unwrap_or_default()
    }

    fn extract_string(value: &QdrantValue) -> Option<String> {
        match &value.kind {
            Some(Kind::StringValue(s)) => Some(s.clone()),
            _ => None,
        }
    }

    fn extract_metadata_value(value: &QdrantValue) -> Option<MetadataValue> {
        match &value.kind {
            Some(Kind::StringValue(s)) => Some(MetadataValue::String(s.clone())),
            Some(Kind::BoolValue(b)) => Some(MetadataValue::Bool(*b)),
            Some(Kind::DoubleValue(d)) => Some(MetadataValue::Number(*d)),
            Some(Kind::IntegerValue(i)) => Some(MetadataValue::Number(*i as f64)),
            _ => None,
        }
    }

    fn extract_metadata(payload: &HashMap<String, QdrantValue>) -> Metadata {
        payload
            .get("metadata")
            .and_then(|v| match &v.kind {
                Some(Kind::StructValue(s)) => Some(
                    s.fields
                        .iter()
                        .filter_map(|(k, v)| {
                            Self::extract_metadata_value(v).map(|value| (k.clone(), value))
                        })
                        .collect(),
                ),
                _ => None,
            })
            .unwrap_or_default()
    }

    fn extract_vector(vectors: Option<&VectorsOutput>) -> Vec<f32> {
        match vectors.and_then(VectorsOutput::get_vector) {
            Some(Vector::Dense(dense)) => dense.data,
            _ => Vec::new(),
        }
    }

    fn payload(entry: &IndexEntry) -> Result<Payload> {
        let metadata = serde_json::to_value(&entry.metadata)
            .map_err(|e| RagError::Internal(format!("failed to encode metadata: {e}")))?;
        let payload = serde_json::json!({ "content": entry.content, "metadata": metadata });
        Payload::try_from(payload)
            .map_err(|e| RagError::Internal(format!("failed to build qdrant payload: {e}")))
    }

    fn filter(filter: &MetadataFilter) -> Option<Filter> {
        if filter.is_empty() {
            return None;
        }
        let conditions: Vec<Condition> = filter
            .iter()
            .map(|(key, value)| {
                let field = format!("metadata.{key}");
                match value {
                    MetadataValue::String(s) => Condition::matches(field, s.clone()),
                    MetadataValue::Bool(b) => Condition::matches(field, *b),
                    // Range equality matches both integer and double payloads.
                    MetadataValue::Number(n) => Condition::range(
                        field,
                        Range { gte: Some(*n), lte: Some(*n), ..Default::default() },
                    ),
                }
            })
            .collect();
        Some(Filter::must(conditions))
    }

    fn entry_from_point(point: RetrievedPoint) -> IndexEntry {
        IndexEntry {
            id: Self::point_id_string(point.id.as_ref()),
            vector: Self::extract_vector(point.vectors.as_ref()),
            content: point.payload.get("content").and_then(Self::extract_string).unwrap_or_default(),
            metadata: Self::extract_metadata(&point.payload),
        }
    }
}

#[async_trait]
impl VectorIndexProvider for QdrantVectorIndex {
    fn name(&self) -> &str {
        BACKEND
    }

    async fn upsert(&self, entry: IndexEntry) -> Result<()> {
        let id = Self::point_id(&entry.id).ok_or_else(|| {
            RagError::InvalidInput(format!("qdrant point ids must be UUIDs, got '{}'", entry.id))
        })?;
        let payload = Self::payload(&entry)?;
        let point = PointStruct::new(id, entry.vector, payload);

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, vec![point]).wait(true))
            .await
            .map_err(Self::map_err)?;

        debug!(collection = %self.collection, entry.id = %entry.id, "upserted point to qdrant");
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        // A malformed id cannot name a stored point.
        let Some(point_id) = Self::point_id(id) else {
            return Ok(());
        };

        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection)
                    .points(PointsIdsList { ids: vec![point_id] })
                    .wait(true),
            )
            .await
            .map_err(Self::map_err)?;

        debug!(collection = %self.collection, entry.id = id, "deleted point from qdrant");
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<IndexEntry>> {
        let Some(point_id) = Self::point_id(id) else {
            return Ok(None);
        };

        let response = self
            .client
            .get_points(
                GetPointsBuilder::new(&self.collection, vec![point_id])
                    .with_payload(true)
                    .with_vectors(true),
            )
            .await
            .map_err(Self::map_err)?;

        Ok(response.result.into_iter().next().map(Self::entry_from_point))
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<RetrievedMatch>> {
        let mut request =
            SearchPointsBuilder::new(&self.collection, vector.to_vec(), top_k as u64)
                .with_payload(true);
        if let Some(filter) = Self::filter(filter) {
            request = request.filter(filter);
        }

        let response = self.client.search_points(request).await.map_err(Self::map_err)?;

        let matches = response
            .result
            .into_iter()
            .map(|scored| RetrievedMatch {
                document_id: Self::point_id_string(scored.id.as_ref()),
                content: scored
                    .payload
                    .get("content")
                    .and_then(Self::extract_string)
                    .unwrap_or_default(),
                metadata: Self::extract_metadata(&scored.payload),
                score: scored.score,
            })
            .collect();

        Ok(matches)
    }

    async fn list(&self, page: &PageRequest) -> Result<Page<IndexEntry>> {
        let mut request = ScrollPointsBuilder::new(&self.collection)
            .limit(page.limit as u32)
            .with_payload(true)
            .with_vectors(true);
        // Qdrant cursors name the first point of the next page.
        if let Some(cursor) = &page.cursor {
            let Some(offset) = Self::point_id(cursor) else {
                return Err(RagError::InvalidInput(format!("invalid page cursor '{cursor}'")));
            };
            request = request.offset(offset);
        }

        let response = self.client.scroll(request).await.map_err(Self::map_err)?;

        Ok(Page {
            items: response.result.into_iter().map(Self::entry_from_point).collect(),
            next_cursor: response
                .next_page_offset
                .as_ref()
                .map(|pid| Self::point_id_string(Some(pid))),
        })
    }
}

#[cfg(test)]
mod tests {
    use qdrant_client::qdrant::vectors_output::VectorsOptions;
    use qdrant_client::qdrant::{DenseVector, VectorOutput};

    use super::*;

    #[test]
    fn reads_dense_vector_from_output() {
        let output = VectorsOutput {
            vectors_options: Some(VectorsOptions::Vector(VectorOutput {
                vector: Some(Vector::Dense(DenseVector { data: vec![0.5, 1.0] })),
                ..Default::default()
            })),
        };
        assert_eq!(QdrantVectorIndex::extract_vector(Some(&output)), [0.5, 1.0]);
        assert!(QdrantVectorIndex::extract_vector(None).is_empty());
    }

    #[test]
    fn only_uuids_name_points() {
        let id = Uuid::new_v4().to_string();
        let point = QdrantVectorIndex::point_id(&id);
        assert_eq!(QdrantVectorIndex::point_id_string(point.as_ref()), id);
        assert!(QdrantVectorIndex::point_id("doc-1").is_none());
    }

    #[test]
    fn filters_become_must_conditions() {
        assert!(QdrantVectorIndex::filter(&MetadataFilter::new()).is_none());
        let filter = MetadataFilter::new().with("lang", "en").with("year", 2024i64);
        let pushed = QdrantVectorIndex::filter(&filter).unwrap();
        assert_eq!(pushed.must.len(), 2);
    }
}
