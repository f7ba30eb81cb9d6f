//! Query-time retrieval: embed → nearest neighbours → threshold.

use tracing::{debug, info};

use crate::config::RagConfig;
use crate::document::{MetadataFilter, Query, RetrievedMatch};
use crate::embedding::EmbeddingClient;
use crate::error::{RagError, Result};
use crate::vectorstore::VectorIndex;

/// Turns a [`Query`] into a ranked, thresholded list of matches.
///
/// Reads the vector index only. For an unchanged index the same query
/// always yields the same ordered result.
#[derive(Clone)]
pub struct RetrievalEngine {
    embeddings: EmbeddingClient,
    index: VectorIndex,
    default_top_k: usize,
    max_top_k: usize,
    default_threshold: f32,
}

impl RetrievalEngine {
    pub fn new(embeddings: EmbeddingClient, index: VectorIndex, config: &RagConfig) -> Self {
        Self {
            embeddings,
            index,
            default_top_k: config.top_k,
            max_top_k: config.max_top_k,
            default_threshold: config.similarity_threshold,
        }
    }

    /// Retrieve the matches for `query`.
    ///
    /// An empty result is a normal outcome meaning nothing cleared the threshold.
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidInput`] for a blank question, `top_k` of zero or
    ///   above the maximum, or a non-finite threshold.
    /// - Embedding and index errors, unchanged.
    pub async fn retrieve(&self, query: &Query) -> Result<Vec<RetrievedMatch>> {
        let top_k = query.top_k.unwrap_or(self.default_top_k);
        if top_k == 0 {
            return Err(RagError::InvalidInput("top_k must be at least 1".to_string()));
        }
        if top_k > self.max_top_k {
            return Err(RagError::InvalidInput(format!(
                "top_k ({top_k}) must not exceed {}",
                self.max_top_k
            )));
        }
        let threshold = query.threshold.unwrap_or(self.default_threshold);
        if !threshold.is_finite() {
            return Err(RagError::InvalidInput("threshold must be a finite number".to_string()));
        }

        let vector = self.embeddings.embed(&query.question).await?;

        let no_filter = MetadataFilter::default();
        let filter = query.filter.as_ref().unwrap_or(&no_filter);
        let candidates = self.index.query(&vector, top_k, filter).await?;
        let candidate_count = candidates.len();

        let matches: Vec<RetrievedMatch> =
            candidates.into_iter().filter(|m| m.score >= threshold).collect();

        debug!(candidate_count, threshold, "applied relevance threshold");
        info!(top_k, result_count = matches.len(), "retrieval completed");
        Ok(matches)
    }
}
