//! Data types for documents, index entries, queries, matches and answers.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// A scalar metadata value. Only these three kinds are storable or filterable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Number(f64),
    String(String),
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl TryFrom<serde_json::Value> for MetadataValue {
    type Error = RagError;

    fn try_from(value: serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::Bool(b) => Ok(Self::Bool(b)),
            serde_json::Value::String(s) => Ok(Self::String(s)),
            serde_json::Value::Number(n) => n
                .as_f64()
                .filter(|f| f.is_finite())
                .map(Self::Number)
                .ok_or_else(|| RagError::InvalidInput(format!("metadata number {n} is not finite"))),
            other => Err(RagError::InvalidInput(format!(
                "metadata values must be strings, numbers or booleans, got {}",
                json_kind(&other)
            ))),
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
    }
}

/// Free-form document metadata. Ordered so serialized output is stable.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// Coerce a loosely typed JSON object into [`Metadata`].
///
/// # Errors
///
/// Returns [`RagError::InvalidInput`] for `null`, arrays, nested objects,
/// non-finite numbers and empty keys.
pub fn metadata_from_json(object: serde_json::Map<String, serde_json::Value>) -> Result<Metadata> {
    let mut metadata = Metadata::new();
    for (key, value) in object {
        let value = MetadataValue::try_from(value)
            .map_err(|e| RagError::InvalidInput(format!("metadata key '{key}': {e}")))?;
        metadata.insert(key, value);
    }
    validate_metadata(&metadata)?;
    Ok(metadata)
}

/// Check the invariants of a metadata map built in code.
pub fn validate_metadata(metadata: &Metadata) -> Result<()> {
    for (key, value) in metadata {
        if key.trim().is_empty() {
            return Err(RagError::InvalidInput("metadata keys must not be empty".to_string()));
        }
        if let MetadataValue::Number(n) = value {
            if !n.is_finite() {
                return Err(RagError::InvalidInput(format!(
                    "metadata key '{key}': number {n} is not finite"
                )));
            }
        }
    }
    Ok(())
}

/// A persisted unit of knowledge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Stable identifier assigned by the document store.
    pub id: String,
    /// The raw text.
    pub content: String,
    /// Key-value metadata used for filtering.
    #[serde(default)]
    pub metadata: Metadata,
    /// Embedding of `content`. Maintained by the document store only.
    #[serde(default)]
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Changes requested by [`DocumentStore::update`](crate::DocumentStore::update).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UpdateDocument {
    /// New content. Triggers a re-embedding when it differs from the stored text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Replacement metadata map.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl UpdateDocument {
    pub fn content(content: impl Into<String>) -> Self {
        Self { content: Some(content.into()), metadata: None }
    }

    pub fn metadata(metadata: Metadata) -> Self {
        Self { content: None, metadata: Some(metadata) }
    }
}

/// The vector index's record of a document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    pub id: String,
    pub vector: Vec<f32>,
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
}

/// A conjunction of exact-match predicates over metadata keys.
///
/// An empty filter matches every entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct MetadataFilter(pub BTreeMap<String, MetadataValue>);

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `key` to equal `value`.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &MetadataValue)> {
        self.0.iter()
    }

    /// Whether every predicate holds for `metadata`.
    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.0.iter().all(|(key, expected)| metadata.get(key) == Some(expected))
    }
}

/// A question plus optional retrieval overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Query {
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<MetadataFilter>,
    /// Overrides the configured `top_k`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
    /// Overrides the configured similarity threshold.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f32>,
}

impl Query {
    pub fn new(question: impl Into<String>) -> Self {
        Self { question: question.into(), ..Self::default() }
    }

    pub fn with_filter(mut self, filter: MetadataFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = Some(threshold);
        self
    }
}

/// A document retrieved for a query, with its similarity score (higher is more relevant).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedMatch {
    pub document_id: String,
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
    pub score: f32,
}

impl RetrievedMatch {
    /// Rank order: score descending, then `document_id` ascending.
    pub fn rank_cmp(a: &Self, b: &Self) -> Ordering {
        b.score.total_cmp(&a.score).then_with(|| a.document_id.cmp(&b.document_id))
    }
}

/// A synthesized answer and the documents it was grounded in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    pub text: String,
    /// Ids of the documents included in the prompt, in rank order.
    pub sources: Vec<String>,
}

/// Cursor-based pagination request. Items are enumerated by id ascending.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageRequest {
    /// Opaque token taken from the previous page's `next_cursor`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    pub limit: usize,
}

impl PageRequest {
    pub fn first(limit: usize) -> Self {
        Self { cursor: None, limit }
    }

    pub fn after(cursor: impl Into<String>, limit: usize) -> Self {
        Self { cursor: Some(cursor.into()), limit }
    }
}

/// One page of an enumeration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Cursor for the next page, `None` on the last page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self { items: Vec::new(), next_cursor: None }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page { items: self.items.into_iter().map(f).collect(), next_cursor: self.next_cursor }
    }
}

/// Paginate an id-ordered iterator.
///
/// Takes `limit + 1` items so the next cursor is only emitted when another page exists.
pub(crate) fn paginate<'a, T: Clone + 'a>(
    ordered: impl Iterator<Item = (&'a String, &'a T)>,
    page: &PageRequest,
) -> Page<T> {
    let mut rows: Vec<(&String, &T)> = ordered
        .skip_while(|(id, _)| page.cursor.as_deref().is_some_and(|cursor| id.as_str() <= cursor))
        .take(page.limit + 1)
        .collect();
    let has_more = rows.len() > page.limit;
    rows.truncate(page.limit);
    let next_cursor = if has_more { rows.last().map(|(id, _)| (*id).clone()) } else { None };
    Page { items: rows.into_iter().map(|(_, item)| item.clone()).collect(), next_cursor }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn metadata_accepts_scalars() {
        let object = json!({"lang": "en", "year": 2024, "draft": false});
        let metadata = metadata_from_json(object.as_object().unwrap().clone()).unwrap();
        assert_eq!(metadata["lang"], MetadataValue::String("en".into()));
        assert_eq!(metadata["year"], MetadataValue::Number(2024.0));
        assert_eq!(metadata["draft"], MetadataValue::Bool(false));
    }

    #[test]
    fn metadata_rejects_nested_and_null() {
        for bad in [json!({"a": null}), json!({"a": [1, 2]}), json!({"a": {"b": 1}}), json!({"": 1})]
        {
            let err = metadata_from_json(bad.as_object().unwrap().clone()).unwrap_err();
            assert!(matches!(err, RagError::InvalidInput(_)), "unexpected error {err:?}");
        }
    }

    #[test]
    fn filter_is_a_conjunction() {
        let mut metadata = Metadata::new();
        metadata.insert("lang".to_string(), MetadataValue::from("en"));
        metadata.insert("year".to_string(), MetadataValue::from(2024i64));
        assert!(MetadataFilter::new().matches(&metadata));
        assert!(MetadataFilter::new().with("lang", "en").matches(&metadata));
        assert!(MetadataFilter::new().with("lang", "en").with("year", 2024i64).matches(&metadata));
        assert!(!MetadataFilter::new().with("lang", "en").with("year", 2023i64).matches(&metadata));
        assert!(!MetadataFilter::new().with("missing", true).matches(&metadata));
        // "2024" the string is not 2024 the number
        assert!(!MetadataFilter::new().with("year", "2024").matches(&metadata));
    }

    #[test]
    fn rank_order_breaks_ties_by_id() {
        let m = |id: &str, score: f32| RetrievedMatch {
            document_id: id.into(),
            content: String::new(),
            metadata: Metadata::new(),
            score,
        };
        let mut matches = vec![m("b", 0.5), m("c", 0.9), m("a", 0.5)];
        matches.sort_by(RetrievedMatch::rank_cmp);
        let ids: Vec<_> = matches.iter().map(|m| m.document_id.as_str()).collect();
        assert_eq!(ids, ["c", "a", "b"]);
    }

    #[test]
    fn paginate_walks_all_items_once() {
        let items: BTreeMap<String, u32> = (0..5).map(|i| (format!("id{i}"), i)).collect();

        let first = paginate(items.iter(), &PageRequest::first(2));
        assert_eq!(first.items, vec![0, 1]);
        assert_eq!(first.next_cursor.as_deref(), Some("id1"));

        let second = paginate(items.iter(), &PageRequest::after("id1", 2));
        assert_eq!(second.items, vec![2, 3]);

        let last = paginate(items.iter(), &PageRequest::after("id3", 2));
        assert_eq!(last.items, vec![4]);
        assert_eq!(last.next_cursor, None);
    }
}
