//! Term-frequency retriever over an exported set of chunk records.
//!
//! The export is a JSON array of records:
//!
//! ```json
//! [{ "document_id": "doc-1", "content": "…", "pages": [3, 4] },
//!  { "document_id": "doc-1", "content": "…", "metadata": { "pages": ["7"] } }]
//! ```
//!
//! An object with a `passages` or `chunks` array is accepted too. Page
//! values may be integers or numeric strings; anything else is dropped.

use super::{ContextRetriever, RetrievedPassage};
use crate::error::HandbookError;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tracing::{debug, info};

static RE_TERM: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+").unwrap());

#[derive(Debug, Deserialize)]
struct ChunkRecord {
    #[serde(default)]
    document_id: Option<String>,
    content: String,
    #[serde(default)]
    pages: Option<Value>,
    #[serde(default)]
    metadata: Option<Value>,
}

#[derive(Debug, Clone)]
struct Chunk {
    document_id: Option<String>,
    content: String,
    pages: Vec<u32>,
    terms: HashMap<String, f64>,
    norm: f64,
}

/// All chunks held in memory; scoring is a linear scan.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRetriever {
    chunks: Vec<Chunk>,
}

impl InMemoryRetriever {
    /// Load an export from disk.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, HandbookError> {
        let path = path.as_ref();
        let load_err = |detail: String| HandbookError::PassageLoad {
            path: path.to_path_buf(),
            detail,
        };
        let raw = std::fs::read_to_string(path).map_err(|e| load_err(e.to_string()))?;
        let value: Value = serde_json::from_str(&raw).map_err(|e| load_err(e.to_string()))?;
        let retriever = Self::from_json_value(value).map_err(load_err)?;
        info!(
            "Loaded {} passages from {}",
            retriever.len(),
            path.display()
        );
        Ok(retriever)
    }

    /// Build from an already-parsed export.
    pub fn from_json_value(value: Value) -> Result<Self, String> {
        let records = match value {
            Value::Array(items) => items,
            Value::Object(mut map) => match map.remove("passages").or_else(|| map.remove("chunks")) {
                Some(Value::Array(items)) => items,
                _ => return Err("expected an array of chunk records".to_string()),
            },
            _ => return Err("expected an array of chunk records".to_string()),
        };

        let mut chunks = Vec::with_capacity(records.len());
        for (i, item) in records.into_iter().enumerate() {
            let record: ChunkRecord =
                serde_json::from_value(item).map_err(|e| format!("record {i}: {e}"))?;
            let pages = record
                .pages
                .as_ref()
                .or_else(|| record.metadata.as_ref().and_then(|m| m.get("pages")))
                .map(coerce_pages)
                .unwrap_or_default();
            chunks.push(Chunk::new(record.document_id, record.content, pages));
        }
        Ok(Self { chunks })
    }

    /// Add one passage.
    pub fn push(&mut self, document_id: Option<&str>, content: impl Into<String>, pages: Vec<u32>) {
        self.chunks
            .push(Chunk::new(document_id.map(str::to_string), content.into(), pages));
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// The document id when every record names the same one.
    pub fn default_document(&self) -> Option<String> {
        match self.document_ids().as_slice() {
            [only] => Some(only.clone()),
            _ => None,
        }
    }

    /// Distinct document ids across all passages, sorted.
    pub fn document_ids(&self) -> Vec<String> {
        let ids: BTreeSet<&str> = self
            .chunks
            .iter()
            .filter_map(|c| c.document_id.as_deref())
            .collect();
        ids.into_iter().map(str::to_string).collect()
    }
}

impl Chunk {
    fn new(document_id: Option<String>, content: String, pages: Vec<u32>) -> Self {
        let terms = term_frequencies(&content);
        let norm = terms.values().map(|v| v * v).sum::<f64>().sqrt();
        Self {
            document_id,
            content,
            pages,
            terms,
            norm,
        }
    }
}

/// Integers and numeric strings, deduplicated and sorted.
fn coerce_pages(value: &Value) -> Vec<u32> {
    let one = |v: &Value| match v {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    };
    let pages: BTreeSet<u32> = match value {
        Value::Array(items) => items.iter().filter_map(one).collect(),
        other => one(other).into_iter().collect(),
    };
    pages.into_iter().collect()
}

fn term_frequencies(text: &str) -> HashMap<String, f64> {
    let mut tf = HashMap::new();
    for m in RE_TERM.find_iter(&text.to_lowercase()) {
        *tf.entry(m.as_str().to_string()).or_insert(0.0) += 1.0;
    }
    tf
}

fn cosine(query: &HashMap<String, f64>, query_norm: f64, chunk: &Chunk) -> f64 {
    if query_norm < 1e-10 || chunk.norm < 1e-10 {
        return 0.0;
    }
    let dot: f64 = query
        .iter()
        .filter_map(|(term, q)| chunk.terms.get(term).map(|c| q * c))
        .sum();
    dot / (query_norm * chunk.norm)
}

#[async_trait]
impl ContextRetriever for InMemoryRetriever {
    fn name(&self) -> &str {
        "in-memory"
    }

    async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        document_scope: Option<&str>,
    ) -> Vec<RetrievedPassage> {
        let q = term_frequencies(query);
        let q_norm = q.values().map(|v| v * v).sum::<f64>().sqrt();

        let mut scored: Vec<RetrievedPassage> = self
            .chunks
            .iter()
            .filter(|c| match document_scope {
                Some(scope) => c.document_id.as_deref() == Some(scope),
                None => true,
            })
            .filter_map(|c| {
                let similarity = cosine(&q, q_norm, c);
                (similarity > 0.0).then(|| RetrievedPassage {
                    content: c.content.clone(),
                    pages: c.pages.clone(),
                    similarity,
                })
            })
            .collect();

        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(top_k);
        debug!("Retrieved {} passages for '{}'", scored.len(), query);
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> InMemoryRetriever {
        InMemoryRetriever::from_json_value(json!([
            {"document_id": "d1", "content": "Consistent hashing distributes cache keys", "pages": [3]},
            {"document_id": "d1", "content": "Eviction policies: LRU and LFU caches", "metadata": {"pages": ["7", 9, "x"]}},
            {"document_id": "d2", "content": "Cache keys in another document", "pages": 4},
            {"document_id": "d1", "content": "Unrelated gardening notes"}
        ]))
        .unwrap()
    }

    #[test]
    fn pages_are_coerced() {
        let s = store();
        assert_eq!(s.chunks[0].pages, vec![3]);
        assert_eq!(s.chunks[1].pages, vec![7, 9]);
        assert_eq!(s.chunks[2].pages, vec![4]);
        assert!(s.chunks[3].pages.is_empty());
    }

    #[tokio::test]
    async fn ranks_descending_and_drops_zero() {
        let hits = store().retrieve("cache keys", 8, None).await;
        assert!(!hits.is_empty());
        assert!(hits.windows(2).all(|w| w[0].similarity >= w[1].similarity));
        assert!(hits.iter().all(|h| !h.content.contains("gardening")));
    }

    #[tokio::test]
    async fn scope_restricts_documents() {
        let hits = store().retrieve("cache keys", 8, Some("d2")).await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].pages, vec![4]);
    }

    #[tokio::test]
    async fn top_k_bounds_results() {
        let hits = store().retrieve("cache", 1, None).await;
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn default_document_needs_single_id() {
        assert_eq!(store().default_document(), None);
        let mut one = InMemoryRetriever::default();
        one.push(Some("only"), "text", vec![1]);
        assert_eq!(one.default_document().as_deref(), Some("only"));
    }

    #[test]
    fn document_ids_are_distinct_and_sorted() {
        let mut s = InMemoryRetriever::default();
        assert!(s.document_ids().is_empty());
        s.push(None, "no id", vec![]);
        assert!(s.document_ids().is_empty());
        assert_eq!(s.default_document(), None);
        s.push(Some("b"), "x", vec![1]);
        s.push(Some("a"), "y", vec![2]);
        s.push(Some("b"), "z", vec![3]);
        assert_eq!(s.document_ids(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn wrapped_object_is_accepted() {
        let s = InMemoryRetriever::from_json_value(json!({"chunks": [{"content": "a"}]})).unwrap();
        assert_eq!(s.len(), 1);
        assert!(InMemoryRetriever::from_json_value(json!(42)).is_err());
    }

    #[test]
    fn missing_file_is_passage_load_error() {
        let err = InMemoryRetriever::from_json_file("/nonexistent/passages.json").unwrap_err();
        assert!(matches!(err, HandbookError::PassageLoad { .. }));
    }
}
