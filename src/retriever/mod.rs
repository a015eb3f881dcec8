//! The Context Retriever capability.
//!
//! Retrieval has no error channel: an empty result is a valid state that
//! degrades a section to ungrounded generation. Backends that can fail
//! internally log the failure and return nothing.

mod in_memory;

pub use in_memory::InMemoryRetriever;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One grounded passage with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedPassage {
    pub content: String,
    /// Source page numbers. May be empty.
    #[serde(default)]
    pub pages: Vec<u32>,
    /// Higher is more relevant.
    pub similarity: f64,
}

/// Given a query and an optional document scope, return up to `top_k`
/// passages ordered by descending relevance.
#[async_trait]
pub trait ContextRetriever: Send + Sync {
    fn name(&self) -> &str;

    async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        document_scope: Option<&str>,
    ) -> Vec<RetrievedPassage>;
}

/// A retriever with nothing indexed.
pub struct NoopRetriever;

#[async_trait]
impl ContextRetriever for NoopRetriever {
    fn name(&self) -> &str {
        "none"
    }

    async fn retrieve(
        &self,
        _query: &str,
        _top_k: usize,
        _document_scope: Option<&str>,
    ) -> Vec<RetrievedPassage> {
        Vec::new()
    }
}
