//! Grounding context records and the external retrieval contract.

use crate::error::Result;
use crate::figure::GroundingDocument;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A ranked passage returned by a `ContextStore`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ContextChunk {
    pub content: String,
    #[serde(default)]
    pub source_name: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
}

impl ContextChunk {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn with_source(mut self, name: impl Into<String>, url: Option<String>) -> Self {
        self.source_name = Some(name.into());
        self.source_url = url;
        self
    }
}

impl From<&GroundingDocument> for ContextChunk {
    fn from(doc: &GroundingDocument) -> Self {
        Self {
            content: doc.content.clone(),
            source_name: doc.source_name.clone(),
            source_url: doc.source_url.clone(),
            content_type: doc.content_type.clone(),
        }
    }
}

/// Nearest-neighbour retrieval over a figure's reference corpus.
///
/// An empty index is not an error: implementations return `Ok(vec![])` and
/// reserve `Err` for infrastructure failure.
#[async_trait]
pub trait ContextStore: Send + Sync {
    /// Returns up to `top_k` chunks for `figure_slug`, best match first.
    async fn query(
        &self,
        figure_slug: &str,
        query_text: &str,
        top_k: usize,
    ) -> Result<Vec<ContextChunk>>;
}

/// What happened when the application asked the `ContextStore` for context.
///
/// Keeps "nothing found" distinct from "retrieval failed" so callers can
/// assert on degraded behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrievalOutcome {
    /// Retrieval is disabled or there is no figure to search for
    Skipped,
    /// Retrieval succeeded (possibly with zero hits)
    Hits(Vec<ContextChunk>),
    /// Retrieval errored or timed out
    Failed(String),
}

impl RetrievalOutcome {
    /// Chunks to feed the assembler; empty for skipped or failed retrieval.
    pub fn chunks(&self) -> &[ContextChunk] {
        match self {
            Self::Hits(chunks) => chunks,
            _ => &[],
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}
