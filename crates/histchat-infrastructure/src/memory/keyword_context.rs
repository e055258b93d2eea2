//! Keyword-overlap ContextStore over figure grounding documents.

use async_trait::async_trait;
use histchat_core::context::{ContextChunk, ContextStore};
use histchat_core::error::{HistchatError, Result};
use histchat_core::figure::Figure;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

/// Ranks a figure's reference documents by shared query terms.
///
/// A stand-in for a vector index: deterministic, local, and good enough to
/// exercise the retrieval path. Instruction-labelled documents are never
/// indexed.
#[derive(Default)]
pub struct KeywordContextStore {
    index: RwLock<HashMap<String, Vec<ContextChunk>>>,
}

impl KeywordContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an index from every figure's reference documents.
    pub fn from_figures<'a>(figures: impl IntoIterator<Item = &'a Figure>) -> Result<Self> {
        let store = Self::new();
        for figure in figures {
            store.index_figure(figure)?;
        }
        Ok(store)
    }

    /// Replaces the indexed chunks for one figure.
    pub fn index_figure(&self, figure: &Figure) -> Result<()> {
        let chunks: Vec<ContextChunk> = figure
            .reference_documents()
            .filter(|doc| !doc.content.trim().is_empty())
            .map(ContextChunk::from)
            .collect();
        self.index
            .write()
            .map_err(poisoned)?
            .insert(figure.slug.clone(), chunks);
        Ok(())
    }
}

fn poisoned<T>(_: T) -> HistchatError {
    HistchatError::internal("context index lock poisoned")
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.chars().count() > 2)
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl ContextStore for KeywordContextStore {
    async fn query(
        &self,
        figure_slug: &str,
        query_text: &str,
        top_k: usize,
    ) -> Result<Vec<ContextChunk>> {
        let index = self.index.read().map_err(poisoned)?;
        let Some(chunks) = index.get(figure_slug) else {
            return Ok(Vec::new());
        };

        let query_terms = terms(query_text);
        let mut scored: Vec<(usize, usize, &ContextChunk)> = chunks
            .iter()
            .enumerate()
            .map(|(rank, chunk)| {
                let overlap = terms(&chunk.content).intersection(&query_terms).count();
                (overlap, rank, chunk)
            })
            .filter(|(overlap, _, _)| *overlap > 0)
            .collect();

        // Best overlap first, stored order breaks ties
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(_, _, chunk)| chunk.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use histchat_core::figure::GroundingDocument;
    use std::sync::Arc;

    fn doc(content_type: &str, source: &str, content: &str) -> GroundingDocument {
        GroundingDocument {
            source_name: Some(source.to_string()),
            content_type: Some(content_type.to_string()),
            content: content.to_string(),
            ..Default::default()
        }
    }

    fn cleopatra() -> Figure {
        Figure::new("cleopatra", "Cleopatra")
            .with_document(doc("persona", "editor", "Speak about Caesar and Rome."))
            .with_document(doc("bio", "a", "Cleopatra ruled Egypt from Alexandria."))
            .with_document(doc("bio", "b", "She allied with Julius Caesar in Rome."))
            .with_document(doc("bio", "c", "Caesar and Cleopatra had a son, Caesarion, in Rome."))
    }

    #[tokio::test]
    async fn test_ranks_by_overlap() {
        let figure = cleopatra();
        let store = KeywordContextStore::from_figures([&figure]).unwrap();

        let hits = store.query("cleopatra", "Caesar in Rome", 5).await.unwrap();
        let sources: Vec<_> = hits.iter().filter_map(|c| c.source_name.as_deref()).collect();
        assert_eq!(sources, vec!["b", "c"]);

        let top = store.query("cleopatra", "Caesar in Rome", 1).await.unwrap();
        assert_eq!(top.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_index_is_not_an_error() {
        let store = KeywordContextStore::new();
        assert!(store.query("nobody", "anything", 5).await.unwrap().is_empty());

        let figure = cleopatra();
        let store = KeywordContextStore::from_figures([&figure]).unwrap();
        assert!(store.query("cleopatra", "pyramids", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_poisoned_index_is_reported() {
        let store = Arc::new(KeywordContextStore::new());
        let holder = Arc::clone(&store);
        let _ = std::thread::spawn(move || {
            let _guard = holder.index.write().unwrap();
            panic!("writer died while holding the index");
        })
        .join();

        let err = store.index_figure(&cleopatra()).unwrap_err();
        assert!(matches!(err, HistchatError::Internal(_)));
        assert!(store.query("cleopatra", "Caesar", 5).await.is_err());
    }
}
