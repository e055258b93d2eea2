//! In-memory figure catalog.

use async_trait::async_trait;
use histchat_core::error::Result;
use histchat_core::figure::{Figure, FigureCatalog};
use std::collections::BTreeMap;

/// A fixed set of figures, keyed by slug. Used by tests and demos.
#[derive(Debug, Clone, Default)]
pub struct MemoryFigureCatalog {
    figures: BTreeMap<String, Figure>,
}

impl MemoryFigureCatalog {
    pub fn new(figures: impl IntoIterator<Item = Figure>) -> Self {
        Self {
            figures: figures
                .into_iter()
                .map(|figure| (figure.slug.clone(), figure))
                .collect(),
        }
    }
}

#[async_trait]
impl FigureCatalog for MemoryFigureCatalog {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Figure>> {
        Ok(self.figures.get(slug).cloned())
    }

    async fn list_all(&self) -> Result<Vec<Figure>> {
        Ok(self.figures.values().cloned().collect())
    }
}
