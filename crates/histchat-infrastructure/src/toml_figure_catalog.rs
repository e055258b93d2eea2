//! TOML-based FigureCatalog implementation.
//!
//! ```toml
//! [[figure]]
//! slug = "cleopatra"
//! name = "Cleopatra VII"
//! persona_prompt = "You are Cleopatra..."
//!
//! [[figure.document]]
//! source_name = "Plutarch, Life of Antony"
//! content_type = "biography"
//! content = "..."
//! ```

use crate::paths::HistchatPaths;
use crate::storage::AtomicTomlFile;
use async_trait::async_trait;
use histchat_core::error::{HistchatError, Result};
use histchat_core::figure::{Figure, FigureCatalog};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::RwLock;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct FigureFile {
    #[serde(default, rename = "figure")]
    figures: Vec<Figure>,
}

/// A figure catalog stored in `figures.toml`.
///
/// Responsibilities:
/// - Load figures once and serve lookups from memory
/// - Upsert/remove figures through atomic, locked rewrites
///
/// Does NOT:
/// - Watch the file for external edits (call `reload`)
pub struct TomlFigureCatalog {
    file: AtomicTomlFile<FigureFile>,
    cache: RwLock<Option<Vec<Figure>>>,
}

impl TomlFigureCatalog {
    /// Creates a catalog at the default path (`~/.config/histchat/figures.toml`).
    pub fn new() -> Result<Self> {
        Ok(Self::with_path(HistchatPaths::figures_file()?))
    }

    /// Creates a catalog with a custom path (for testing).
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            file: AtomicTomlFile::new(path),
            cache: RwLock::new(None),
        }
    }

    /// Drops the in-memory copy so the next lookup re-reads the file.
    pub fn reload(&self) -> Result<()> {
        *self.cache.write().map_err(poisoned)? = None;
        Ok(())
    }

    /// Inserts or replaces the figure with the same slug.
    pub fn upsert(&self, figure: Figure) -> Result<()> {
        if figure.slug.trim().is_empty() {
            return Err(HistchatError::config("Figure slug must not be empty"));
        }

        let slug = figure.slug.clone();
        let figures = self.file.update(FigureFile::default(), |data| {
            match data.figures.iter().position(|f| f.slug == figure.slug) {
                Some(index) => data.figures[index] = figure,
                None => data.figures.push(figure),
            }
            Ok(data.figures.clone())
        })?;

        tracing::info!("Saved figure '{}' ({} in catalog)", slug, figures.len());
        *self.cache.write().map_err(poisoned)? = Some(figures);
        Ok(())
    }

    /// Removes a figure by slug.
    ///
    /// Returns `NotFound` when no figure has that slug.
    pub fn remove(&self, slug: &str) -> Result<()> {
        let figures = self.file.update(FigureFile::default(), |data| {
            let before = data.figures.len();
            data.figures.retain(|f| f.slug != slug);
            if data.figures.len() == before {
                return Err(HistchatError::not_found("figure", slug));
            }
            Ok(data.figures.clone())
        })?;

        tracing::info!("Removed figure '{}'", slug);
        *self.cache.write().map_err(poisoned)? = Some(figures);
        Ok(())
    }

    fn figures(&self) -> Result<Vec<Figure>> {
        if let Some(figures) = self.cache.read().map_err(poisoned)?.as_ref() {
            return Ok(figures.clone());
        }

        let figures = self.file.load()?.unwrap_or_default().figures;
        tracing::debug!(
            "Loaded {} figures from {}",
            figures.len(),
            self.file.path().display()
        );
        *self.cache.write().map_err(poisoned)? = Some(figures.clone());
        Ok(figures)
    }
}

fn poisoned<T>(_: T) -> HistchatError {
    HistchatError::internal("figure cache lock poisoned")
}

#[async_trait]
impl FigureCatalog for TomlFigureCatalog {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Figure>> {
        Ok(self.figures()?.into_iter().find(|f| f.slug == slug))
    }

    async fn list_all(&self) -> Result<Vec<Figure>> {
        let mut figures = self.figures()?;
        figures.sort_by(|a, b| a.slug.cmp(&b.slug));
        Ok(figures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use histchat_core::figure::GroundingDocument;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_reads_figures_and_documents() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("figures.toml");
        fs::write(
            &path,
            r#"
[[figure]]
slug = "cleopatra"
name = "Cleopatra VII"
persona_prompt = "You are Cleopatra."

[[figure.document]]
source_name = "Plutarch"
content_type = "biography"
content = "Last active ruler of the Ptolemaic Kingdom."

[[figure]]
slug = "ada"
name = "Ada Lovelace"
"#,
        )
        .unwrap();

        let catalog = TomlFigureCatalog::with_path(path);
        let cleopatra = catalog.find_by_slug("cleopatra").await.unwrap().unwrap();
        assert_eq!(cleopatra.persona_instruction(), Some("You are Cleopatra."));
        assert_eq!(cleopatra.documents.len(), 1);
        assert!(!cleopatra.documents[0].is_manual);

        let slugs: Vec<_> = catalog
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.slug)
            .collect();
        assert_eq!(slugs, vec!["ada", "cleopatra"]);
        assert!(catalog.find_by_slug("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_and_remove_persist() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("figures.toml");
        let catalog = TomlFigureCatalog::with_path(path.clone());

        catalog
            .upsert(Figure::new("ada", "Ada").with_document(GroundingDocument {
                content: "Wrote the first program.".to_string(),
                is_manual: true,
                ..Default::default()
            }))
            .unwrap();
        catalog
            .upsert(Figure::new("ada", "Ada Lovelace"))
            .unwrap();

        let reopened = TomlFigureCatalog::with_path(path);
        let all = reopened.list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "Ada Lovelace");

        reopened.remove("ada").unwrap();
        assert!(reopened.list_all().await.unwrap().is_empty());
        assert!(reopened.remove("ada").unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_catalog() {
        let temp_dir = TempDir::new().unwrap();
        let catalog = TomlFigureCatalog::with_path(temp_dir.path().join("figures.toml"));
        assert!(catalog.list_all().await.unwrap().is_empty());
        assert!(catalog.upsert(Figure::new(" ", "Blank")).is_err());
    }
}
