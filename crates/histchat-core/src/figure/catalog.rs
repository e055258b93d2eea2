//! Figure catalog trait.

use super::model::Figure;
use crate::error::Result;
use async_trait::async_trait;

/// Read-mostly lookup of historical figures by slug.
///
/// Implementations back the persona instructions and raw grounding documents
/// used when building prompts.
#[async_trait]
pub trait FigureCatalog: Send + Sync {
    /// Finds a figure by its unique slug.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Figure))`: Figure found
    /// - `Ok(None)`: No figure with that slug
    /// - `Err(_)`: Catalog could not be read
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Figure>>;

    /// Lists every figure in the catalog, ordered by slug.
    async fn list_all(&self) -> Result<Vec<Figure>>;
}
