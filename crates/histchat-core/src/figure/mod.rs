//! Historical figure domain module.
//!
//! # Module Structure
//!
//! - `model`: `Figure` and its `GroundingDocument`s
//! - `catalog`: `FigureCatalog` trait for read-mostly figure lookup

mod catalog;
mod model;

pub use catalog::FigureCatalog;
pub use model::{Figure, GroundingDocument, INSTRUCTION_LABELS};
