//! In-process implementations of the storage and retrieval traits.

mod chat_store;
mod figure_catalog;
mod keyword_context;

pub use chat_store::MemoryChatStore;
pub use figure_catalog::MemoryFigureCatalog;
pub use keyword_context::KeywordContextStore;
