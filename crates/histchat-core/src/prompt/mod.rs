//! Prompt assembly.
//!
//! # Module Structure
//!
//! - `compaction`: character-budgeted context block (`compact_context`)
//! - `assembler`: system instruction precedence and message ordering
//!   (`PromptAssembler`, `PromptBundle`)

mod assembler;
mod compaction;

pub use assembler::{
    CONTEXT_HEADER, ContextOrigin, GUIDE_INSTRUCTION, PromptAssembler, PromptBundle,
    system_instruction,
};
pub use compaction::{CompactedContext, DEFAULT_CONTEXT_BUDGET, SourceRef, compact_context};
