//! Context compaction under a character budget.

use crate::context::ContextChunk;
use serde::Serialize;

/// Default character budget for the context block.
pub const DEFAULT_CONTEXT_BUDGET: usize = 4000;

const BLOCK_SEPARATOR: &str = "\n\n";
const DEFAULT_SOURCE_NAME: &str = "source";

/// Attribution for one block included in the context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceRef {
    pub source_name: String,
    pub source_url: Option<String>,
}

/// Output of `compact_context`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompactedContext {
    pub text: String,
    /// One entry per included block, in inclusion order
    pub sources: Vec<SourceRef>,
}

impl CompactedContext {
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Length of `text` in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Greedily joins `"[{source}] {text}"` blocks in ranked order.
///
/// Lengths are counted in characters and include the blank-line separators,
/// so the result never exceeds `budget`, with one exception: the first
/// block is always kept even if it alone is over budget. Blocks are never
/// cut, and blank chunks are skipped.
pub fn compact_context(chunks: &[ContextChunk], budget: usize) -> CompactedContext {
    let separator_len = BLOCK_SEPARATOR.chars().count();
    let mut compacted = CompactedContext::default();
    let mut used = 0usize;

    for chunk in chunks {
        let snippet = chunk.content.trim();
        if snippet.is_empty() {
            continue;
        }

        let source_name = chunk
            .source_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_SOURCE_NAME);
        let block = format!("[{source_name}] {snippet}");
        let block_len = block.chars().count();

        if compacted.is_empty() {
            used = block_len;
        } else {
            let cost = separator_len + block_len;
            if used + cost > budget {
                break;
            }
            compacted.text.push_str(BLOCK_SEPARATOR);
            used += cost;
        }

        compacted.text.push_str(&block);
        compacted.sources.push(SourceRef {
            source_name: source_name.to_string(),
            source_url: chunk.source_url.clone(),
        });
    }

    compacted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(source: &str, text: &str) -> ContextChunk {
        ContextChunk::new(text).with_source(source, Some(format!("https://example.org/{source}")))
    }

    #[test]
    fn test_empty_input_gives_empty_block() {
        let compacted = compact_context(&[], 100);
        assert!(compacted.is_empty());
        assert_eq!(compacted.text, "");
    }

    #[test]
    fn test_blocks_joined_in_rank_order() {
        let chunks = vec![chunk("a", "first"), chunk("b", "second")];
        let compacted = compact_context(&chunks, 1000);
        assert_eq!(compacted.text, "[a] first\n\n[b] second");
        let names: Vec<_> = compacted
            .sources
            .iter()
            .map(|s| s.source_name.as_str())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(
            compacted.sources[0].source_url.as_deref(),
            Some("https://example.org/a")
        );
    }

    #[test]
    fn test_stops_before_exceeding_budget() {
        // "[a] 12345" is 9 chars, separator 2, so two blocks need 20
        let chunks = vec![chunk("a", "12345"), chunk("b", "12345"), chunk("c", "1")];
        let compacted = compact_context(&chunks, 19);
        assert_eq!(compacted.text, "[a] 12345");
        assert_eq!(compacted.sources.len(), 1);

        let compacted = compact_context(&chunks, 20);
        assert_eq!(compacted.text, "[a] 12345\n\n[b] 12345");
        assert_eq!(compacted.char_len(), 20);
    }

    #[test]
    fn test_does_not_skip_ahead_after_overflow() {
        // Greedy stop: a later short block is not squeezed in
        let chunks = vec![chunk("a", "x"), chunk("b", &"y".repeat(50)), chunk("c", "z")];
        let compacted = compact_context(&chunks, 20);
        assert_eq!(compacted.text, "[a] x");
    }

    #[test]
    fn test_oversized_first_block_is_kept_alone() {
        let long = "l".repeat(500);
        let chunks = vec![chunk("big", &long), chunk("small", "s")];
        let compacted = compact_context(&chunks, 100);
        assert_eq!(compacted.text, format!("[big] {long}"));
        assert_eq!(compacted.sources.len(), 1);
        assert!(compacted.char_len() > 100);
    }

    #[test]
    fn test_blank_chunks_skipped_and_default_source_name() {
        let chunks = vec![
            ContextChunk::new("   "),
            ContextChunk::new("  trimmed text "),
        ];
        let compacted = compact_context(&chunks, 100);
        assert_eq!(compacted.text, "[source] trimmed text");
        assert_eq!(compacted.sources[0].source_name, "source");
        assert_eq!(compacted.sources[0].source_url, None);
    }

    #[test]
    fn test_duplicate_sources_are_all_recorded() {
        let chunks = vec![chunk("plutarch", "one"), chunk("plutarch", "two")];
        let compacted = compact_context(&chunks, 1000);
        assert_eq!(compacted.sources.len(), 2);
        assert_eq!(compacted.sources[0], compacted.sources[1]);
    }

    #[test]
    fn test_budget_counts_characters_not_bytes() {
        // "[é] ééé" is 7 chars but 11 bytes
        let chunks = vec![chunk("é", "ééé"), chunk("é", "ééé")];
        let compacted = compact_context(&chunks, 16);
        assert_eq!(compacted.sources.len(), 2);
        assert_eq!(compacted.char_len(), 16);
    }

    #[test]
    fn test_budget_property_over_many_sizes() {
        let chunks: Vec<_> = (1..30)
            .map(|i| chunk(&format!("s{i}"), &"w".repeat(i * 7)))
            .collect();
        for budget in [1usize, 10, 50, 120, 400, 1000, 4000] {
            let compacted = compact_context(&chunks, budget);
            let first_len = format!("[s1] {}", "w".repeat(7)).chars().count();
            if first_len > budget {
                assert_eq!(compacted.sources.len(), 1);
            } else {
                assert!(compacted.char_len() <= budget, "budget {budget}");
            }
        }
    }
}
