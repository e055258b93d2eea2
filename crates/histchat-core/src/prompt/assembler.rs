//! Prompt assembly.

use super::compaction::{CompactedContext, DEFAULT_CONTEXT_BUDGET, SourceRef, compact_context};
use crate::completion::{ChatMessage, ChatRole};
use crate::context::ContextChunk;
use crate::figure::Figure;
use serde::Serialize;

/// Instruction used when there is no figure at all.
pub const GUIDE_INSTRUCTION: &str = "You are a helpful and accurate historical guide. \
Answer clearly and concisely. If a fact is uncertain, say so.";

/// Prefix of the system message carrying the context block.
pub const CONTEXT_HEADER: &str = "Context for reference:\n";

/// Where the context block came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextOrigin {
    /// Ranked retrieval results
    Retrieved,
    /// The figure's stored reference documents
    FigureDocuments,
    /// No context block
    None,
}

/// An assembled prompt. Built fresh for every question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptBundle {
    /// System instruction, optional context, history, then the user turn
    pub messages: Vec<ChatMessage>,
    /// Attribution for every block in `context_block`, in inclusion order
    pub sources: Vec<SourceRef>,
    /// The compacted context text, without `CONTEXT_HEADER`
    pub context_block: Option<String>,
    pub context_origin: ContextOrigin,
}

impl PromptBundle {
    pub fn system_instruction(&self) -> &str {
        self.messages
            .first()
            .filter(|m| m.role == ChatRole::System)
            .map(|m| m.content.as_str())
            .unwrap_or_default()
    }
}

/// Builds bounded prompts from a figure, retrieved context and history.
///
/// Pure and deterministic: no I/O, no clocks, no randomness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptAssembler {
    context_budget: usize,
}

impl Default for PromptAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_CONTEXT_BUDGET)
    }
}

impl PromptAssembler {
    pub fn new(context_budget: usize) -> Self {
        Self { context_budget }
    }

    pub fn context_budget(&self) -> usize {
        self.context_budget
    }

    /// Assembles the prompt for one question.
    ///
    /// When `retrieved` yields no usable block the figure's reference
    /// documents are compacted instead; an empty result just means no
    /// context message.
    pub fn build(
        &self,
        figure: Option<&Figure>,
        user_message: &str,
        history: &[ChatMessage],
        retrieved: &[ContextChunk],
    ) -> PromptBundle {
        let (context, context_origin) = self.select_context(figure, retrieved);

        let mut messages = Vec::with_capacity(history.len() + 3);
        messages.push(ChatMessage::system(system_instruction(figure)));

        let context_block = if context.is_empty() {
            None
        } else {
            messages.push(ChatMessage::system(format!(
                "{CONTEXT_HEADER}{}",
                context.text
            )));
            Some(context.text)
        };

        messages.extend(history.iter().cloned());
        messages.push(ChatMessage::user(user_message));

        PromptBundle {
            messages,
            sources: context.sources,
            context_block,
            context_origin,
        }
    }

    fn select_context(
        &self,
        figure: Option<&Figure>,
        retrieved: &[ContextChunk],
    ) -> (CompactedContext, ContextOrigin) {
        let from_retrieval = compact_context(retrieved, self.context_budget);
        if !from_retrieval.is_empty() {
            return (from_retrieval, ContextOrigin::Retrieved);
        }

        let Some(figure) = figure else {
            return (CompactedContext::default(), ContextOrigin::None);
        };

        let fallback: Vec<ContextChunk> = figure
            .reference_documents()
            .map(ContextChunk::from)
            .collect();
        let from_documents = compact_context(&fallback, self.context_budget);
        if from_documents.is_empty() {
            (from_documents, ContextOrigin::None)
        } else {
            (from_documents, ContextOrigin::FigureDocuments)
        }
    }
}

/// Base instruction plus any instruction-labelled documents.
///
/// Precedence: the figure's persona verbatim, else a generic instruction
/// naming the figure, else `GUIDE_INSTRUCTION`. Instruction documents are
/// appended after a blank line and never replace the base.
pub fn system_instruction(figure: Option<&Figure>) -> String {
    let base = match figure {
        Some(figure) => match figure.persona_instruction() {
            Some(persona) => persona.to_string(),
            None => format!(
                "You are {}, a historical figure. Answer clearly, accurately, and concisely. \
                 If something is uncertain or debated, state that explicitly.",
                figure.name
            ),
        },
        None => GUIDE_INSTRUCTION.to_string(),
    };

    let extra: Vec<&str> = figure
        .into_iter()
        .flat_map(|f| f.instruction_documents())
        .map(|doc| doc.content.trim())
        .filter(|text| !text.is_empty())
        .collect();

    if extra.is_empty() {
        base
    } else {
        format!("{base}\n\n{}", extra.join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::figure::GroundingDocument;

    fn document(content_type: &str, source: &str, content: &str) -> GroundingDocument {
        GroundingDocument {
            source_name: Some(source.to_string()),
            source_url: None,
            content_type: Some(content_type.to_string()),
            content: content.to_string(),
            is_manual: true,
        }
    }

    #[test]
    fn test_persona_only_figure() {
        let figure = Figure::new("cleopatra", "Cleopatra").with_persona("You are Cleopatra.");
        let history = vec![
            ChatMessage::user("Who are you?"),
            ChatMessage::assistant("The Queen of Egypt."),
        ];

        let bundle = PromptAssembler::default().build(Some(&figure), "Tell me more", &history, &[]);

        let system_count = bundle
            .messages
            .iter()
            .filter(|m| m.role == ChatRole::System)
            .count();
        assert_eq!(system_count, 1);
        assert_eq!(bundle.messages[0], ChatMessage::system("You are Cleopatra."));
        assert_eq!(bundle.messages[1..3], history[..]);
        assert_eq!(bundle.messages[3], ChatMessage::user("Tell me more"));
        assert_eq!(bundle.messages.len(), 4);
        assert_eq!(bundle.context_block, None);
        assert_eq!(bundle.context_origin, ContextOrigin::None);
        assert!(bundle.sources.is_empty());
    }

    #[test]
    fn test_generic_instruction_without_persona() {
        let figure = Figure::new("ada", "Ada Lovelace").with_description("Mathematician");
        let instruction = system_instruction(Some(&figure));
        assert!(instruction.starts_with("You are Ada Lovelace, a historical figure."));
        assert!(!instruction.contains("Mathematician"));
    }

    #[test]
    fn test_guide_instruction_without_figure() {
        let bundle = PromptAssembler::default().build(None, "Hello", &[], &[]);
        assert_eq!(bundle.system_instruction(), GUIDE_INSTRUCTION);
        assert_eq!(bundle.messages.len(), 2);
    }

    #[test]
    fn test_instruction_documents_appended_not_substituted() {
        let figure = Figure::new("cleopatra", "Cleopatra")
            .with_persona("You are Cleopatra.")
            .with_document(document("instruction", "editor", "Speak in the first person."))
            .with_document(document("System", "editor", "Never break character."));

        assert_eq!(
            system_instruction(Some(&figure)),
            "You are Cleopatra.\n\nSpeak in the first person.\n\nNever break character."
        );
    }

    #[test]
    fn test_retrieved_context_preferred() {
        let figure = Figure::new("cleopatra", "Cleopatra")
            .with_document(document("bio", "stored", "Stored passage."));
        let retrieved = vec![
            ContextChunk::new("Retrieved passage.").with_source("plutarch", None),
        ];

        let bundle = PromptAssembler::default().build(Some(&figure), "Q", &[], &retrieved);

        assert_eq!(bundle.context_origin, ContextOrigin::Retrieved);
        assert_eq!(
            bundle.messages[1],
            ChatMessage::system("Context for reference:\n[plutarch] Retrieved passage.")
        );
        assert_eq!(bundle.sources.len(), 1);
        assert_eq!(bundle.sources[0].source_name, "plutarch");
    }

    #[test]
    fn test_falls_back_to_reference_documents() {
        let figure = Figure::new("cleopatra", "Cleopatra")
            .with_persona("You are Cleopatra.")
            .with_document(document("persona", "editor", "Be regal."))
            .with_document(document("bio", "britannica", "Born 69 BC."));

        let bundle = PromptAssembler::default().build(Some(&figure), "Q", &[], &[]);

        assert_eq!(bundle.context_origin, ContextOrigin::FigureDocuments);
        assert_eq!(bundle.context_block.as_deref(), Some("[britannica] Born 69 BC."));
        // instruction documents are not repeated as context
        assert!(!bundle.context_block.as_deref().unwrap().contains("Be regal"));
        assert_eq!(bundle.system_instruction(), "You are Cleopatra.\n\nBe regal.");
    }

    #[test]
    fn test_blank_retrieval_results_trigger_fallback() {
        let figure =
            Figure::new("x", "X").with_document(document("bio", "stored", "Stored passage."));
        let retrieved = vec![ContextChunk::new("  ")];
        let bundle = PromptAssembler::default().build(Some(&figure), "Q", &[], &retrieved);
        assert_eq!(bundle.context_origin, ContextOrigin::FigureDocuments);
    }

    #[test]
    fn test_context_block_respects_budget() {
        let retrieved: Vec<_> = (0..20)
            .map(|i| ContextChunk::new("x".repeat(40)).with_source(format!("s{i}"), None))
            .collect();
        let assembler = PromptAssembler::new(200);
        let bundle = assembler.build(None, "Q", &[], &retrieved);

        let block = bundle.context_block.unwrap();
        assert!(block.chars().count() <= 200);
        assert_eq!(bundle.sources.len(), block.split("\n\n").count());
    }

    #[test]
    fn test_build_is_deterministic() {
        let figure = Figure::new("x", "X").with_document(document("bio", "a", "text"));
        let assembler = PromptAssembler::default();
        let first = assembler.build(Some(&figure), "Q", &[], &[]);
        let second = assembler.build(Some(&figure), "Q", &[], &[]);
        assert_eq!(first, second);
    }
}
