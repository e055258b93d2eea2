//! Figure domain model.
//!
//! A figure carries two text projections that must stay separate: the
//! human-readable `description` shown in the UI, and the `persona_prompt`
//! used to instruct the model. Neither is ever derived from the other.

use serde::{Deserialize, Serialize};

/// Content-type labels that mark a grounding document as an instruction
/// block rather than reference material.
pub const INSTRUCTION_LABELS: [&str; 4] = ["instruction", "instructions", "persona", "system"];

/// A stored passage of reference text attached to a figure.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct GroundingDocument {
    /// Human-readable source name (e.g. "Plutarch, Life of Antony")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    /// Where the source can be consulted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    /// Free-form content label (e.g. "biography", "instruction")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// The passage text
    pub content: String,
    /// True when written by an editor rather than bulk ingestion
    #[serde(default)]
    pub is_manual: bool,
}

impl GroundingDocument {
    /// Returns true if this document is labelled as a system/persona
    /// instruction.
    pub fn is_instruction(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|label| {
                let label = label.trim().to_lowercase();
                INSTRUCTION_LABELS.contains(&label.as_str())
            })
            .unwrap_or(false)
    }
}

/// A historical figure a guest can converse with.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Figure {
    /// Unique slug (e.g. "cleopatra")
    pub slug: String,
    /// Display name
    pub name: String,
    /// UI description (short summary)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Persona instruction for prompt construction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub era: Option<String>,
    /// Grounding documents
    #[serde(default, rename = "document")]
    pub documents: Vec<GroundingDocument>,
}

impl Figure {
    pub fn new(slug: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            name: name.into(),
            description: None,
            persona_prompt: None,
            era: None,
            documents: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona_prompt = Some(persona.into());
        self
    }

    pub fn with_document(mut self, document: GroundingDocument) -> Self {
        self.documents.push(document);
        self
    }

    /// Text for UI display. Never used in prompts.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref().filter(|s| !s.trim().is_empty())
    }

    /// Persona instruction for the model. Never shown as a description.
    pub fn persona_instruction(&self) -> Option<&str> {
        self.persona_prompt
            .as_deref()
            .filter(|s| !s.trim().is_empty())
    }

    /// Instruction-labelled documents, in stored order.
    pub fn instruction_documents(&self) -> impl Iterator<Item = &GroundingDocument> {
        self.documents.iter().filter(|doc| doc.is_instruction())
    }

    /// Reference documents usable as fallback grounding context.
    pub fn reference_documents(&self) -> impl Iterator<Item = &GroundingDocument> {
        self.documents.iter().filter(|doc| !doc.is_instruction())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(content_type: &str, content: &str) -> GroundingDocument {
        GroundingDocument {
            content_type: Some(content_type.to_string()),
            content: content.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_description_and_persona_are_separate() {
        let figure = Figure::new("cleopatra", "Cleopatra")
            .with_description("Last active ruler of the Ptolemaic Kingdom.")
            .with_persona("You are Cleopatra.");

        assert_eq!(
            figure.description(),
            Some("Last active ruler of the Ptolemaic Kingdom.")
        );
        assert_eq!(figure.persona_instruction(), Some("You are Cleopatra."));

        let no_persona = Figure::new("x", "X").with_description("Shown in UI");
        assert_eq!(no_persona.persona_instruction(), None);
    }

    #[test]
    fn test_blank_persona_is_absent() {
        let figure = Figure::new("x", "X").with_persona("   ");
        assert_eq!(figure.persona_instruction(), None);
    }

    #[test]
    fn test_instruction_labels_are_case_insensitive() {
        assert!(doc(" System ", "be brief").is_instruction());
        assert!(doc("PERSONA", "speak formally").is_instruction());
        assert!(doc("instructions", "cite sources").is_instruction());
        assert!(!doc("biography", "born 69 BC").is_instruction());
        assert!(!GroundingDocument::default().is_instruction());
    }

    #[test]
    fn test_documents_partition() {
        let figure = Figure::new("x", "X")
            .with_document(doc("instruction", "a"))
            .with_document(doc("bio", "b"))
            .with_document(doc("system", "c"));

        let instructions: Vec<_> = figure
            .instruction_documents()
            .map(|d| d.content.as_str())
            .collect();
        let references: Vec<_> = figure
            .reference_documents()
            .map(|d| d.content.as_str())
            .collect();

        assert_eq!(instructions, vec!["a", "c"]);
        assert_eq!(references, vec!["b"]);
    }
}
