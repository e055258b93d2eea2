//! LLM adapters for histchat.
//!
//! Provides the OpenAI-compatible `CompletionService` used to answer guest
//! questions. OpenAI and OpenRouter share the `/chat/completions` wire format;
//! only the base URL and identification headers differ.

pub mod openai_completion_client;

pub use openai_completion_client::OpenAiCompletionClient;
