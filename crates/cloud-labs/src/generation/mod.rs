//! Context assembly and prompt templates for answer generation

pub mod prompt;

pub use prompt::PromptBuilder;
