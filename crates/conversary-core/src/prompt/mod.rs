//! Prompt composition: compiled templates and the deterministic renderer.

pub mod builder;
pub mod template;

pub use builder::PromptBuilder;
pub use template::PromptTemplates;
