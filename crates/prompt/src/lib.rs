//! Prompt templates for docsage.
//!
//! - Built-in templates for answering, condensing, routing and evaluation
//! - Handlebars rendering in strict mode with partial application
//! - Workspace overrides loaded from YAML

pub mod builder;
pub mod defaults;
pub mod loader;
pub mod types;

pub use loader::{list_prompts, load_prompt, resolve_prompt};
pub use types::{PromptDefinition, PromptTemplate};
