//! Concrete embedding providers.

pub mod ollama;
pub mod openai;
pub mod trigram;
