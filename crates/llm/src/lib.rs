//! LLM integration crate for docsage.
//!
//! A provider-agnostic interface for completions and streaming completions.
//!
//! # Providers
//! - **Ollama**: local runtime (default)
//! - **OpenAI**: chat completions API, or any compatible server
//!
//! # Example
//! ```no_run
//! use docsage_llm::{CompletionOptions, LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let options = CompletionOptions::new(0.2, 256);
//! let request = LlmRequest::new("Hello, world!", "llama3.2").with_options(&options);
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod types;

pub use client::{
    collect_text, LlmClient, LlmRequest, LlmResponse, LlmStream, LlmStreamChunk, LlmUsage,
};
pub use factory::create_client;
pub use providers::{OllamaClient, OpenAiClient};
pub use types::{CompletionOptions, ProviderType};
