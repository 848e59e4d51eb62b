//! Provider selection and completion options.

use docsage_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Sampling and output settings applied to every completion an engine makes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionOptions {
    /// Sampling temperature in [0, 1]
    pub temperature: f32,

    /// Upper bound on generated tokens, strictly positive
    pub max_output_tokens: u32,

    /// System prompt sent alongside each completion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<String>,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            max_output_tokens: 1000,
            system_instruction: None,
        }
    }
}

impl CompletionOptions {
    pub fn new(temperature: f32, max_output_tokens: u32) -> Self {
        Self {
            temperature,
            max_output_tokens,
            system_instruction: None,
        }
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    /// Check the ranges the completion capability accepts.
    pub fn validate(&self) -> AppResult<()> {
        if !(0.0..=1.0).contains(&self.temperature) || self.temperature.is_nan() {
            return Err(AppError::InvalidArgument(format!(
                "temperature must be within [0, 1], got {}",
                self.temperature
            )));
        }
        if self.max_output_tokens == 0 {
            return Err(AppError::InvalidArgument(
                "max_output_tokens must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Provider type enum for matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderType {
    OpenAI,
    Ollama,
}

impl ProviderType {
    /// Parse provider type from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Some(Self::OpenAI),
            "ollama" => Some(Self::Ollama),
            _ => None,
        }
    }

    /// Get the canonical provider name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::Ollama => "ollama",
        }
    }

    /// Endpoint used when the config does not name one.
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            Self::OpenAI => "https://api.openai.com/v1",
            Self::Ollama => "http://localhost:11434",
        }
    }
}
