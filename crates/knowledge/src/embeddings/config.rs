//! Embedding configuration and identity.

use docsage_core::{AppConfig, AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Settings needed to construct an embedding provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    /// Provider name: "trigram", "openai", "ollama"
    pub provider: String,

    /// Model identifier (provider-specific)
    pub model: String,

    /// Embedding vector dimensions
    pub dimensions: usize,

    /// Maximum batch size for embedding requests
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Base URL override for HTTP providers
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(skip)]
    pub api_key: Option<String>,
}

fn default_batch_size() -> usize {
    32
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "trigram".to_string(),
            model: "trigram-v1".to_string(),
            dimensions: 384,
            batch_size: default_batch_size(),
            endpoint: None,
            api_key: None,
        }
    }
}

impl EmbeddingConfig {
    /// Derive embedding settings from the application config.
    pub fn from_app_config(config: &AppConfig) -> Self {
        let settings = &config.embedding;
        let model = config
            .embedding_model()
            .unwrap_or_else(|| default_model(&settings.provider).to_string());

        Self {
            provider: settings.provider.clone(),
            model,
            dimensions: settings.dimensions,
            batch_size: settings.batch_size,
            endpoint: config.provider_endpoint(&settings.provider),
            api_key: config.resolve_api_key(&settings.provider),
        }
    }

    pub fn identity(&self) -> EmbeddingIdentity {
        EmbeddingIdentity {
            provider: self.provider.clone(),
            model: self.model.clone(),
            dimensions: self.dimensions,
        }
    }
}

fn default_model(provider: &str) -> &'static str {
    match provider {
        "openai" => "text-embedding-3-small",
        "ollama" => "nomic-embed-text",
        _ => "trigram-v1",
    }
}

/// Which embedding space a set of vectors lives in.
///
/// Recorded with each persisted index and checked on load.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmbeddingIdentity {
    pub provider: String,
    pub model: String,
    pub dimensions: usize,
}

impl EmbeddingIdentity {
    /// Validate that another identity is consistent with this one.
    pub fn validate_consistency(&self, other: &Self) -> AppResult<()> {
        if self.provider != other.provider {
            return Err(AppError::Knowledge(format!(
                "Provider mismatch: expected '{}', got '{}'",
                self.provider, other.provider
            )));
        }

        if self.model != other.model {
            return Err(AppError::Knowledge(format!(
                "Model mismatch: expected '{}', got '{}'",
                self.model, other.model
            )));
        }

        if self.dimensions != other.dimensions {
            return Err(AppError::Knowledge(format!(
                "Dimension mismatch: expected {}, got {}",
                self.dimensions, other.dimensions
            )));
        }

        Ok(())
    }
}
