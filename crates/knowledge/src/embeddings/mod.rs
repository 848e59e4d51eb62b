//! Embedding generation.
//!
//! Providers turn text into fixed-dimension vectors. The identity of the
//! provider (name, model, dimensions) is recorded with every persisted index
//! so a store never mixes vectors from different embedding spaces.

pub mod config;
pub mod provider;
pub mod providers;

pub use config::{EmbeddingConfig, EmbeddingIdentity};
pub use provider::{create_provider, EmbeddingProvider};

use docsage_core::{AppError, AppResult};

/// Embed `texts` in batches of at most `batch_size`, preserving order.
///
/// `on_batch` receives the number of texts embedded so far.
pub async fn embed_in_batches(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
    batch_size: usize,
    mut on_batch: impl FnMut(usize),
) -> AppResult<Vec<Vec<f32>>> {
    let batch_size = batch_size.max(1);
    let mut embeddings = Vec::with_capacity(texts.len());

    for batch in texts.chunks(batch_size) {
        let vectors = provider.embed_batch(batch).await?;
        if vectors.len() != batch.len() {
            return Err(AppError::Knowledge(format!(
                "Embedding provider '{}' returned {} vectors for {} texts",
                provider.provider_name(),
                vectors.len(),
                batch.len()
            )));
        }
        embeddings.extend(vectors);
        on_batch(embeddings.len());
    }

    tracing::debug!(
        provider = provider.provider_name(),
        model = provider.model_name(),
        count = embeddings.len(),
        "Generated embeddings"
    );

    Ok(embeddings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::trigram::TrigramProvider;

    #[tokio::test]
    async fn test_embed_in_batches_preserves_order() {
        let provider = TrigramProvider::new(64);
        let texts: Vec<String> = (0..5).map(|i| format!("document number {}", i)).collect();

        let mut progress = Vec::new();
        let batched = embed_in_batches(&provider, &texts, 2, |done| progress.push(done))
            .await
            .unwrap();
        let direct = provider.embed_batch(&texts).await.unwrap();

        assert_eq!(batched, direct);
        assert_eq!(progress, vec![2, 4, 5]);
    }

    #[tokio::test]
    async fn test_embed_in_batches_empty() {
        let provider = TrigramProvider::new(64);
        let out = embed_in_batches(&provider, &[], 8, |_| {}).await.unwrap();
        assert!(out.is_empty());
    }
}
