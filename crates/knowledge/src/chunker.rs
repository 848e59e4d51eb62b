//! Splits document text into overlapping fragments.

use docsage_core::config::ChunkingConfig;
use docsage_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use text_splitter::{ChunkConfig, TextSplitter};

/// Chunking parameters, persisted with each index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingParams {
    /// Maximum fragment length in characters
    pub chunk_size: usize,
    /// Characters shared between neighbouring fragments
    pub chunk_overlap: usize,
}

impl Default for ChunkingParams {
    fn default() -> Self {
        Self::from(&ChunkingConfig::default())
    }
}

impl From<&ChunkingConfig> for ChunkingParams {
    fn from(config: &ChunkingConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
        }
    }
}

/// Boundary-aware splitter: prefers paragraph, then sentence, then word breaks.
pub struct Chunker {
    params: ChunkingParams,
    splitter: TextSplitter<text_splitter::Characters>,
}

impl Chunker {
    pub fn new(params: ChunkingParams) -> AppResult<Self> {
        if params.chunk_size == 0 {
            return Err(AppError::Config(
                "chunk size must be greater than zero".to_string(),
            ));
        }

        let config = ChunkConfig::new(params.chunk_size)
            .with_overlap(params.chunk_overlap)
            .map_err(|e| {
                AppError::Config(format!(
                    "invalid chunking (size {}, overlap {}): {}",
                    params.chunk_size, params.chunk_overlap, e
                ))
            })?;

        Ok(Self {
            params,
            splitter: TextSplitter::new(config),
        })
    }

    pub fn params(&self) -> ChunkingParams {
        self.params
    }

    /// Non-empty fragments of `text`, in order.
    pub fn split(&self, text: &str) -> Vec<String> {
        let chunks: Vec<String> = self
            .splitter
            .chunks(text)
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();

        tracing::trace!(
            chunks = chunks.len(),
            bytes = text.len(),
            size = self.params.chunk_size,
            overlap = self.params.chunk_overlap,
            "Split text"
        );
        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker(size: usize, overlap: usize) -> Chunker {
        Chunker::new(ChunkingParams {
            chunk_size: size,
            chunk_overlap: overlap,
        })
        .unwrap()
    }

    #[test]
    fn test_short_text_is_single_fragment() {
        let chunks = chunker(512, 64).split("A short paragraph.");
        assert_eq!(chunks, vec!["A short paragraph.".to_string()]);
    }

    #[test]
    fn test_fragments_respect_size() {
        let text = "This is a test sentence. ".repeat(100);
        let chunks = chunker(200, 50).split(&text);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= 200));
    }

    #[test]
    fn test_overlap_repeats_text() {
        let text = (0..60).map(|i| format!("word{}", i)).collect::<Vec<_>>().join(" ");
        let chunks = chunker(100, 30).split(&text);
        assert!(chunks.len() >= 2);
        let last_word_of_first = chunks[0].split_whitespace().last().unwrap();
        assert!(chunks[1].contains(last_word_of_first));
    }

    #[test]
    fn test_empty_text() {
        assert!(chunker(100, 10).split("   \n\n ").is_empty());
    }

    #[test]
    fn test_utf8_text() {
        let text = "Gamedex é um aplicativo 🎮 com acentuação: ã, õ, ç. ".repeat(50);
        let chunks = chunker(120, 20).split(&text);
        assert!(!chunks.is_empty());
    }

    #[test]
    fn test_invalid_overlap() {
        let err = Chunker::new(ChunkingParams {
            chunk_size: 100,
            chunk_overlap: 100,
        });
        assert!(err.is_err());
    }
}
