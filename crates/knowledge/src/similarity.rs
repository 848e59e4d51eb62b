//! Vector similarity search over fragments.

use crate::types::Fragment;

/// Ranks candidate fragments against a query vector.
///
/// Implementations must be deterministic for a fixed input. Results are
/// `(index into candidates, score)` pairs ordered by non-increasing score,
/// with scores in `[0, 1]`.
pub trait SimilaritySearch: Send + Sync {
    fn search(&self, query: &[f32], candidates: &[&Fragment], top_k: usize) -> Vec<(usize, f32)>;
}

/// Brute-force cosine similarity.
///
/// Cosine values are clamped into `[0, 1]`; opposite and orthogonal vectors
/// both score zero. Equal scores keep ingestion order.
#[derive(Debug, Default, Clone, Copy)]
pub struct CosineSearch;

impl SimilaritySearch for CosineSearch {
    fn search(&self, query: &[f32], candidates: &[&Fragment], top_k: usize) -> Vec<(usize, f32)> {
        let mut scored: Vec<(usize, f32)> = candidates
            .iter()
            .enumerate()
            .map(|(i, fragment)| (i, relevance(query, &fragment.embedding)))
            .collect();

        // sort_by is stable; ties fall back to ingestion position.
        scored.sort_by(|a, b| {
            b.1.total_cmp(&a.1)
                .then_with(|| candidates[a.0].position.cmp(&candidates[b.0].position))
        });
        scored.truncate(top_k);
        scored
    }
}

/// Cosine similarity mapped into `[0, 1]`.
pub fn relevance(a: &[f32], b: &[f32]) -> f32 {
    let score = cosine_similarity(a, b);
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

/// Calculate cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Metadata;

    fn fragment(position: u32, embedding: Vec<f32>) -> Fragment {
        Fragment {
            id: format!("f{}", position),
            document_id: "doc".to_string(),
            position,
            text: format!("fragment {}", position),
            embedding,
            metadata: Metadata::new(),
        }
    }

    #[test]
    fn test_cosine_similarity_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal_and_mismatched() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_relevance_clamps_negative() {
        assert_eq!(relevance(&[1.0, 0.0], &[-1.0, 0.0]), 0.0);
        assert_eq!(relevance(&[f32::NAN], &[1.0]), 0.0);
    }

    #[test]
    fn test_search_orders_by_score() {
        let fragments = vec![
            fragment(0, vec![0.0, 1.0]),
            fragment(1, vec![1.0, 0.0]),
            fragment(2, vec![0.7, 0.7]),
        ];
        let refs: Vec<&Fragment> = fragments.iter().collect();

        let ranked = CosineSearch.search(&[1.0, 0.0], &refs, 3);
        let order: Vec<usize> = ranked.iter().map(|(i, _)| *i).collect();
        assert_eq!(order, vec![1, 2, 0]);
        assert!(ranked.windows(2).all(|w| w[0].1 >= w[1].1));
    }

    #[test]
    fn test_search_ties_keep_ingestion_order() {
        let fragments = vec![
            fragment(5, vec![1.0, 0.0]),
            fragment(2, vec![1.0, 0.0]),
            fragment(9, vec![1.0, 0.0]),
        ];
        let refs: Vec<&Fragment> = fragments.iter().collect();

        let ranked = CosineSearch.search(&[1.0, 0.0], &refs, 2);
        let positions: Vec<u32> = ranked.iter().map(|(i, _)| refs[*i].position).collect();
        assert_eq!(positions, vec![2, 5]);
    }

    #[test]
    fn test_search_truncates_to_top_k() {
        let fragments: Vec<Fragment> = (0..10).map(|i| fragment(i, vec![1.0, i as f32])).collect();
        let refs: Vec<&Fragment> = fragments.iter().collect();
        assert_eq!(CosineSearch.search(&[1.0, 0.0], &refs, 4).len(), 4);
        assert_eq!(CosineSearch.search(&[1.0, 0.0], &refs, 40).len(), 10);
    }
}
