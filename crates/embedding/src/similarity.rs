//! Vector similarity metrics. `cosine_similarity` is the grounding pattern
//! for every metric here — same clamp-and-zero-vector handling, generalised
//! to euclidean, manhattan, and the keyword-aware hybrid score.

use std::collections::HashSet;

/// Cosine similarity in `[-1, 1]`. A zero vector on either side scores `0.0`.
///
/// Mismatched dimensions are a fatal programming error (every vector in an
/// index is produced by the same embedder), so this panics rather than
/// silently scoring the pair `0.0` and masking the bug.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "cosine_similarity: dimension mismatch ({} vs {})", a.len(), b.len());
    if a.is_empty() {
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

fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "euclidean_distance: dimension mismatch ({} vs {})", a.len(), b.len());
    if a.is_empty() {
        return f32::MAX;
    }
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f32>().sqrt()
}

fn manhattan_distance(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "manhattan_distance: dimension mismatch ({} vs {})", a.len(), b.len());
    if a.is_empty() {
        return f32::MAX;
    }
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum()
}

/// `1 / (1 + d)` folds an unbounded distance into a `(0, 1]` score
/// comparable with cosine similarity, for euclidean and manhattan.
pub fn euclidean_score(a: &[f32], b: &[f32]) -> f32 {
    1.0 / (1.0 + euclidean_distance(a, b))
}

pub fn manhattan_score(a: &[f32], b: &[f32]) -> f32 {
    1.0 / (1.0 + manhattan_distance(a, b))
}

/// Fraction of query tokens that also appear in the document text,
/// case-insensitive, whitespace-tokenised.
pub fn keyword_overlap(query_text: &str, doc_text: &str) -> f32 {
    let query_tokens: HashSet<String> =
        query_text.split_whitespace().map(|t| t.to_lowercase()).collect();
    if query_tokens.is_empty() {
        return 0.0;
    }
    let doc_tokens: HashSet<String> =
        doc_text.split_whitespace().map(|t| t.to_lowercase()).collect();
    let overlap = query_tokens.intersection(&doc_tokens).count();
    overlap as f32 / query_tokens.len() as f32
}

/// `w_e * cosine(vec, doc.vec) + w_c * keyword_overlap(query_text, doc.text)`.
pub fn hybrid_score(
    query_vec: &[f32],
    doc_vec: &[f32],
    query_text: &str,
    doc_text: &str,
    embedding_weight: f32,
) -> f32 {
    let keyword_weight = 1.0 - embedding_weight;
    embedding_weight * cosine_similarity(query_vec, doc_vec)
        + keyword_weight * keyword_overlap(query_text, doc_text)
}

/// Element-wise average of a non-empty slice of same-dimension vectors.
pub fn compute_centroid(vectors: &[Vec<f32>]) -> Vec<f32> {
    if vectors.is_empty() {
        return Vec::new();
    }
    let dim = vectors[0].len();
    let mut centroid = vec![0.0f32; dim];
    for v in vectors {
        for (i, x) in v.iter().enumerate() {
            if i < dim {
                centroid[i] += x;
            }
        }
    }
    let n = vectors.len() as f32;
    for x in centroid.iter_mut() {
        *x /= n;
    }
    centroid
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_identical_vectors_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal_vectors_is_zero() {
        assert!((cosine_similarity(&[1.0, 0.0], &[0.0, 1.0])).abs() < 1e-6);
    }

    #[test]
    #[should_panic(expected = "dimension mismatch")]
    fn cosine_mismatched_lengths_panics() {
        cosine_similarity(&[1.0, 2.0], &[1.0]);
    }

    #[test]
    fn cosine_zero_vector_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn keyword_overlap_partial_match() {
        let score = keyword_overlap("qué tiempo hace en Madrid", "el tiempo en Madrid es soleado");
        assert!(score > 0.0 && score <= 1.0);
    }

    #[test]
    fn centroid_of_single_vector_is_itself() {
        let v = vec![vec![1.0, 2.0, 3.0]];
        assert_eq!(compute_centroid(&v), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn centroid_averages_element_wise() {
        let vectors = vec![vec![0.0, 0.0], vec![2.0, 4.0]];
        assert_eq!(compute_centroid(&vectors), vec![1.0, 2.0]);
    }

    #[test]
    fn euclidean_score_decreases_with_distance() {
        let close = euclidean_score(&[0.0, 0.0], &[0.1, 0.1]);
        let far = euclidean_score(&[0.0, 0.0], &[5.0, 5.0]);
        assert!(close > far);
    }
}
