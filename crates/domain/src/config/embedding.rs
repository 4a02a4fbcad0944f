use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// EmbeddingStore (C1)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingStoreConfig {
    #[serde(default)]
    pub similarity: SimilarityMethod,
    /// `w_e` for the hybrid metric; `w_c = 1 - w_e`.
    #[serde(default = "d_hybrid_weight")]
    pub hybrid_embedding_weight: f32,
    #[serde(default = "d_min_similarity")]
    pub default_min_similarity: f32,
    /// Candidates whose pairwise similarity to an already-selected result
    /// exceeds this are dropped by the diversity filter.
    #[serde(default = "d_diversity_threshold")]
    pub diversity_threshold: f32,
    /// At most this many results per `intent_id` after clustering.
    #[serde(default = "d_max_cluster_size")]
    pub max_cluster_size: usize,
    /// Additive bonus applied when query tokens match doc keywords.
    #[serde(default = "d_semantic_boost")]
    pub semantic_boost: f32,
}

impl Default for EmbeddingStoreConfig {
    fn default() -> Self {
        Self {
            similarity: SimilarityMethod::Cosine,
            hybrid_embedding_weight: d_hybrid_weight(),
            default_min_similarity: d_min_similarity(),
            diversity_threshold: d_diversity_threshold(),
            max_cluster_size: d_max_cluster_size(),
            semantic_boost: d_semantic_boost(),
        }
    }
}

impl EmbeddingStoreConfig {
    pub fn hybrid_keyword_weight(&self) -> f32 {
        1.0 - self.hybrid_embedding_weight
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMethod {
    #[default]
    Cosine,
    Euclidean,
    Manhattan,
    Hybrid,
}

fn d_hybrid_weight() -> f32 {
    0.7
}
fn d_min_similarity() -> f32 {
    0.3
}
fn d_diversity_threshold() -> f32 {
    0.92
}
fn d_max_cluster_size() -> usize {
    3
}
fn d_semantic_boost() -> f32 {
    0.05
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hybrid_weights_sum_to_one() {
        let cfg = EmbeddingStoreConfig::default();
        assert!((cfg.hybrid_embedding_weight + cfg.hybrid_keyword_weight() - 1.0).abs() < 1e-6);
    }
}
