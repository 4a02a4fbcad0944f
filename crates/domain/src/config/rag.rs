use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// RagClassifier (C4)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    #[serde(default = "d_max_examples")]
    pub max_examples: usize,
    #[serde(default = "d_true")]
    pub enable_fallback: bool,
    /// The ten-signal confidence mix. Must sum to 1; `ConfidenceWeights::normalise`
    /// rescales on load if it doesn't.
    #[serde(default)]
    pub confidence_weights: ConfidenceWeights,
    #[serde(default)]
    pub fallback: FallbackConfig,
}

fn d_true() -> bool {
    true
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            max_examples: d_max_examples(),
            enable_fallback: true,
            confidence_weights: ConfidenceWeights::default(),
            fallback: FallbackConfig::default(),
        }
    }
}

fn d_max_examples() -> usize {
    5
}

/// Weights for the ten confidence signals of the classification pipeline.
/// Order matches the specification: llm_self_confidence, mean_example_similarity,
/// intent_consistency, example_count_factor, semantic_diversity, temporal_factor,
/// embedding_quality, similarity_entropy, contextual_factor, prompt_robustness.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConfidenceWeights {
    pub llm_self_confidence: f32,
    pub mean_example_similarity: f32,
    pub intent_consistency: f32,
    pub example_count_factor: f32,
    pub semantic_diversity: f32,
    pub temporal_factor: f32,
    pub embedding_quality: f32,
    pub similarity_entropy: f32,
    pub contextual_factor: f32,
    pub prompt_robustness: f32,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            llm_self_confidence: 0.25,
            mean_example_similarity: 0.20,
            intent_consistency: 0.15,
            example_count_factor: 0.10,
            semantic_diversity: 0.10,
            temporal_factor: 0.05,
            embedding_quality: 0.05,
            similarity_entropy: 0.05,
            contextual_factor: 0.03,
            prompt_robustness: 0.02,
        }
    }
}

impl ConfidenceWeights {
    pub fn sum(&self) -> f32 {
        self.llm_self_confidence
            + self.mean_example_similarity
            + self.intent_consistency
            + self.example_count_factor
            + self.semantic_diversity
            + self.temporal_factor
            + self.embedding_quality
            + self.similarity_entropy
            + self.contextual_factor
            + self.prompt_robustness
    }

    /// Rescale weights proportionally so they sum to exactly 1.
    pub fn normalise(&self) -> Self {
        let total = self.sum();
        if total <= f32::EPSILON {
            return Self::default();
        }
        Self {
            llm_self_confidence: self.llm_self_confidence / total,
            mean_example_similarity: self.mean_example_similarity / total,
            intent_consistency: self.intent_consistency / total,
            example_count_factor: self.example_count_factor / total,
            semantic_diversity: self.semantic_diversity / total,
            temporal_factor: self.temporal_factor / total,
            embedding_quality: self.embedding_quality / total,
            similarity_entropy: self.similarity_entropy / total,
            contextual_factor: self.contextual_factor / total,
            prompt_robustness: self.prompt_robustness / total,
        }
    }
}

/// Parameters for the five-level graded fallback (§4.3.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    /// L1: `min_similarity` is multiplied by `1 - reduction_factor`.
    #[serde(default = "d_reduction_factor")]
    pub relaxed_reduction_factor: f32,
    #[serde(default = "d_l1_penalty")]
    pub relaxed_confidence_penalty: f32,
    #[serde(default = "d_l2_cap")]
    pub general_domain_confidence_cap: f32,
    #[serde(default = "d_l3_cap")]
    pub keyword_map_confidence_cap: f32,
    #[serde(default = "d_l4_cap")]
    pub contextual_confidence_cap: f32,
    #[serde(default = "d_l5_confidence")]
    pub generic_confidence: f32,
    #[serde(default = "d_fallback_intent")]
    pub fallback_intent: String,
    /// L3: fixed keyword → intent id lookup, tried before the L4 contextual
    /// step. Empty by default; deployments populate it from domain vocabulary.
    #[serde(default)]
    pub keyword_map: HashMap<String, String>,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            relaxed_reduction_factor: d_reduction_factor(),
            relaxed_confidence_penalty: d_l1_penalty(),
            general_domain_confidence_cap: d_l2_cap(),
            keyword_map_confidence_cap: d_l3_cap(),
            contextual_confidence_cap: d_l4_cap(),
            generic_confidence: d_l5_confidence(),
            fallback_intent: d_fallback_intent(),
            keyword_map: HashMap::new(),
        }
    }
}

fn d_reduction_factor() -> f32 {
    0.3
}
fn d_l1_penalty() -> f32 {
    0.2
}
fn d_l2_cap() -> f32 {
    0.40
}
fn d_l3_cap() -> f32 {
    0.50
}
fn d_l4_cap() -> f32 {
    0.45
}
fn d_l5_confidence() -> f32 {
    0.10
}
fn d_fallback_intent() -> String {
    "unknown".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_sum_to_one() {
        let w = ConfidenceWeights::default();
        assert!((w.sum() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn normalise_rescales_lopsided_weights() {
        let w = ConfidenceWeights {
            llm_self_confidence: 2.0,
            mean_example_similarity: 2.0,
            intent_consistency: 0.0,
            example_count_factor: 0.0,
            semantic_diversity: 0.0,
            temporal_factor: 0.0,
            embedding_quality: 0.0,
            similarity_entropy: 0.0,
            contextual_factor: 0.0,
            prompt_robustness: 0.0,
        };
        let normalised = w.normalise();
        assert!((normalised.sum() - 1.0).abs() < 1e-6);
        assert!((normalised.llm_self_confidence - 0.5).abs() < 1e-6);
    }
}
