//! The ten-signal confidence mix (spec §4.3 step 6).
//!
//! Grounded on `crates/providers/src/classifier.rs`'s `apply_thresholds` —
//! that function turned a single cosine score into a routing decision via a
//! handful of named adjustments; here the same idea is generalized to ten
//! named signals combined by a configurable weighted sum instead of a
//! hand-tuned if-else chain.

use sa_domain::config::ConfidenceWeights;

/// The ten inputs to the final-confidence computation, one field per named
/// signal, each normalised to `[0, 1]` before weighting.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfidenceSignals {
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

impl ConfidenceSignals {
    fn weighted_sum(&self, w: &ConfidenceWeights) -> f32 {
        self.llm_self_confidence * w.llm_self_confidence
            + self.mean_example_similarity * w.mean_example_similarity
            + self.intent_consistency * w.intent_consistency
            + self.example_count_factor * w.example_count_factor
            + self.semantic_diversity * w.semantic_diversity
            + self.temporal_factor * w.temporal_factor
            + self.embedding_quality * w.embedding_quality
            + self.similarity_entropy * w.similarity_entropy
            + self.contextual_factor * w.contextual_factor
            + self.prompt_robustness * w.prompt_robustness
    }

    /// Rewards a richer, more consistent retrieval set: scales the weighted
    /// mix down when few examples came back or those that did disagree
    /// with each other on embedding, so the classifier doesn't launder a
    /// confident-sounding LLM answer through a thin evidence base.
    fn composite_quality_factor(&self) -> f32 {
        let quality = (self.embedding_quality + self.semantic_diversity) / 2.0;
        (0.5 + 0.5 * quality).clamp(0.5, 1.0)
    }
}

/// Combine the ten signals per `weights` (normalised first so a
/// misconfigured weight set can't silently produce a confidence > 1), then
/// apply the composite quality factor and clamp to `[0, 1]`.
pub fn final_confidence(signals: &ConfidenceSignals, weights: &ConfidenceWeights) -> f32 {
    let normalised = weights.normalise();
    let mix = signals.weighted_sum(&normalised);
    (mix * signals.composite_quality_factor()).clamp(0.0, 1.0)
}

/// `1 - normalised standard deviation` of a set of similarity scores: a
/// tight cluster of scores (the top candidate clearly separated, or all
/// examples equally close) reads as higher embedding quality than a spread
/// where the ranking is closer to noise.
pub fn embedding_quality(scores: &[f32]) -> f32 {
    if scores.len() < 2 {
        return if scores.is_empty() { 0.0 } else { 1.0 };
    }
    let mean = scores.iter().sum::<f32>() / scores.len() as f32;
    let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f32>() / scores.len() as f32;
    (1.0 - variance.sqrt().min(1.0)).clamp(0.0, 1.0)
}

/// Shannon entropy of the score distribution, normalised to `[0, 1]` and
/// inverted so a peaky distribution (one dominant candidate) scores high
/// and a flat one (the classifier can't tell examples apart) scores low.
pub fn similarity_entropy(scores: &[f32]) -> f32 {
    let total: f32 = scores.iter().sum();
    if total <= f32::EPSILON || scores.len() < 2 {
        return if scores.len() == 1 { 1.0 } else { 0.0 };
    }
    let entropy: f32 = scores
        .iter()
        .map(|s| s / total)
        .filter(|p| *p > f32::EPSILON)
        .map(|p| -p * p.ln())
        .sum();
    let max_entropy = (scores.len() as f32).ln();
    if max_entropy <= f32::EPSILON {
        return 1.0;
    }
    (1.0 - entropy / max_entropy).clamp(0.0, 1.0)
}

/// Reward bounded processing time: full credit under `budget_ms`, linear
/// falloff to zero at `2 * budget_ms`.
pub fn temporal_factor(elapsed_ms: u64, budget_ms: u64) -> f32 {
    if budget_ms == 0 {
        return 1.0;
    }
    if elapsed_ms <= budget_ms {
        return 1.0;
    }
    let overrun = (elapsed_ms - budget_ms) as f32;
    (1.0 - overrun / budget_ms as f32).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_signals_yield_high_confidence() {
        let signals = ConfidenceSignals {
            llm_self_confidence: 1.0,
            mean_example_similarity: 1.0,
            intent_consistency: 1.0,
            example_count_factor: 1.0,
            semantic_diversity: 1.0,
            temporal_factor: 1.0,
            embedding_quality: 1.0,
            similarity_entropy: 1.0,
            contextual_factor: 1.0,
            prompt_robustness: 1.0,
        };
        let conf = final_confidence(&signals, &ConfidenceWeights::default());
        assert!((conf - 1.0).abs() < 1e-5);
    }

    #[test]
    fn zero_signals_yield_zero_confidence() {
        let signals = ConfidenceSignals::default();
        let conf = final_confidence(&signals, &ConfidenceWeights::default());
        assert_eq!(conf, 0.0);
    }

    #[test]
    fn thin_evidence_is_discounted_relative_to_rich_evidence() {
        let weak = ConfidenceSignals {
            llm_self_confidence: 0.9,
            embedding_quality: 0.0,
            semantic_diversity: 0.0,
            ..ConfidenceSignals::default()
        };
        let strong = ConfidenceSignals {
            llm_self_confidence: 0.9,
            embedding_quality: 1.0,
            semantic_diversity: 1.0,
            ..ConfidenceSignals::default()
        };
        let weights = ConfidenceWeights::default();
        assert!(final_confidence(&weak, &weights) < final_confidence(&strong, &weights));
    }

    #[test]
    fn embedding_quality_is_high_for_tight_cluster() {
        assert!(embedding_quality(&[0.8, 0.81, 0.79]) > embedding_quality(&[0.9, 0.1, 0.5]));
    }

    #[test]
    fn similarity_entropy_is_high_for_single_dominant_score() {
        assert!(similarity_entropy(&[0.9, 0.01, 0.01]) > similarity_entropy(&[0.3, 0.3, 0.3]));
    }

    #[test]
    fn temporal_factor_penalises_overrun() {
        assert_eq!(temporal_factor(100, 500), 1.0);
        assert!(temporal_factor(900, 500) < 1.0);
        assert_eq!(temporal_factor(1_000, 500), 0.0);
    }
}
