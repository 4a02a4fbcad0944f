use serde::{Deserialize, Serialize};

/// One retrieved catalog example shown to the classifier LLM.
#[derive(Debug, Clone)]
pub struct ExampleHit {
    pub text: String,
    pub intent_id: String,
    pub score: f32,
    pub expert_domain: Option<String>,
}

/// Session-derived hints carried into the classification prompt.
#[derive(Debug, Clone, Default)]
pub struct SessionHints {
    pub last_intent: Option<String>,
    pub cached_entities: Vec<(String, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PromptStrategy {
    Adaptive,
    FewShot,
    ZeroShot,
    ChainOfThought,
    ExpertDomain,
}

impl Default for PromptStrategy {
    fn default() -> Self {
        PromptStrategy::Adaptive
    }
}

/// Similarity score, above which an example counts as "high-similarity"
/// for the purposes of adaptive strategy resolution.
pub const HIGH_SIMILARITY_THRESHOLD: f32 = 0.75;

impl PromptStrategy {
    /// Resolves `Adaptive` into the concrete strategy it stands for, given
    /// the examples actually retrieved. Non-adaptive strategies pass through
    /// unchanged, so callers can force a strategy for testing or debate
    /// rounds that want a consistent scaffold.
    pub fn resolve(self, examples: &[ExampleHit]) -> PromptStrategy {
        if self != PromptStrategy::Adaptive {
            return self;
        }
        if examples.is_empty() {
            return PromptStrategy::ZeroShot;
        }
        let shared_domain = examples[0].expert_domain.as_ref().filter(|d| {
            examples.iter().all(|e| e.expert_domain.as_deref() == Some(d.as_str()))
        });
        if shared_domain.is_some() {
            return PromptStrategy::ExpertDomain;
        }
        if examples.iter().any(|e| e.score >= HIGH_SIMILARITY_THRESHOLD) {
            return PromptStrategy::FewShot;
        }
        PromptStrategy::ZeroShot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(score: f32, domain: Option<&str>) -> ExampleHit {
        ExampleHit {
            text: "example".into(),
            intent_id: "weather.get".into(),
            score,
            expert_domain: domain.map(|d| d.to_string()),
        }
    }

    #[test]
    fn adaptive_with_no_examples_resolves_zero_shot() {
        assert_eq!(PromptStrategy::Adaptive.resolve(&[]), PromptStrategy::ZeroShot);
    }

    #[test]
    fn adaptive_with_shared_domain_resolves_expert_domain() {
        let examples = vec![hit(0.5, Some("smart_home")), hit(0.4, Some("smart_home"))];
        assert_eq!(
            PromptStrategy::Adaptive.resolve(&examples),
            PromptStrategy::ExpertDomain
        );
    }

    #[test]
    fn adaptive_with_high_similarity_resolves_few_shot() {
        let examples = vec![hit(0.9, None)];
        assert_eq!(PromptStrategy::Adaptive.resolve(&examples), PromptStrategy::FewShot);
    }

    #[test]
    fn adaptive_with_low_similarity_resolves_zero_shot() {
        let examples = vec![hit(0.4, None)];
        assert_eq!(PromptStrategy::Adaptive.resolve(&examples), PromptStrategy::ZeroShot);
    }

    #[test]
    fn non_adaptive_passes_through_unchanged() {
        assert_eq!(
            PromptStrategy::ChainOfThought.resolve(&[]),
            PromptStrategy::ChainOfThought
        );
    }
}
