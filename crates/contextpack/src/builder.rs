use crate::injection;
use crate::report::{PromptReport, SectionReport};
use crate::strategy::{ExampleHit, PromptStrategy, SessionHints};
use crate::truncation::{self, Section};

/// Deterministic classification-prompt builder for the RAG classifier.
///
/// Pure function: accepts pre-retrieved examples and session hints, returns
/// the assembled prompt plus a machine-readable report of what went in.
pub struct PromptBuilder {
    pub max_per_section: usize,
    pub total_max: usize,
}

impl PromptBuilder {
    pub fn new(max_per_section: usize, total_max: usize) -> Self {
        Self {
            max_per_section,
            total_max,
        }
    }

    pub fn build(
        &self,
        utterance_text: &str,
        strategy: PromptStrategy,
        examples: &[ExampleHit],
        hints: &SessionHints,
        admissible_intents: &[String],
    ) -> (String, PromptReport) {
        let resolved = strategy.resolve(examples);

        let raw_sections = [
            ("utterance".to_string(), format!("utterance: \"{utterance_text}\"\n")),
            ("examples".to_string(), injection::format_examples(examples, resolved)),
            ("session_hints".to_string(), injection::format_session_hints(hints)),
            (
                "admissible_intents".to_string(),
                injection::format_admissible_intents(admissible_intents),
            ),
            ("instructions".to_string(), injection::format_instructions(resolved)),
        ];

        let mut sections: Vec<Section> = Vec::new();
        for (label, content) in raw_sections {
            if content.is_empty() {
                continue;
            }
            let raw_chars = content.len();
            let (truncated_content, was_truncated) =
                truncation::truncate_per_section(&content, self.max_per_section);
            sections.push(Section {
                label,
                content: truncated_content,
                raw_chars,
                truncated_per_section: was_truncated,
                truncated_total_cap: false,
                included: true,
            });
        }

        truncation::apply_total_cap(&mut sections, self.total_max);

        let mut assembled = String::new();
        let mut section_reports = Vec::new();
        for section in &sections {
            section_reports.push(SectionReport {
                label: section.label.clone(),
                raw_chars: section.raw_chars,
                injected_chars: if section.included { section.content.len() } else { 0 },
                truncated_per_section: section.truncated_per_section,
                truncated_total_cap: section.truncated_total_cap,
                included: section.included,
            });
            if section.included {
                assembled.push_str(&section.content);
                assembled.push('\n');
            }
        }

        let report = PromptReport {
            strategy: resolved,
            total_injected_chars: assembled.len(),
            example_count: examples.len(),
            sections: section_reports,
        };

        (assembled, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(score: f32) -> ExampleHit {
        ExampleHit {
            text: "what's the weather".into(),
            intent_id: "weather.get".into(),
            score,
            expert_domain: None,
        }
    }

    #[test]
    fn zero_shot_omits_examples_section() {
        let builder = PromptBuilder::new(4_000, 16_000);
        let (prompt, report) = builder.build(
            "hi",
            PromptStrategy::Adaptive,
            &[],
            &SessionHints::default(),
            &["weather.get".into()],
        );
        assert_eq!(report.strategy, PromptStrategy::ZeroShot);
        assert!(!prompt.contains("RETRIEVED_EXAMPLES"));
    }

    #[test]
    fn few_shot_includes_examples_section() {
        let builder = PromptBuilder::new(4_000, 16_000);
        let (prompt, report) = builder.build(
            "what's the weather",
            PromptStrategy::Adaptive,
            &[hit(0.9)],
            &SessionHints::default(),
            &["weather.get".into()],
        );
        assert_eq!(report.strategy, PromptStrategy::FewShot);
        assert!(prompt.contains("RETRIEVED_EXAMPLES"));
    }

    #[test]
    fn instructions_always_present() {
        let builder = PromptBuilder::new(4_000, 16_000);
        let (prompt, _) = builder.build(
            "hi",
            PromptStrategy::ZeroShot,
            &[],
            &SessionHints::default(),
            &["weather.get".into()],
        );
        assert!(prompt.contains("INSTRUCTIONS"));
        assert!(prompt.contains("confidence"));
    }

    #[test]
    fn total_cap_drops_trailing_sections() {
        let builder = PromptBuilder::new(4_000, 40);
        let (_, report) = builder.build(
            "hi",
            PromptStrategy::ZeroShot,
            &[],
            &SessionHints::default(),
            &["weather.get".into(), "alarm.set".into(), "music.play".into()],
        );
        assert!(report.sections.iter().any(|s| !s.included));
    }
}
