use crate::strategy::{ExampleHit, PromptStrategy, SessionHints};

/// Format the retrieved-examples section. Empty for `ZeroShot`.
pub fn format_examples(examples: &[ExampleHit], strategy: PromptStrategy) -> String {
    if examples.is_empty() || strategy == PromptStrategy::ZeroShot {
        return String::new();
    }
    let mut out = String::from("=== RETRIEVED_EXAMPLES ===\n");
    for (i, ex) in examples.iter().enumerate() {
        out.push_str(&format!(
            "{}. intent={} score={:.3} text=\"{}\"\n",
            i + 1,
            ex.intent_id,
            ex.score,
            ex.text
        ));
    }
    out.push_str("=== END_RETRIEVED_EXAMPLES ===\n");
    out
}

/// Format session-derived hints: last intent and cached entity values.
pub fn format_session_hints(hints: &SessionHints) -> String {
    if hints.last_intent.is_none() && hints.cached_entities.is_empty() {
        return String::new();
    }
    let mut out = String::from("=== SESSION_HINTS ===\n");
    if let Some(last) = &hints.last_intent {
        out.push_str(&format!("last_intent: {last}\n"));
    }
    for (key, value) in &hints.cached_entities {
        out.push_str(&format!("cached_entity.{key}: {value}\n"));
    }
    out.push_str("=== END_SESSION_HINTS ===\n");
    out
}

/// Format the admissible-intents list the model may choose from.
pub fn format_admissible_intents(intents: &[String]) -> String {
    format!(
        "=== ADMISSIBLE_INTENTS ===\n{}\n=== END_ADMISSIBLE_INTENTS ===\n",
        intents.join("\n")
    )
}

/// Calibration instructions, varied per strategy — chain-of-thought asks
/// for an explicit reasoning trace before the verdict, the others don't.
pub fn format_instructions(strategy: PromptStrategy) -> String {
    let mut out = String::from(
        "=== INSTRUCTIONS ===\n\
         Choose exactly one intent id from ADMISSIBLE_INTENTS.\n\
         Report a calibrated confidence number in [0,1]: how likely is this\n\
         intent correct given the evidence, not how confident you feel.\n\
         Extract any entities mentioned in the utterance.\n",
    );
    if strategy == PromptStrategy::ChainOfThought {
        out.push_str(
            "Think step by step about which retrieved examples and session\n\
             hints support each candidate intent before committing to one.\n",
        );
    }
    if strategy == PromptStrategy::ExpertDomain {
        out.push_str(
            "The retrieved examples share a single expert domain; weigh that\n\
             domain's conventions heavily when interpreting ambiguous wording.\n",
        );
    }
    out.push_str(
        "Respond as JSON: {\"intent\": str, \"confidence\": number, \
         \"entities\": object, \"rationale\": str}.\n=== END_INSTRUCTIONS ===\n",
    );
    out
}
