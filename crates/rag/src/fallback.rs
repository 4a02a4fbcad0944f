//! The five-level graded fallback ladder, tried in order when the primary
//! classification falls under its intent's confidence threshold.
//!
//! Grounded on `crates/providers/src/classifier.rs`'s multi-tier routing
//! decision (a primary classification attempt with named, capped fallback
//! tiers below it) — generalised from a single relaxed-threshold retry into
//! the five named levels the RAG classifier needs.

use std::collections::HashMap;

use chrono::Timelike;
use sa_domain::config::FallbackConfig;
use sa_domain::trace::TraceEvent;
use sa_embedding::EmbeddingStore;

/// Outcome of a single fallback level, named so the caller can record which
/// level actually resolved the utterance.
#[derive(Debug, Clone)]
pub struct FallbackOutcome {
    pub intent_id: String,
    pub confidence: f32,
    pub level: u8,
    pub reason: String,
}

/// Tries each level in order and returns the first that resolves an intent.
/// Level 5 always resolves (it is the generic catch-all), so this never
/// returns `None` when `fallback.fallback_intent` is non-empty.
#[allow(clippy::too_many_arguments)]
pub fn resolve(
    store: &EmbeddingStore,
    query_vec: &[f32],
    query_text: &str,
    base_min_similarity: f32,
    intent_frequency: &HashMap<String, u32>,
    fallback: &FallbackConfig,
) -> Option<FallbackOutcome> {
    if let Some(outcome) = level1_relaxed_similarity(store, query_vec, query_text, base_min_similarity, fallback) {
        return Some(outcome);
    }
    if let Some(outcome) = level2_general_domain(query_text, fallback) {
        return Some(outcome);
    }
    if let Some(outcome) = level3_keyword_map(query_text, fallback) {
        return Some(outcome);
    }
    if let Some(outcome) = level4_contextual(intent_frequency, fallback) {
        return Some(outcome);
    }
    Some(level5_generic(fallback))
}

/// L1: re-run nearest-neighbour search with the similarity cutoff relaxed by
/// `relaxed_reduction_factor`, penalising the winning example's own score by
/// `relaxed_confidence_penalty`.
fn level1_relaxed_similarity(
    store: &EmbeddingStore,
    query_vec: &[f32],
    query_text: &str,
    base_min_similarity: f32,
    fallback: &FallbackConfig,
) -> Option<FallbackOutcome> {
    let relaxed_min = base_min_similarity * (1.0 - fallback.relaxed_reduction_factor);
    let hits = store.search(query_vec, query_text, 1, relaxed_min, None);
    let hit = hits.into_iter().next()?;
    let confidence = (hit.score - fallback.relaxed_confidence_penalty).max(0.0);
    Some(FallbackOutcome {
        intent_id: hit.document.intent_id,
        confidence,
        level: 1,
        reason: "relaxed similarity threshold".to_string(),
    })
}

/// Keyword sets for the four built-in general-domain intents (spec §4.3.1
/// L2), bilingual to match the Spanish/English utterances in the seed test
/// scenarios (spec §8). Order matters: checked top to bottom, first match
/// wins.
const GENERAL_DOMAIN_KEYWORDS: &[(&str, &[&str])] = &[
    ("thanks", &["thank", "thanks", "gracias", "te agradezco"]),
    ("farewell", &["bye", "goodbye", "see you", "adios", "adiós", "hasta luego", "chau"]),
    ("greeting", &["hello", "hi there", "hola", "buenos", "buenas", "good morning", "good evening"]),
    ("help", &["help", "ayuda", "ayudame", "what can you do", "qué puedes hacer"]),
];

/// L2: map to a small built-in set (help/greeting/thanks/farewell) by
/// keyword match; when the utterance matches the ambiguous "buenas"/"good"
/// salutation family under more than one category, a time-of-day hint picks
/// between greeting (day) and farewell (night) the way a human would read
/// "buenas" at 23:00 as a goodnight, not a hello.
fn level2_general_domain(query_text: &str, fallback: &FallbackConfig) -> Option<FallbackOutcome> {
    let lowered = query_text.to_lowercase();
    let matches: Vec<&str> =
        GENERAL_DOMAIN_KEYWORDS.iter().filter(|(_, kws)| kws.iter().any(|k| lowered.contains(k))).map(|(id, _)| *id).collect();

    let intent_id: &str = if matches.len() > 1 && matches.contains(&"greeting") && matches.contains(&"farewell") {
        if chrono::Utc::now().hour() >= 20 || chrono::Utc::now().hour() < 5 {
            "farewell"
        } else {
            "greeting"
        }
    } else {
        matches.first().copied()?
    };

    Some(FallbackOutcome {
        intent_id: intent_id.to_string(),
        confidence: fallback.general_domain_confidence_cap,
        level: 2,
        reason: format!("general domain keyword match: {intent_id}"),
    })
}

/// L3: fixed keyword → intent id lookup populated by deployment config.
fn level3_keyword_map(query_text: &str, fallback: &FallbackConfig) -> Option<FallbackOutcome> {
    let lowered = query_text.to_lowercase();
    for (keyword, intent_id) in &fallback.keyword_map {
        if lowered.contains(&keyword.to_lowercase()) {
            return Some(FallbackOutcome {
                intent_id: intent_id.clone(),
                confidence: fallback.keyword_map_confidence_cap,
                level: 3,
                reason: format!("keyword map hit: '{keyword}'"),
            });
        }
    }
    None
}

/// L4: fall back to the session's most frequently resolved prior intent.
fn level4_contextual(
    intent_frequency: &HashMap<String, u32>,
    fallback: &FallbackConfig,
) -> Option<FallbackOutcome> {
    let (intent_id, _) = intent_frequency.iter().max_by_key(|(_, count)| **count)?;
    Some(FallbackOutcome {
        intent_id: intent_id.clone(),
        confidence: fallback.contextual_confidence_cap,
        level: 4,
        reason: "session intent frequency".to_string(),
    })
}

/// L5: the generic catch-all, always resolves.
fn level5_generic(fallback: &FallbackConfig) -> FallbackOutcome {
    FallbackOutcome {
        intent_id: fallback.fallback_intent.clone(),
        confidence: fallback.generic_confidence,
        level: 5,
        reason: "generic fallback intent".to_string(),
    }
}

/// Emits the `RagClassified` trace event for a fallback resolution.
pub fn emit_trace(outcome: &FallbackOutcome) {
    TraceEvent::RagClassified {
        intent_id: outcome.intent_id.clone(),
        confidence: outcome.confidence,
        fallback_used: true,
        fallback_level: Some(outcome.level),
    }
    .emit();
}

#[cfg(test)]
mod tests {
    use super::*;
    use sa_domain::config::SimilarityMethod;
    use sa_domain::model::EmbeddingDocument;
    use uuid::Uuid;

    fn doc(intent: &str, vec: Vec<f32>) -> EmbeddingDocument {
        EmbeddingDocument {
            id: Uuid::new_v4(),
            text: "sample".to_string(),
            vector: vec,
            intent_id: intent.to_string(),
            metadata: HashMap::new(),
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn level1_relaxes_threshold_and_penalises_confidence() {
        let store = EmbeddingStore::new(SimilarityMethod::Cosine, 0.7, 0.92, 3, 0.0);
        store.add(doc("weather.get", vec![0.6, 0.8]));
        let fallback = FallbackConfig::default();
        let outcome =
            level1_relaxed_similarity(&store, &[1.0, 0.0], "q", 0.9, &fallback).unwrap();
        assert_eq!(outcome.intent_id, "weather.get");
        assert_eq!(outcome.level, 1);
    }

    #[test]
    fn level2_matches_builtin_greeting_keyword() {
        let fallback = FallbackConfig::default();
        let outcome = level2_general_domain("hola, buenos dias", &fallback).unwrap();
        assert_eq!(outcome.intent_id, "greeting");
        assert_eq!(outcome.confidence, fallback.general_domain_confidence_cap);
    }

    #[test]
    fn level2_matches_builtin_thanks_keyword() {
        let fallback = FallbackConfig::default();
        let outcome = level2_general_domain("thank you so much", &fallback).unwrap();
        assert_eq!(outcome.intent_id, "thanks");
    }

    #[test]
    fn level2_no_match_returns_none() {
        let fallback = FallbackConfig::default();
        assert!(level2_general_domain("set an alarm for 7am", &fallback).is_none());
    }

    #[test]
    fn level3_matches_configured_keyword() {
        let mut fallback = FallbackConfig::default();
        fallback.keyword_map.insert("alarm".to_string(), "alarm.set".to_string());
        let outcome = level3_keyword_map("wake me up with an alarm", &fallback).unwrap();
        assert_eq!(outcome.intent_id, "alarm.set");
    }

    #[test]
    fn level4_picks_most_frequent_session_intent() {
        let fallback = FallbackConfig::default();
        let mut freq = HashMap::new();
        freq.insert("weather.get".to_string(), 3u32);
        freq.insert("alarm.set".to_string(), 1u32);
        let outcome = level4_contextual(&freq, &fallback).unwrap();
        assert_eq!(outcome.intent_id, "weather.get");
    }

    #[test]
    fn resolve_always_terminates_at_level5() {
        let store = EmbeddingStore::new(SimilarityMethod::Cosine, 0.7, 0.92, 3, 0.0);
        let fallback = FallbackConfig::default();
        let outcome = resolve(&store, &[1.0, 0.0], "zzxxqq unmatched gibberish", 0.9, &HashMap::new(), &fallback)
            .unwrap();
        assert_eq!(outcome.level, 5);
        assert_eq!(outcome.intent_id, fallback.fallback_intent);
    }
}
