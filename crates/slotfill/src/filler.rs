//! `SlotFiller` (C7): detects missing required slots, attempts to fill
//! them from the turn's text, an LLM extraction call, or the session
//! entity cache, and otherwise renders a question for the user.
//!
//! Grounded on `crates/domain/src/config/slotfill.rs` for the knobs and
//! `crates/gateway/src/runtime/turn.rs` for the general shape of a
//! single-LLM-call extraction step inside a larger turn loop.

use std::collections::HashMap;
use std::sync::Arc;

use sa_domain::config::SlotFillConfig;
use sa_domain::error::{Error, Result};
use sa_domain::model::{IntentDefinition, SlotDefinition};
use sa_domain::tool::Message;
use sa_domain::trace::TraceEvent;
use sa_domain::ModelRole;
use sa_providers::{ChatRequest, LlmRouter};
use serde_json::Value;
use uuid::Uuid;

use crate::extract;

#[derive(Debug, Clone, PartialEq)]
pub enum SlotFillOutcome {
    /// Every required slot is already present.
    AllFilled,
    /// A slot was resolved without user interaction.
    Filled { slot: String, value: Value, source: String },
    /// No automatic source resolved the slot; ask the user.
    AskUser { slot: String, question: String, attempt: u32 },
    /// The slot's attempt counter exceeded `max_attempts`.
    AttemptsExhausted { slot: String },
}

pub struct SlotFiller {
    router: Arc<LlmRouter>,
    config: SlotFillConfig,
}

impl SlotFiller {
    pub fn new(router: Arc<LlmRouter>, config: SlotFillConfig) -> Self {
        Self { router, config }
    }

    /// Required slots from `intent` not yet present (or present as JSON
    /// `null`) in `known_slots`, ordered by declared priority descending.
    pub fn missing_required_slots<'a>(
        &self,
        intent: &'a IntentDefinition,
        known_slots: &HashMap<String, Value>,
    ) -> Vec<&'a SlotDefinition> {
        let mut missing: Vec<&SlotDefinition> = intent
            .required_slots
            .iter()
            .filter(|s| !matches!(known_slots.get(&s.name), Some(v) if !v.is_null()))
            .collect();
        missing.sort_by(|a, b| b.priority.cmp(&a.priority));
        missing
    }

    /// Attempts to resolve the highest-priority missing slot for one turn.
    /// `attempts` tracks the per-slot question count across turns in the
    /// same session; the caller persists it on `SessionContext`.
    pub async fn process(
        &self,
        session_id: Uuid,
        intent: &IntentDefinition,
        known_slots: &HashMap<String, Value>,
        entity_cache: &HashMap<String, Value>,
        utterance: &str,
        attempts: &HashMap<String, u32>,
    ) -> Result<SlotFillOutcome> {
        let missing = self.missing_required_slots(intent, known_slots);
        let slot = match missing.first() {
            Some(s) => *s,
            None => return Ok(SlotFillOutcome::AllFilled),
        };

        if let Some(value) = extract::extract_via_regex(slot, utterance) {
            return Ok(self.filled(session_id, slot, value, "regex"));
        }

        if self.config.enable_llm_extraction {
            if let Some(value) = self.extract_via_llm(slot, utterance).await? {
                return Ok(self.filled(session_id, slot, value, "llm"));
            }
        }

        if self.config.enable_entity_cache {
            if let Some(value) = entity_cache.get(&slot.name) {
                return Ok(self.filled(session_id, slot, value.clone(), "entity_cache"));
            }
        }

        let attempt = attempts.get(&slot.name).copied().unwrap_or(0) + 1;
        if attempt > self.config.max_attempts {
            return Ok(SlotFillOutcome::AttemptsExhausted { slot: slot.name.clone() });
        }

        let question = render_question(intent, slot, known_slots);
        TraceEvent::SlotAsked {
            session_id,
            intent_id: intent.id.clone(),
            slot: slot.name.clone(),
            attempt,
        }
        .emit();
        Ok(SlotFillOutcome::AskUser {
            slot: slot.name.clone(),
            question,
            attempt,
        })
    }

    fn filled(&self, session_id: Uuid, slot: &SlotDefinition, value: Value, source: &str) -> SlotFillOutcome {
        TraceEvent::SlotFilled {
            session_id,
            slot: slot.name.clone(),
            source: source.to_string(),
        }
        .emit();
        SlotFillOutcome::Filled {
            slot: slot.name.clone(),
            value,
            source: source.to_string(),
        }
    }

    async fn extract_via_llm(&self, slot: &SlotDefinition, utterance: &str) -> Result<Option<Value>> {
        let schema_hint = match slot.slot_type {
            sa_domain::model::SlotType::Number => "a JSON number",
            sa_domain::model::SlotType::Boolean => "a JSON boolean",
            _ => "a short JSON string",
        };
        let req = ChatRequest {
            messages: vec![
                Message::system(format!(
                    "Extract the value of the slot \"{}\" from the user's message. \
                     Respond with a single JSON object: {{\"value\": {} or null}}. \
                     Use null if the slot is not present.",
                    slot.name, schema_hint
                )),
                Message::user(utterance.to_string()),
            ],
            json_mode: true,
            temperature: Some(0.0),
            ..ChatRequest::default()
        };

        let response = self.router.chat_for_role("slotfill", ModelRole::Executor, req).await?;
        let parsed: ExtractedValue = serde_json::from_str(response.content.trim())
            .map_err(|e| Error::Validation(format!("slot extraction response was not valid JSON: {e}")))?;
        Ok(parsed.value.filter(|v| !v.is_null()))
    }
}

#[derive(serde::Deserialize)]
struct ExtractedValue {
    value: Option<Value>,
}

/// Renders `intent.slot_questions[slot.name]`, substituting `{other_slot}`
/// placeholders from already-known slot values, or a generic fallback
/// question when no template is declared.
fn render_question(intent: &IntentDefinition, slot: &SlotDefinition, known_slots: &HashMap<String, Value>) -> String {
    let template = intent
        .slot_questions
        .get(&slot.name)
        .cloned()
        .unwrap_or_else(|| format!("What is the {}?", slot.name.replace('_', " ")));

    let mut rendered = template;
    for (key, value) in known_slots {
        let placeholder = format!("{{{key}}}");
        if rendered.contains(&placeholder) {
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            rendered = rendered.replace(&placeholder, &text);
        }
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use sa_domain::model::SlotType;

    fn intent_with_slot(slot: SlotDefinition) -> IntentDefinition {
        IntentDefinition {
            id: "weather.get".to_string(),
            description: String::new(),
            examples: vec![],
            required_slots: vec![slot],
            optional_slots: vec![],
            tool_action: None,
            expert_domain: None,
            confidence_threshold: 0.6,
            max_rag_examples: 5,
            slot_questions: HashMap::new(),
        }
    }

    fn city_slot() -> SlotDefinition {
        SlotDefinition {
            name: "city".to_string(),
            slot_type: SlotType::Text,
            extraction_patterns: vec![],
            enumeration: vec![],
            priority: 0,
        }
    }

    #[test]
    fn missing_required_slots_excludes_present_values() {
        let router = test_router();
        let filler = SlotFiller::new(router, SlotFillConfig::default());
        let intent = intent_with_slot(city_slot());
        let mut known = HashMap::new();
        assert_eq!(filler.missing_required_slots(&intent, &known).len(), 1);
        known.insert("city".to_string(), Value::String("boston".to_string()));
        assert_eq!(filler.missing_required_slots(&intent, &known).len(), 0);
    }

    #[test]
    fn null_slot_value_still_counts_as_missing() {
        let router = test_router();
        let filler = SlotFiller::new(router, SlotFillConfig::default());
        let intent = intent_with_slot(city_slot());
        let mut known = HashMap::new();
        known.insert("city".to_string(), Value::Null);
        assert_eq!(filler.missing_required_slots(&intent, &known).len(), 1);
    }

    #[test]
    fn render_question_falls_back_to_generic_template() {
        let intent = intent_with_slot(city_slot());
        let question = render_question(&intent, &intent.required_slots[0], &HashMap::new());
        assert_eq!(question, "What is the city?");
    }

    #[test]
    fn render_question_substitutes_known_slot_placeholder() {
        let mut intent = intent_with_slot(city_slot());
        intent.slot_questions.insert("city".to_string(), "Which city near {region}?".to_string());
        let mut known = HashMap::new();
        known.insert("region".to_string(), Value::String("New England".to_string()));
        let question = render_question(&intent, &intent.required_slots[0], &known);
        assert_eq!(question, "Which city near New England?");
    }

    fn test_router() -> Arc<LlmRouter> {
        use sa_domain::config::LlmConfig;
        Arc::new(LlmRouter::from_config(&LlmConfig::default()).unwrap())
    }
}
