//! `SubtaskDecomposer` (C8): LLM-driven analysis that splits a complex
//! utterance into a dependency-ordered set of subtasks (spec §4.8).
//!
//! Grounded on `crates/gateway/src/runtime/tasks.rs` for the `Uuid`-keyed,
//! dependency-free task record shape (before subtasks gained ordering) and
//! on `sa-rag::classifier`'s "build prompt, call LLM, parse, fall back"
//! pipeline shape, reused here for decomposition instead of classification.

use std::collections::HashMap;
use std::sync::Arc;

use sa_catalog::ToolRegistry;
use sa_domain::config::DecomposerConfig;
use sa_domain::error::{Error, Result};
use sa_domain::model::{IntentDefinition, Subtask};
use sa_domain::tool::Message;
use sa_domain::trace::TraceEvent;
use sa_domain::ModelRole;
use sa_providers::{ChatRequest, LlmRouter};
use serde_json::Value;
use uuid::Uuid;

use crate::graph;
use crate::heuristics;

/// Session-derived context the caller hands in, mirroring `sa-rag`'s
/// `ClassifierContext` (no direct dependency on `sa-sessions` from here).
#[derive(Debug, Clone, Default)]
pub struct DecomposeContext {
    pub last_intent: Option<String>,
    pub cached_entities: HashMap<String, Value>,
}

/// One subtask as the LLM proposes it: `label` is a decomposition-local
/// handle (not the final `Uuid`) so the model can reference a sibling
/// subtask as a dependency before ids exist.
#[derive(Debug, Clone, serde::Deserialize)]
struct RawSubtask {
    label: String,
    action: String,
    #[serde(default)]
    entities: HashMap<String, Value>,
    #[serde(default)]
    depends_on: Vec<String>,
    #[serde(default)]
    priority: i32,
}

pub struct SubtaskDecomposer {
    router: Arc<LlmRouter>,
    tools: Arc<ToolRegistry>,
    config: DecomposerConfig,
}

impl SubtaskDecomposer {
    pub fn new(router: Arc<LlmRouter>, tools: Arc<ToolRegistry>, config: DecomposerConfig) -> Self {
        Self { router, tools, config }
    }

    /// `decompose(utterance, intent, entities, session_context) → [Subtask]`
    /// per spec §4.8. Always returns a structurally valid (acyclic,
    /// fully-resolved) subtask list, or a `DependencyError` — never a
    /// partial/invalid plan.
    pub async fn decompose(
        &self,
        session_id: Uuid,
        utterance: &str,
        intent: &IntentDefinition,
        entities: &HashMap<String, Value>,
        ctx: &DecomposeContext,
    ) -> Result<Vec<Subtask>> {
        if utterance.trim().is_empty() {
            return Err(Error::Validation("cannot decompose an empty utterance".into()));
        }

        let hints = heuristics::detect_connectors(utterance, &self.config);
        let raw = self.propose(utterance, intent, entities, ctx, &hints).await;

        let (subtasks, fallback_used) = match raw {
            Ok(subtasks) if !subtasks.is_empty() => (subtasks, false),
            _ => (self.single_subtask_fallback(intent, entities)?, true),
        };

        let validated = graph::validate(subtasks, |name| self.tools.lookup(name))?;

        TraceEvent::SubtasksDecomposed {
            session_id,
            subtask_count: validated.len(),
            fallback_used,
        }
        .emit();

        Ok(validated)
    }

    async fn propose(
        &self,
        utterance: &str,
        intent: &IntentDefinition,
        entities: &HashMap<String, Value>,
        ctx: &DecomposeContext,
        hints: &heuristics::ConnectorHints,
    ) -> Result<Vec<Subtask>> {
        let prompt = self.build_prompt(utterance, intent, entities, ctx, hints);
        let req = ChatRequest {
            messages: vec![
                Message::system(
                    "You decompose a user request into an ordered set of tool-action subtasks. \
                     Respond with a single JSON object: {\"subtasks\": [{\"label\": string, \
                     \"action\": \"plugin.action\", \"entities\": object, \"depends_on\": [label,...], \
                     \"priority\": integer}]}. Use `depends_on` to name sibling labels whose result \
                     this subtask needs before it can run. An empty `subtasks` array means the \
                     request is not decomposable.",
                ),
                Message::user(prompt),
            ],
            json_mode: true,
            temperature: Some(0.1),
            ..ChatRequest::default()
        };

        let response = self.router.chat_for_role("decompose", ModelRole::Planner, req).await?;
        let parsed: RawPlan = serde_json::from_str(response.content.trim())
            .map_err(|e| Error::Validation(format!("decomposition response was not valid JSON: {e}")))?;

        let mut raw = parsed.subtasks;
        if raw.len() > self.config.max_subtasks {
            tracing::warn!(
                proposed = raw.len(),
                cap = self.config.max_subtasks,
                "decomposition proposed more subtasks than max_subtasks, truncating"
            );
            raw.truncate(self.config.max_subtasks);
        }

        Ok(materialize(raw))
    }

    fn build_prompt(
        &self,
        utterance: &str,
        intent: &IntentDefinition,
        entities: &HashMap<String, Value>,
        ctx: &DecomposeContext,
        hints: &heuristics::ConnectorHints,
    ) -> String {
        let available_actions = self
            .tools
            .all()
            .into_iter()
            .map(|t| t.name)
            .collect::<Vec<_>>()
            .join(", ");

        let mut sections = vec![
            format!("Utterance: {utterance}"),
            format!("Primary intent: {} ({})", intent.id, intent.description),
            format!("Known entities: {}", serde_json::to_string(entities).unwrap_or_default()),
            format!("Available tool actions: [{available_actions}]"),
        ];
        if let Some(last) = &ctx.last_intent {
            sections.push(format!("Previous turn's intent: {last}"));
        }
        if let Some(hint) = hints.as_prompt_hint() {
            sections.push(format!("Ordering hint: {hint}"));
        }
        sections.join("\n")
    }

    /// Spec §4.8: "When the LLM returns nothing parseable, decomposer falls
    /// back to a single subtask whose action = `intent.tool_action` and
    /// entities = `entities`."
    fn single_subtask_fallback(
        &self,
        intent: &IntentDefinition,
        entities: &HashMap<String, Value>,
    ) -> Result<Vec<Subtask>> {
        if !self.config.enable_single_subtask_fallback {
            return Err(Error::Dependency(
                "decomposition returned nothing parseable and single-subtask fallback is disabled".into(),
            ));
        }
        let action = intent.tool_action.clone().ok_or_else(|| {
            Error::Dependency(format!(
                "decomposition returned nothing parseable and intent '{}' has no tool_action to fall back to",
                intent.id
            ))
        })?;
        Ok(vec![Subtask::new(action, entities.clone())])
    }
}

#[derive(Debug, Clone, serde::Deserialize, Default)]
struct RawPlan {
    #[serde(default)]
    subtasks: Vec<RawSubtask>,
}

/// Assigns real `Uuid`s to each raw subtask and resolves `depends_on` labels
/// into those ids. Labels that don't match a sibling are dropped here
/// (`graph::validate` would drop them too, as dangling ids, but resolving
/// the label mapping is this module's job since `graph` only knows `Uuid`s).
fn materialize(raw: Vec<RawSubtask>) -> Vec<Subtask> {
    let mut label_to_id: HashMap<String, Uuid> = HashMap::new();
    let mut subtasks: Vec<Subtask> = Vec::with_capacity(raw.len());

    for r in &raw {
        let mut s = Subtask::new(r.action.clone(), r.entities.clone());
        s.priority = r.priority;
        label_to_id.insert(r.label.clone(), s.id);
        subtasks.push(s);
    }

    for (s, r) in subtasks.iter_mut().zip(raw.iter()) {
        s.dependencies = r
            .depends_on
            .iter()
            .filter_map(|label| label_to_id.get(label).copied())
            .filter(|id| *id != s.id)
            .collect();
    }

    subtasks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn materialize_resolves_labels_to_uuids() {
        let raw = vec![
            RawSubtask { label: "weather".into(), action: "weather.query".into(), entities: HashMap::new(), depends_on: vec![], priority: 0 },
            RawSubtask { label: "alarm".into(), action: "alarm.set".into(), entities: HashMap::new(), depends_on: vec!["weather".into()], priority: 0 },
        ];
        let subtasks = materialize(raw);
        let weather_id = subtasks[0].id;
        assert_eq!(subtasks[1].dependencies, vec![weather_id]);
    }

    #[test]
    fn materialize_drops_self_reference() {
        let raw = vec![RawSubtask {
            label: "a".into(),
            action: "a.x".into(),
            entities: HashMap::new(),
            depends_on: vec!["a".into()],
            priority: 0,
        }];
        let subtasks = materialize(raw);
        assert!(subtasks[0].dependencies.is_empty());
    }

    #[test]
    fn materialize_drops_unknown_label() {
        let raw = vec![RawSubtask {
            label: "a".into(),
            action: "a.x".into(),
            entities: HashMap::new(),
            depends_on: vec!["ghost".into()],
            priority: 0,
        }];
        let subtasks = materialize(raw);
        assert!(subtasks[0].dependencies.is_empty());
    }
}
