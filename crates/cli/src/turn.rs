//! The single-turn pipeline (C1-C10 wired end to end): classify, weigh the
//! jury, fill slots, decompose and orchestrate, then fold the turn back into
//! session state.
//!
//! Grounded on `crates/gateway/src/runtime/turn.rs`'s classify-then-respond
//! shape, generalized with the voting, slot-filling and decomposition stages
//! the teacher's single-LLM turn never had.

use std::collections::HashMap;

use chrono::Utc;
use sa_decompose::DecomposeContext;
use sa_domain::interfaces::{ClassificationRequest, ConversationResponse, ExecutionSummary};
use sa_domain::model::{Agreement, Consensus, SessionState, Turn, Vote};
use sa_domain::{Decision, DecisionKind};
use sa_orchestrator::ExecutionStatus;
use sa_rag::classifier::ClassifierContext;
use sa_slotfill::SlotFillOutcome;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::bootstrap::App;

/// Key under `SessionContext::preferences` where per-slot ask-counts are
/// kept; slot filling is the only thing that needs this across turns and it
/// isn't worth a dedicated field on the session model for it.
const SLOT_ATTEMPTS_KEY: &str = "slot_attempts";

/// Runs one utterance through the full pipeline for `session_id` (or a fresh
/// session for `user_id` if `session_id` is `None`), returning the response
/// the caller should show the user.
pub async fn run_turn(
    app: &App,
    session_id: Option<Uuid>,
    user_id: &str,
    text: &str,
) -> anyhow::Result<ConversationResponse> {
    let (session, _is_new) = app.sessions.resolve_or_create(session_id, user_id);

    let classifier_ctx = ClassifierContext {
        last_intent: session.current_intent.clone(),
        cached_entities: session
            .context
            .entity_cache
            .iter()
            .map(|(k, v)| (k.clone(), value_to_string(v)))
            .collect(),
        intent_frequency: session.context.intent_frequency.clone(),
    };

    let request = ClassificationRequest {
        text: text.to_string(),
        session_id: Some(session.id),
        user_id: Some(user_id.to_string()),
        context_metadata: HashMap::new(),
        audio_metadata: None,
        max_examples: None,
        confidence_threshold: None,
        enable_fallback: None,
    };

    let classification = app.classifier.classify(&request, &classifier_ctx).await?;

    app.decisions.record(Decision {
        timestamp: Utc::now(),
        session_id: Some(session.id),
        kind: DecisionKind::RagClassification,
        intent: classification.intent_id.clone(),
        confidence: classification.confidence,
        method: "rag".to_string(),
        fallback_used: classification.fallback_used,
    });

    let consensus = if app.config.voting.enabled {
        let seed = Vote {
            juror_id: "rag-classifier".to_string(),
            intent: classification.intent_id.clone(),
            confidence: classification.confidence,
            entities: classification.entities.clone(),
            subtasks: Vec::new(),
            raw_text: classification.llm_response.clone(),
            weight: 0.0,
            timestamp: Utc::now(),
        };
        app.voting.run(text, Some(seed)).await?
    } else {
        Consensus {
            intent: classification.intent_id.clone(),
            confidence: classification.confidence,
            agreement: Agreement::Unanimous,
            method: "rag_only".to_string(),
            merged_entities: classification.entities.clone(),
            merged_subtasks: Vec::new(),
            rationale: classification.rationale.clone(),
        }
    };

    app.decisions.record(Decision {
        timestamp: Utc::now(),
        session_id: Some(session.id),
        kind: DecisionKind::Consensus,
        intent: consensus.intent.clone(),
        confidence: consensus.confidence,
        method: consensus.method.clone(),
        fallback_used: consensus.method == "single_llm_mode",
    });

    let Some(intent) = app.intents.lookup(&consensus.intent) else {
        let response_text = consensus
            .rationale
            .clone()
            .unwrap_or_else(|| format!("No known intent matched '{}'.", consensus.intent));
        let mut turn = Turn::new(text);
        turn.system_response = Some(response_text.clone());
        turn.detected_intent = Some(consensus.intent.clone());
        turn.confidence = Some(consensus.confidence);
        let session_after = app.sessions.push_turn(session.id, turn)?;
        return Ok(ConversationResponse {
            session_id: session.id,
            state: session_after.state,
            response_text,
            next_question: None,
            consensus,
            execution: None,
        });
    };

    let mut known_slots = session.slots.clone();
    for (k, v) in &consensus.merged_entities {
        known_slots.insert(k.clone(), v.clone());
    }

    let mut attempts = slot_attempts(&session.context.preferences);
    let mut next_question = None;
    let mut slot_state = SessionState::Active;

    loop {
        let outcome = app
            .slotfill
            .process(session.id, &intent, &known_slots, &session.context.entity_cache, text, &attempts)
            .await?;

        match outcome {
            SlotFillOutcome::AllFilled => break,
            SlotFillOutcome::Filled { slot, value, .. } => {
                known_slots.insert(slot, value);
            }
            SlotFillOutcome::AskUser { slot, question, attempt } => {
                attempts.insert(slot, attempt);
                next_question = Some(question);
                slot_state = SessionState::WaitingSlots;
                break;
            }
            SlotFillOutcome::AttemptsExhausted { slot } => {
                next_question = Some(format!(
                    "I still couldn't determine '{slot}' after repeated attempts, so I'm giving up on this request."
                ));
                slot_state = SessionState::Error;
                break;
            }
        }
    }

    if slot_state != SessionState::Active {
        app.sessions.update(session.id, |s| {
            s.slots = known_slots.clone();
            s.context.preferences.insert(SLOT_ATTEMPTS_KEY.to_string(), attempts_to_value(&attempts));
        })?;
        let session_after = app.sessions.transition(session.id, slot_state, "slot resolution")?;
        let response_text = next_question.clone().unwrap_or_default();
        let mut turn = Turn::new(text);
        turn.system_response = Some(response_text.clone());
        turn.detected_intent = Some(consensus.intent.clone());
        turn.confidence = Some(consensus.confidence);
        app.sessions.push_turn(session.id, turn)?;
        return Ok(ConversationResponse {
            session_id: session.id,
            state: session_after.state,
            response_text,
            next_question,
            consensus,
            execution: None,
        });
    }

    let (execution, final_state) = if intent.tool_action.is_some() {
        let decompose_ctx = DecomposeContext {
            last_intent: session.current_intent.clone(),
            cached_entities: known_slots.clone(),
        };
        let subtasks = app.decomposer.decompose(session.id, text, &intent, &known_slots, &decompose_ctx).await?;

        app.sessions.transition(session.id, SessionState::Executing, "dispatching subtasks")?;
        let cancel = CancellationToken::new();
        let outcome = app.orchestrator.execute(subtasks, cancel).await?;
        let state = match outcome.status {
            ExecutionStatus::Completed => SessionState::Completed,
            ExecutionStatus::Failed => SessionState::Error,
            ExecutionStatus::Cancelled => SessionState::Cancelled,
        };
        app.sessions.transition(session.id, state, "execution finished")?;

        (
            Some(ExecutionSummary { tracker_id: outcome.tracker_id, plan_levels: outcome.plan.levels.clone() }),
            state,
        )
    } else {
        (None, SessionState::Active)
    };

    app.sessions.update(session.id, |s| {
        s.slots = known_slots.clone();
        s.current_intent = Some(consensus.intent.clone());
        for (k, v) in &known_slots {
            s.context.entity_cache.insert(k.clone(), v.clone());
        }
        *s.context.intent_frequency.entry(consensus.intent.clone()).or_insert(0) += 1;
        s.context.preferences.remove(SLOT_ATTEMPTS_KEY);
    })?;

    let response_text =
        consensus.rationale.clone().unwrap_or_else(|| format!("Handled intent '{}'.", consensus.intent));

    let mut turn = Turn::new(text);
    turn.system_response = Some(response_text.clone());
    turn.detected_intent = Some(consensus.intent.clone());
    turn.confidence = Some(consensus.confidence);
    let session_after = app.sessions.push_turn(session.id, turn)?;

    let _ = final_state;
    Ok(ConversationResponse {
        session_id: session.id,
        state: session_after.state,
        response_text,
        next_question: None,
        consensus,
        execution,
    })
}

fn slot_attempts(preferences: &HashMap<String, Value>) -> HashMap<String, u32> {
    preferences
        .get(SLOT_ATTEMPTS_KEY)
        .and_then(|v| v.as_object())
        .map(|obj| obj.iter().filter_map(|(k, v)| v.as_u64().map(|n| (k.clone(), n as u32))).collect())
        .unwrap_or_default()
}

fn attempts_to_value(attempts: &HashMap<String, u32>) -> Value {
    Value::Object(attempts.iter().map(|(k, v)| (k.clone(), Value::from(*v))).collect())
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
