//! External interfaces (§6): the in-process request/response contracts that
//! cross component boundaries. Plain data — serialisable at the edges even
//! though, inside the core, nothing here leaves process memory.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::model::{AudioMetadata, Consensus, SessionState, Subtask};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Classification request/result (C4)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClassificationRequest {
    pub text: String,
    #[serde(default)]
    pub session_id: Option<Uuid>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub context_metadata: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub audio_metadata: Option<AudioMetadata>,
    /// Caller override of `IntentDefinition::max_rag_examples`.
    #[serde(default)]
    pub max_examples: Option<usize>,
    /// Caller override of `IntentDefinition::confidence_threshold`.
    #[serde(default)]
    pub confidence_threshold: Option<f32>,
    /// Caller override; `Some(false)` disables graded fallback entirely.
    #[serde(default)]
    pub enable_fallback: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub intent_id: String,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub intent_id: String,
    pub confidence: f32,
    #[serde(default)]
    pub ranked_candidates: Vec<RankedCandidate>,
    #[serde(default)]
    pub rag_examples_used: Vec<String>,
    pub prompt_used: String,
    pub llm_response: String,
    pub processing_time_ms: u64,
    pub fallback_used: bool,
    #[serde(default)]
    pub fallback_reason: Option<String>,
    #[serde(default)]
    pub metrics: HashMap<String, f32>,
    #[serde(default)]
    pub entities: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub rationale: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Conversation message response (top-level turn result)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationResponse {
    pub session_id: Uuid,
    pub state: SessionState,
    pub response_text: String,
    #[serde(default)]
    pub next_question: Option<String>,
    pub consensus: Consensus,
    #[serde(default)]
    pub execution: Option<ExecutionSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub tracker_id: Uuid,
    pub plan_levels: Vec<Vec<Subtask>>,
}
