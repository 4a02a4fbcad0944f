//! Structured trace events emitted at component boundaries.
//!
//! Each variant is serialised to JSON and logged as a single `tracing::info!`
//! field (`trace_event`), so a log pipeline can index on `event` without
//! parsing free-form messages.

use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    /// C1: a similarity search ran against the embedding store.
    EmbeddingSearch {
        intent_filter: Option<String>,
        k: usize,
        results: usize,
        empty_index: bool,
    },
    /// C2/C3: a registry snapshot was swapped after hot-reload.
    RegistryReloaded { registry: String, entry_count: usize },
    /// C4: the RAG classifier produced (or fell back to) a candidate.
    RagClassified {
        intent_id: String,
        confidence: f32,
        fallback_used: bool,
        fallback_level: Option<u8>,
    },
    /// Any component invoking an LLM (C4, C5, C7, C8).
    LlmRequest {
        component: String,
        provider: String,
        model: String,
        role: String,
        duration_ms: u64,
        prompt_tokens: Option<u32>,
        completion_tokens: Option<u32>,
    },
    /// A provider call failed over to the next configured fallback.
    LlmFallback {
        component: String,
        from_provider: String,
        from_model: String,
        to_provider: String,
        to_model: String,
        reason: String,
    },
    /// C5: one juror's vote was recorded (or it timed out / errored).
    JurorVoted {
        juror_id: String,
        intent: Option<String>,
        confidence: Option<f32>,
        skipped: bool,
        duration_ms: u64,
    },
    /// C5: a voting round (including debate rounds) concluded.
    VotingRoundCompleted {
        round: u32,
        valid_votes: usize,
        agreement: String,
    },
    /// C5: final consensus was reached, possibly via single-juror fallback.
    ConsensusReached {
        intent: String,
        confidence: f32,
        method: String,
        agreement: String,
    },
    /// C6: a session was created, resumed, or looked up.
    SessionResolved {
        session_id: Uuid,
        is_new: bool,
        state: String,
    },
    /// C6: the session state machine transitioned.
    SessionTransitioned {
        session_id: Uuid,
        from: String,
        to: String,
        reason: String,
    },
    /// C6: a session's history was compressed.
    SessionCompressed {
        session_id: Uuid,
        turns_collapsed: usize,
        compression_level: u32,
    },
    /// C6: TTL sweep deleted an expired session.
    SessionExpired { session_id: Uuid },
    /// C7: a clarifying question was emitted for a missing slot.
    SlotAsked {
        session_id: Uuid,
        intent_id: String,
        slot: String,
        attempt: u32,
    },
    /// C7: a slot was filled (from regex, LLM extraction, or entity cache).
    SlotFilled {
        session_id: Uuid,
        slot: String,
        source: String,
    },
    /// C8: an utterance was decomposed into subtasks.
    SubtasksDecomposed {
        session_id: Uuid,
        subtask_count: usize,
        fallback_used: bool,
    },
    /// C9: an execution plan was computed from a subtask list.
    PlanBuilt {
        execution_id: Uuid,
        level_count: usize,
        subtask_count: usize,
    },
    /// C9: a subtask was dispatched through the tool router.
    SubtaskDispatched {
        execution_id: Uuid,
        subtask_id: Uuid,
        action: String,
        attempt: u32,
    },
    /// C9: a subtask finished (successfully or not).
    SubtaskFinished {
        execution_id: Uuid,
        subtask_id: Uuid,
        status: String,
        duration_ms: u64,
    },
    /// C9: a circuit breaker changed state for a `(plugin, action)` pair.
    CircuitBreakerStateChanged {
        plugin: String,
        action: String,
        state: String,
    },
    /// C9: rollback was invoked after a failed execution.
    RollbackInvoked {
        execution_id: Uuid,
        subtask_id: Uuid,
        compensate_action: Option<String>,
    },
    /// C10: a progress notification was emitted for an execution.
    ProgressUpdated {
        execution_id: Uuid,
        completed: usize,
        total: usize,
        is_completed: bool,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "sa_event");
    }
}
