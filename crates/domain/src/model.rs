//! Core data model shared by every component (C1–C10).
//!
//! Field names and invariants follow the catalog/session/voting/execution
//! model used throughout the workspace. Types here are plain data — the
//! components that own them (`SessionStore` owns `Session`, `Orchestrator`
//! owns `ExecutionPlan`, etc.) live in their respective crates.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use chrono::{DateTime, Utc};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Utterance
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A single natural-language input, immutable for the turn it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Utterance {
    pub text: String,
    #[serde(default)]
    pub session_id: Option<Uuid>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub context_metadata: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub audio_metadata: Option<AudioMetadata>,
}

impl Utterance {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            session_id: None,
            user_id: None,
            context_metadata: HashMap::new(),
            audio_metadata: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Contextual metadata derived from an audio front-end. Opaque to the core.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AudioMetadata {
    pub location: Option<String>,
    pub temperature: Option<f64>,
    pub device_id: Option<String>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u8>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// EmbeddingDocument
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One exemplar in the vector index. All documents in a store share the
/// same vector dimension; enforcing that is the store's job, not this type's.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingDocument {
    pub id: Uuid,
    pub text: String,
    pub vector: Vec<f32>,
    pub intent_id: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl EmbeddingDocument {
    pub fn dimension(&self) -> usize {
        self.vector.len()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// IntentDefinition
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A declaratively-registered intent. `required_slots` and `optional_slots`
/// must be disjoint; enforced by `IntentCatalog` validation on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentDefinition {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub examples: Vec<String>,
    #[serde(default)]
    pub required_slots: Vec<SlotDefinition>,
    #[serde(default)]
    pub optional_slots: Vec<SlotDefinition>,
    /// Name of a `ToolAction` this intent resolves to (`plugin.action`), or
    /// `None` when the intent is purely informational.
    #[serde(default)]
    pub tool_action: Option<String>,
    #[serde(default)]
    pub expert_domain: Option<String>,
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
    #[serde(default = "default_max_rag_examples")]
    pub max_rag_examples: usize,
    /// Slot name → question template, with `{slot_name}` placeholders
    /// resolved from already-known slots.
    #[serde(default)]
    pub slot_questions: HashMap<String, String>,
}

fn default_confidence_threshold() -> f32 {
    0.6
}
fn default_max_rag_examples() -> usize {
    5
}

impl IntentDefinition {
    /// `required_slots ∩ optional_slots = ∅`.
    pub fn slots_disjoint(&self) -> bool {
        self.required_slots
            .iter()
            .all(|r| !self.optional_slots.iter().any(|o| o.name == r.name))
    }

    pub fn all_slots(&self) -> impl Iterator<Item = &SlotDefinition> {
        self.required_slots.iter().chain(self.optional_slots.iter())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotDefinition {
    pub name: String,
    #[serde(default)]
    pub slot_type: SlotType,
    /// Extraction hints, tried in order: regex patterns the filler may use
    /// before falling back to LLM extraction.
    #[serde(default)]
    pub extraction_patterns: Vec<String>,
    /// Optional fixed set of valid values (enum-style slots).
    #[serde(default)]
    pub enumeration: Vec<String>,
    #[serde(default)]
    pub priority: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SlotType {
    #[default]
    Text,
    Number,
    Date,
    Location,
    Enum,
    Boolean,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ToolAction / ToolResponse
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A declarative endpoint descriptor for one `plugin.action` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolAction {
    /// `plugin.action`, e.g. `"weather.query"`.
    pub name: String,
    pub transport: ToolTransport,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    pub input_schema: serde_json::Value,
    pub output_schema: serde_json::Value,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub auth: Option<ToolAuth>,
    /// Name of another registered action to invoke as a compensating step
    /// when this one must be rolled back. `None` when not compensable.
    #[serde(default)]
    pub compensate: Option<String>,
    /// Declares whether retries of this action are safe (no side effects
    /// repeat on retry). Non-idempotent actions are never retried.
    #[serde(default)]
    pub idempotent: bool,
}

impl ToolAction {
    pub fn plugin(&self) -> &str {
        self.name.split('.').next().unwrap_or(&self.name)
    }

    pub fn action(&self) -> &str {
        self.name.splitn(2, '.').nth(1).unwrap_or("")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolTransport {
    Http,
    Stdio,
    /// Dispatched in-process by `sa-tools`'s built-in exec/file-ops plugins
    /// rather than over the network or a child MCP server.
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolAuth {
    /// Name of an environment variable holding the credential. Never an
    /// inline secret value.
    pub env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_retry_max")]
    pub max: u32,
    #[serde(default = "default_backoff")]
    pub backoff: BackoffKind,
    #[serde(default = "default_min_ms")]
    pub min_ms: u64,
    #[serde(default = "default_max_ms")]
    pub max_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max: default_retry_max(),
            backoff: default_backoff(),
            min_ms: default_min_ms(),
            max_ms: default_max_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    Exponential,
    Fixed,
}

fn default_retry_max() -> u32 {
    3
}
fn default_backoff() -> BackoffKind {
    BackoffKind::Exponential
}
fn default_min_ms() -> u64 {
    200
}
fn default_max_ms() -> u64 {
    5_000
}
fn default_timeout_ms() -> u64 {
    10_000
}

/// Unified response envelope every tool dispatch normalises to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResponse {
    #[serde(rename = "type")]
    pub kind: ToolResponseKind,
    pub content: serde_json::Value,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub stream: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolResponseKind {
    Text,
    Image,
    Audio,
    ToolResult,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Vote / Consensus
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    pub juror_id: String,
    pub intent: String,
    pub confidence: f32,
    #[serde(default)]
    pub entities: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    #[serde(default)]
    pub raw_text: String,
    pub weight: f32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Agreement {
    Unanimous,
    Majority,
    Plurality,
    Split,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Consensus {
    pub intent: String,
    pub confidence: f32,
    pub agreement: Agreement,
    pub method: String,
    #[serde(default)]
    pub merged_entities: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub merged_subtasks: Vec<Subtask>,
    #[serde(default)]
    pub rationale: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session / Turn
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Active,
    WaitingSlots,
    Executing,
    Completed,
    Error,
    Paused,
    Cancelled,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub user_id: String,
    pub state: SessionState,
    #[serde(default)]
    pub history: Vec<Turn>,
    #[serde(default)]
    pub current_intent: Option<String>,
    #[serde(default)]
    pub slots: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub context: SessionContext,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    #[serde(default)]
    pub turn_count: usize,
    pub ttl_seconds: u64,
}

impl Session {
    pub fn new(user_id: impl Into<String>, ttl_seconds: u64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            state: SessionState::Active,
            history: Vec::new(),
            current_intent: None,
            slots: HashMap::new(),
            context: SessionContext::default(),
            created_at: now,
            updated_at: now,
            last_activity: now,
            turn_count: 0,
            ttl_seconds,
        }
    }

    /// `turn_count = |history|` invariant, recomputed defensively.
    pub fn invariant_turn_count_holds(&self) -> bool {
        self.turn_count == self.history.len()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let elapsed = now.signed_duration_since(self.last_activity);
        elapsed.num_seconds().max(0) as u64 >= self.ttl_seconds
    }

    pub fn push_turn(&mut self, turn: Turn) {
        self.history.push(turn);
        self.turn_count = self.history.len();
        self.updated_at = Utc::now();
        self.last_activity = self.updated_at;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SessionContext {
    #[serde(default)]
    pub preferences: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub intent_frequency: HashMap<String, u32>,
    #[serde(default)]
    pub entity_cache: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub compression_level: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub id: Uuid,
    pub user_message: String,
    #[serde(default)]
    pub system_response: Option<String>,
    #[serde(default)]
    pub detected_intent: Option<String>,
    #[serde(default)]
    pub confidence: Option<f32>,
    #[serde(default)]
    pub processing_time_ms: u64,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn new(user_message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_message: user_message.into(),
            system_response: None,
            detected_intent: None,
            confidence: None,
            processing_time_ms: 0,
            timestamp: Utc::now(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Subtask / ExecutionPlan
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtaskStatus {
    Pending,
    Executing,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subtask {
    pub id: Uuid,
    /// `plugin.action` name, resolved against the ToolRegistry.
    pub action: String,
    #[serde(default)]
    pub entities: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub dependencies: Vec<Uuid>,
    #[serde(default)]
    pub priority: i32,
    pub status: SubtaskStatus,
    #[serde(default)]
    pub retries: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub result: Option<ToolResponse>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

fn default_max_retries() -> u32 {
    3
}

impl Subtask {
    pub fn new(action: impl Into<String>, entities: HashMap<String, serde_json::Value>) -> Self {
        Self {
            id: Uuid::new_v4(),
            action: action.into(),
            entities,
            dependencies: Vec::new(),
            priority: 0,
            status: SubtaskStatus::Pending,
            retries: 0,
            max_retries: default_max_retries(),
            result: None,
            error: None,
            started_at: None,
            completed_at: None,
        }
    }

    /// Dedup key used when merging subtasks proposed by different jurors.
    pub fn merge_key(&self) -> String {
        let mut entity_keys: Vec<_> = self.entities.iter().collect();
        entity_keys.sort_by(|a, b| a.0.cmp(b.0));
        let entities_repr = entity_keys
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",");
        format!("{}|{}", self.action, entities_repr)
    }
}

/// Subtasks partitioned into topologically ordered parallel batches. Level
/// `k` depends only on levels `< k`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExecutionPlan {
    pub levels: Vec<Vec<Subtask>>,
}

impl ExecutionPlan {
    pub fn total_subtasks(&self) -> usize {
        self.levels.iter().map(|l| l.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.iter().all(|l| l.is_empty())
    }
}
