use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SubtaskDecomposer (C8)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecomposerConfig {
    #[serde(default = "d_max_subtasks")]
    pub max_subtasks: usize,
    /// When the LLM returns nothing parseable, fall back to a single
    /// subtask whose action is `intent.tool_action`.
    #[serde(default = "d_true")]
    pub enable_single_subtask_fallback: bool,
    /// Connector keywords (any language) that hint at sequencing. Matched
    /// case-insensitively against the utterance during heuristic analysis.
    #[serde(default = "d_connectors")]
    pub sequence_connectors: Vec<String>,
    /// Keywords hinting at a conditional dependency ("if it rains...").
    #[serde(default = "d_conditionals")]
    pub conditional_connectors: Vec<String>,
}

impl Default for DecomposerConfig {
    fn default() -> Self {
        Self {
            max_subtasks: d_max_subtasks(),
            enable_single_subtask_fallback: true,
            sequence_connectors: d_connectors(),
            conditional_connectors: d_conditionals(),
        }
    }
}

fn d_max_subtasks() -> usize {
    8
}
fn d_true() -> bool {
    true
}
fn d_connectors() -> Vec<String> {
    vec!["y".into(), "and".into(), "luego".into(), "then".into(), "mientras".into(), "while".into()]
}
fn d_conditionals() -> Vec<String> {
    vec!["si".into(), "if".into()]
}
