use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SlotFiller (C7)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotFillConfig {
    /// Exceeding this many extraction attempts for a single slot surfaces
    /// an error rather than re-asking indefinitely.
    #[serde(default = "d_max_attempts")]
    pub max_attempts: u32,
    /// Whether LLM extraction is attempted when regex patterns miss.
    #[serde(default = "d_true")]
    pub enable_llm_extraction: bool,
    /// Whether the session entity cache is consulted before asking.
    #[serde(default = "d_true")]
    pub enable_entity_cache: bool,
}

impl Default for SlotFillConfig {
    fn default() -> Self {
        Self {
            max_attempts: d_max_attempts(),
            enable_llm_extraction: true,
            enable_entity_cache: true,
        }
    }
}

fn d_max_attempts() -> u32 {
    3
}
fn d_true() -> bool {
    true
}
