use serde::{Deserialize, Serialize};

use crate::strategy::PromptStrategy;

/// Per-section report within a prompt build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionReport {
    pub label: String,
    pub raw_chars: usize,
    pub injected_chars: usize,
    pub truncated_per_section: bool,
    pub truncated_total_cap: bool,
    pub included: bool,
}

/// Full report of a classification prompt build, returned alongside the
/// assembled prompt text for tracing and debugging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptReport {
    pub strategy: PromptStrategy,
    pub sections: Vec<SectionReport>,
    pub example_count: usize,
    pub total_injected_chars: usize,
}
