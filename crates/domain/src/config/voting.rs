use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// VotingEngine / MoE (C5)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VotingConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub algorithm: ConsensusAlgorithm,
    /// Minimum number of valid (non-skipped, non-timed-out) votes required
    /// for consensus to be attempted. Evaluated against the roster *after*
    /// jurors with missing credentials have been removed.
    #[serde(default = "d_min_votes")]
    pub min_votes: usize,
    #[serde(default = "d_round_timeout_ms")]
    pub round_timeout_ms: u64,
    /// Total debate rounds including round 1. `R = 1` disables debate.
    #[serde(default = "d_max_rounds")]
    pub max_rounds: u32,
    #[serde(default = "d_improvement_threshold")]
    pub improvement_threshold: f32,
    /// Minimum final consensus confidence. Below this (or on
    /// `Agreement::Failed`, or a winning `intent = "unknown"`), the engine
    /// falls back to `single_llm_mode` (spec §4.4 *Fallback*).
    #[serde(default = "d_consensus_threshold")]
    pub consensus_threshold: f32,
    /// Roster entry referenced as the "primary" juror for single-juror
    /// fallback (`method = single_llm_mode`).
    #[serde(default)]
    pub primary_juror_id: Option<String>,
    /// Declarative jury roster, normally loaded from the jury registry file.
    #[serde(default)]
    pub jurors: Vec<JurorConfig>,
}

impl Default for VotingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            algorithm: ConsensusAlgorithm::WeightedMajority,
            min_votes: d_min_votes(),
            round_timeout_ms: d_round_timeout_ms(),
            max_rounds: d_max_rounds(),
            improvement_threshold: d_improvement_threshold(),
            consensus_threshold: d_consensus_threshold(),
            primary_juror_id: None,
            jurors: Vec::new(),
        }
    }
}

/// Pluggable consensus algorithm, selected by name. Unknown names in a
/// registry file fall back to `WeightedMajority` at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ConsensusAlgorithm {
    #[default]
    WeightedMajority,
    Plurality,
    ConfidenceWeighted,
    BordaCount,
    Condorcet,
    Approval,
}

impl ConsensusAlgorithm {
    /// Parse a registry-file algorithm name, defaulting to `WeightedMajority`
    /// on anything unrecognised rather than failing to load.
    pub fn from_name(name: &str) -> Self {
        match name {
            "plurality" => Self::Plurality,
            "confidence-weighted" => Self::ConfidenceWeighted,
            "borda-count" => Self::BordaCount,
            "condorcet" => Self::Condorcet,
            "approval" => Self::Approval,
            _ => Self::WeightedMajority,
        }
    }
}

/// One entry in the declarative jury roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JurorConfig {
    pub id: String,
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub role: String,
    #[serde(default = "d_weight")]
    pub weight: f32,
    #[serde(default = "d_temperature")]
    pub temperature: f32,
    #[serde(default = "d_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub prompt_template: Option<String>,
}

fn d_min_votes() -> usize {
    2
}
fn d_round_timeout_ms() -> u64 {
    15_000
}
fn d_max_rounds() -> u32 {
    2
}
fn d_improvement_threshold() -> f32 {
    0.10
}
fn d_consensus_threshold() -> f32 {
    0.5
}
fn d_weight() -> f32 {
    1.0
}
fn d_temperature() -> f32 {
    0.2
}
fn d_max_tokens() -> u32 {
    512
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_algorithm_name_falls_back_to_weighted_majority() {
        assert_eq!(ConsensusAlgorithm::from_name("nonsense"), ConsensusAlgorithm::WeightedMajority);
    }

    #[test]
    fn known_algorithm_names_parse() {
        assert_eq!(ConsensusAlgorithm::from_name("plurality"), ConsensusAlgorithm::Plurality);
        assert_eq!(ConsensusAlgorithm::from_name("condorcet"), ConsensusAlgorithm::Condorcet);
    }

    #[test]
    fn default_min_votes_is_two() {
        assert_eq!(VotingConfig::default().min_votes, 2);
    }

    #[test]
    fn default_consensus_threshold_is_half() {
        assert_eq!(VotingConfig::default().consensus_threshold, 0.5);
    }
}
