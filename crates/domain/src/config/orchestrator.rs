use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Orchestrator (C9) / ProgressTracker (C10)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Bound on subtasks dispatched concurrently within one execution level.
    #[serde(default = "d_max_parallel_tasks")]
    pub max_parallel_tasks: usize,
    #[serde(default = "d_default_tool_timeout_ms")]
    pub default_tool_timeout_ms: u64,
    /// Skip dependents and invoke compensating actions on subtask failure.
    #[serde(default)]
    pub rollback_on_failure: bool,
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_parallel_tasks: d_max_parallel_tasks(),
            default_tool_timeout_ms: d_default_tool_timeout_ms(),
            rollback_on_failure: false,
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Clamp `max_parallel_tasks` to a sane range.
    pub fn clamped(&self) -> Self {
        Self {
            max_parallel_tasks: self.max_parallel_tasks.clamp(1, 64),
            ..self.clone()
        }
    }
}

/// Per-`(plugin, action)` circuit breaker: opens after `M` consecutive
/// failures, rejecting further dispatches until the cool-off elapses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    #[serde(default = "d_true")]
    pub enabled: bool,
    #[serde(default = "d_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "d_cooloff_ms")]
    pub cooloff_ms: u64,
    /// Trial requests allowed through while half-open before closing again.
    #[serde(default = "d_half_open_trials")]
    pub half_open_trials: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_threshold: d_failure_threshold(),
            cooloff_ms: d_cooloff_ms(),
            half_open_trials: d_half_open_trials(),
        }
    }
}

fn d_max_parallel_tasks() -> usize {
    8
}
fn d_default_tool_timeout_ms() -> u64 {
    10_000
}
fn d_true() -> bool {
    true
}
fn d_failure_threshold() -> u32 {
    5
}
fn d_cooloff_ms() -> u64 {
    30_000
}
fn d_half_open_trials() -> u32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_caps_max_parallel_tasks() {
        let cfg = OrchestratorConfig { max_parallel_tasks: 1000, ..OrchestratorConfig::default() };
        assert_eq!(cfg.clamped().max_parallel_tasks, 64);
    }

    #[test]
    fn clamp_floors_max_parallel_tasks() {
        let cfg = OrchestratorConfig { max_parallel_tasks: 0, ..OrchestratorConfig::default() };
        assert_eq!(cfg.clamped().max_parallel_tasks, 1);
    }
}
