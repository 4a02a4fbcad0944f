//! `Orchestrator` (C9): schedules subtasks level-by-level from a dependency
//! graph, dispatches each through the `ToolRouter`, and applies rollback
//! and cancellation policy (spec §4.9).
//!
//! Retry/backoff/timeout per subtask already live in
//! `sa_tools::ToolRouter::dispatch` (grounded on
//! `crates/providers/src/router.rs`'s fallback control flow); this module
//! adds the piece that's unique to orchestration — level-by-level
//! scheduling, bounded intra-level concurrency, and the rollback/
//! cancellation policy around a batch of dispatches — grounded on
//! `crates/gateway/src/runtime/tasks.rs`'s `Semaphore`-bounded concurrent
//! execution shape.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use futures_util::future::join_all;
use sa_domain::config::OrchestratorConfig;
use sa_domain::error::{Error, Result};
use sa_domain::model::{ExecutionPlan, Subtask, SubtaskStatus};
use sa_domain::trace::TraceEvent;
use sa_tools::ToolRouter;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::plan;
use crate::tracker::ProgressTracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub execution_id: Uuid,
    pub tracker_id: Uuid,
    pub status: ExecutionStatus,
    pub plan: ExecutionPlan,
}

pub struct Orchestrator {
    router: Arc<ToolRouter>,
    tracker: Arc<ProgressTracker>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(router: Arc<ToolRouter>, tracker: Arc<ProgressTracker>, config: OrchestratorConfig) -> Self {
        Self { router, tracker, config: config.clamped() }
    }

    pub fn progress_tracker(&self) -> &Arc<ProgressTracker> {
        &self.tracker
    }

    /// Builds the execution plan and runs it to completion, failure, or
    /// cancellation. `cancel` is the caller's cancellation signal — the
    /// orchestrator also registers its own token internally so `cancel()`
    /// (via `ProgressTracker`) can be triggered from elsewhere in the
    /// process (e.g. a session-cancel API call) between levels.
    pub async fn execute(&self, subtasks: Vec<Subtask>, cancel: CancellationToken) -> Result<ExecutionOutcome> {
        let execution_id = Uuid::new_v4();
        let (initial_plan, _critical_path) = plan::build(subtasks)?;

        let all_ids: Vec<Uuid> = initial_plan.levels.iter().flatten().map(|s| s.id).collect();
        let tracker_id = self.tracker.start(execution_id, &all_ids);

        TraceEvent::PlanBuilt {
            execution_id,
            level_count: initial_plan.levels.len(),
            subtask_count: all_ids.len(),
        }
        .emit();

        let mut by_id: HashMap<Uuid, Subtask> =
            initial_plan.levels.iter().flatten().map(|s| (s.id, s.clone())).collect();
        let mut failed_ids: HashSet<Uuid> = HashSet::new();
        let mut rolled_back = false;
        let semaphore = Arc::new(Semaphore::new(self.config.max_parallel_tasks));

        'levels: for (level_idx, level) in initial_plan.levels.iter().enumerate() {
            if cancel.is_cancelled() {
                self.cancel_remaining(&mut by_id, tracker_id, &initial_plan, level_idx);
                break 'levels;
            }

            let (runnable, skipped): (Vec<&Subtask>, Vec<&Subtask>) = level.iter().partition(|s| {
                !self.config.rollback_on_failure || !s.dependencies.iter().any(|d| failed_ids.contains(d))
            });

            for s in &skipped {
                let entry = by_id.get_mut(&s.id).expect("subtask present in by_id");
                entry.status = SubtaskStatus::Cancelled;
                entry.error = Some("skipped: a dependency failed under rollback_on_failure".to_string());
                self.tracker.update(tracker_id, s.id, SubtaskStatus::Cancelled)?;
            }

            let dispatches = runnable.iter().map(|s| {
                let router = self.router.clone();
                let semaphore = semaphore.clone();
                let cancel = cancel.clone();
                let subtask = (*s).clone();
                async move {
                    let _permit = semaphore.acquire().await.expect("semaphore never closed");
                    if cancel.is_cancelled() {
                        return (subtask.id, Err(Error::Cancelled(format!("subtask {} cancelled before dispatch", subtask.id))));
                    }
                    let args = serde_json::to_value(&subtask.entities).unwrap_or(serde_json::Value::Null);
                    TraceEvent::SubtaskDispatched {
                        execution_id,
                        subtask_id: subtask.id,
                        action: subtask.action.clone(),
                        attempt: 1,
                    }
                    .emit();
                    let result = tokio::select! {
                        res = router.dispatch(&subtask.action, args) => res,
                        _ = cancel.cancelled() => Err(Error::Cancelled(format!("subtask {} cancelled in flight", subtask.id))),
                    };
                    (subtask.id, result)
                }
            });

            let results = join_all(dispatches).await;

            for (id, result) in results {
                let entry = by_id.get_mut(&id).expect("subtask present in by_id");
                entry.started_at.get_or_insert(Utc::now());
                entry.completed_at = Some(Utc::now());
                let duration_ms = entry
                    .completed_at
                    .unwrap()
                    .signed_duration_since(entry.started_at.unwrap())
                    .num_milliseconds()
                    .max(0) as u64;

                match result {
                    Ok(response) => {
                        entry.status = SubtaskStatus::Completed;
                        entry.result = Some(response);
                        self.tracker.update(tracker_id, id, SubtaskStatus::Completed)?;
                        TraceEvent::SubtaskFinished { execution_id, subtask_id: id, status: "completed".into(), duration_ms }.emit();
                    }
                    Err(Error::Cancelled(msg)) => {
                        entry.status = SubtaskStatus::Cancelled;
                        entry.error = Some(msg);
                        self.tracker.update(tracker_id, id, SubtaskStatus::Cancelled)?;
                        TraceEvent::SubtaskFinished { execution_id, subtask_id: id, status: "cancelled".into(), duration_ms }.emit();
                    }
                    Err(e) => {
                        entry.status = SubtaskStatus::Failed;
                        entry.error = Some(e.to_string());
                        entry.retries = entry.max_retries;
                        failed_ids.insert(id);
                        self.tracker.update(tracker_id, id, SubtaskStatus::Failed)?;
                        TraceEvent::SubtaskFinished { execution_id, subtask_id: id, status: "failed".into(), duration_ms }.emit();
                    }
                }
            }

            if cancel.is_cancelled() {
                continue 'levels;
            }

            if !failed_ids.is_empty() && self.config.rollback_on_failure && !rolled_back {
                rolled_back = true;
                self.rollback(execution_id, &mut by_id).await;
            }
        }

        if cancel.is_cancelled() {
            self.tracker.cancel(tracker_id)?;
        }

        let status = self.tracker.status(tracker_id)?;
        let final_status = if status.cancelled {
            ExecutionStatus::Cancelled
        } else if status.counters.failed > 0 {
            ExecutionStatus::Failed
        } else {
            ExecutionStatus::Completed
        };

        let final_plan = ExecutionPlan {
            levels: initial_plan
                .levels
                .iter()
                .map(|level| level.iter().map(|s| by_id.get(&s.id).cloned().unwrap_or_else(|| s.clone())).collect())
                .collect(),
        };

        Ok(ExecutionOutcome { execution_id, tracker_id, status: final_status, plan: final_plan })
    }

    /// Invokes each already-completed subtask's compensating action (if
    /// declared) and marks it logged as rolled back. Subtasks with no
    /// `compensate` action are left completed (open question (b): rollback
    /// is opt-in per action, not automatic).
    async fn rollback(&self, execution_id: Uuid, by_id: &mut HashMap<Uuid, Subtask>) {
        let completed_ids: Vec<Uuid> = by_id
            .values()
            .filter(|s| s.status == SubtaskStatus::Completed)
            .map(|s| s.id)
            .collect();

        for id in completed_ids {
            let (action_name, compensate, entities) = {
                let s = by_id.get(&id).expect("id from completed_ids");
                (s.action.clone(), self.router.registry().resolve(&s.action).ok().and_then(|a| a.compensate), s.entities.clone())
            };

            match compensate {
                Some(compensate_action) => {
                    TraceEvent::RollbackInvoked {
                        execution_id,
                        subtask_id: id,
                        compensate_action: Some(compensate_action.clone()),
                    }
                    .emit();
                    let args = serde_json::to_value(&entities).unwrap_or(serde_json::Value::Null);
                    if let Err(e) = self.router.dispatch(&compensate_action, args).await {
                        tracing::warn!(execution_id = %execution_id, subtask_id = %id, action = %action_name, error = %e, "compensating action failed");
                    }
                }
                None => {
                    TraceEvent::RollbackInvoked { execution_id, subtask_id: id, compensate_action: None }.emit();
                    tracing::info!(execution_id = %execution_id, subtask_id = %id, action = %action_name, "rollback_skipped: no compensating action declared");
                }
            }
        }
    }

    fn cancel_remaining(&self, by_id: &mut HashMap<Uuid, Subtask>, tracker_id: Uuid, plan: &ExecutionPlan, from_level: usize) {
        for level in plan.levels.iter().skip(from_level) {
            for s in level {
                if let Some(entry) = by_id.get_mut(&s.id) {
                    if !matches!(entry.status, SubtaskStatus::Completed | SubtaskStatus::Failed) {
                        entry.status = SubtaskStatus::Cancelled;
                        let _ = self.tracker.update(tracker_id, s.id, SubtaskStatus::Cancelled);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sa_catalog::ToolRegistry as CatalogToolRegistry;
    use sa_domain::config::CircuitBreakerConfig;
    use sa_domain::model::{RetryPolicy, ToolAction, ToolTransport};
    use sa_tools::registry::ToolRegistry as DispatchRegistry;
    use serde_json::json;
    use std::collections::HashMap as Map;

    fn tool(name: &str, idempotent: bool) -> ToolAction {
        ToolAction {
            name: name.to_string(),
            transport: ToolTransport::Http,
            endpoint: Some("http://127.0.0.1:1/unreachable".into()),
            method: Some("POST".into()),
            input_schema: json!({}),
            output_schema: json!({}),
            timeout_ms: 50,
            retry: RetryPolicy { max: 0, ..RetryPolicy::default() },
            auth: None,
            compensate: None,
            idempotent,
        }
    }

    fn orchestrator_with(tools: Vec<ToolAction>) -> Orchestrator {
        let catalog = Arc::new(CatalogToolRegistry::from_entries(tools));
        let registry = Arc::new(DispatchRegistry::new(catalog, None));
        let router = Arc::new(ToolRouter::new(registry, CircuitBreakerConfig::default()));
        let tracker = Arc::new(ProgressTracker::new(3600));
        Orchestrator::new(router, tracker, OrchestratorConfig::default())
    }

    #[tokio::test]
    async fn independent_subtasks_all_attempted_in_one_level() {
        let orch = orchestrator_with(vec![tool("a.x", false), tool("b.x", false)]);
        let a = Subtask::new("a.x", Map::new());
        let b = Subtask::new("b.x", Map::new());
        let outcome = orch.execute(vec![a, b], CancellationToken::new()).await.unwrap();
        assert_eq!(outcome.plan.levels.len(), 1);
        assert_eq!(outcome.status, ExecutionStatus::Failed); // unreachable endpoint
    }

    #[tokio::test]
    async fn cycle_is_rejected_before_dispatch() {
        let orch = orchestrator_with(vec![tool("a.x", false), tool("b.x", false)]);
        let mut a = Subtask::new("a.x", Map::new());
        let mut b = Subtask::new("b.x", Map::new());
        a.dependencies.push(b.id);
        b.dependencies.push(a.id);
        let err = orch.execute(vec![a, b], CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, Error::Dependency(_)));
    }

    #[tokio::test]
    async fn rollback_skips_dependents_of_a_failed_subtask() {
        let mut cfg_tools = vec![tool("a.x", false), tool("b.x", false)];
        cfg_tools[0].timeout_ms = 10;
        let catalog = Arc::new(CatalogToolRegistry::from_entries(cfg_tools));
        let registry = Arc::new(DispatchRegistry::new(catalog, None));
        let router = Arc::new(ToolRouter::new(registry, CircuitBreakerConfig::default()));
        let tracker = Arc::new(ProgressTracker::new(3600));
        let orch = Orchestrator::new(
            router,
            tracker,
            OrchestratorConfig { rollback_on_failure: true, ..OrchestratorConfig::default() },
        );

        let a = Subtask::new("a.x", Map::new());
        let mut b = Subtask::new("b.x", Map::new());
        b.dependencies.push(a.id);
        let outcome = orch.execute(vec![a, b.clone()], CancellationToken::new()).await.unwrap();
        assert_eq!(outcome.status, ExecutionStatus::Failed);
        let b_final = outcome.plan.levels[1].iter().find(|s| s.id == b.id).unwrap();
        assert_eq!(b_final.status, SubtaskStatus::Cancelled);
    }
}
