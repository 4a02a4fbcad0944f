//! `ProgressTracker` (C10): per-execution record of subtask states,
//! completion percentage, and progress notifications (spec §4.10).
//!
//! Grounded on `crates/gateway/src/runtime/tasks.rs`'s `TaskStore`
//! (`RwLock<HashMap<_,_>>` + a per-entry `broadcast::Sender` for event
//! streaming), generalized from one event-per-task to one
//! counters-record-per-execution with per-subtask status updates.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use sa_domain::error::{Error, Result};
use sa_domain::model::SubtaskStatus;
use sa_domain::trace::TraceEvent;
use tokio::sync::broadcast;
use uuid::Uuid;

/// A progress notification, broadcast on every subtask status change and
/// once more when the whole execution completes.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub execution_id: Uuid,
    pub subtask_id: Option<Uuid>,
    pub counters: Counters,
}

/// `pending + in_progress + completed + failed = total` (spec invariant).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub total: usize,
}

impl Counters {
    pub fn completion_pct(&self) -> f32 {
        if self.total == 0 {
            return 0.0;
        }
        self.completed as f32 / self.total as f32
    }

    pub fn is_completed(&self) -> bool {
        self.total > 0 && self.completed == self.total
    }
}

struct Record {
    subtasks: HashMap<Uuid, SubtaskStatus>,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    cancelled: bool,
}

impl Record {
    fn counters(&self) -> Counters {
        let mut c = Counters { total: self.subtasks.len(), ..Counters::default() };
        for status in self.subtasks.values() {
            match status {
                SubtaskStatus::Pending => c.pending += 1,
                SubtaskStatus::Executing => c.in_progress += 1,
                SubtaskStatus::Completed => c.completed += 1,
                SubtaskStatus::Failed => c.failed += 1,
                SubtaskStatus::Cancelled => c.cancelled += 1,
            }
        }
        c
    }
}

/// A point-in-time snapshot returned by [`ProgressTracker::status`].
#[derive(Debug, Clone)]
pub struct ProgressStatus {
    pub execution_id: Uuid,
    pub counters: Counters,
    pub is_completed: bool,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

pub struct ProgressTracker {
    records: RwLock<HashMap<Uuid, Record>>,
    channels: RwLock<HashMap<Uuid, broadcast::Sender<ProgressEvent>>>,
    /// How long a terminal record is retained before `cleanup()` evicts it.
    retention_seconds: i64,
}

impl ProgressTracker {
    pub fn new(retention_seconds: i64) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            channels: RwLock::new(HashMap::new()),
            retention_seconds,
        }
    }

    /// `start(execution_id, subtasks) → tracker_id`. One tracker per
    /// execution; `tracker_id == execution_id` so callers never need a
    /// second lookup table.
    pub fn start(&self, execution_id: Uuid, subtask_ids: &[Uuid]) -> Uuid {
        let record = Record {
            subtasks: subtask_ids.iter().map(|id| (*id, SubtaskStatus::Pending)).collect(),
            started_at: Utc::now(),
            finished_at: None,
            cancelled: false,
        };
        let counters = record.counters();
        self.records.write().insert(execution_id, record);
        self.channels.write().insert(execution_id, broadcast::channel(256).0);
        self.notify(execution_id, None, counters);
        execution_id
    }

    /// `update(tracker_id, subtask_id, status, result?)`. `result` is
    /// carried by the caller's own subtask record, not duplicated here —
    /// the tracker owns only status/counters.
    pub fn update(&self, tracker_id: Uuid, subtask_id: Uuid, status: SubtaskStatus) -> Result<()> {
        let counters = {
            let mut records = self.records.write();
            let record = records
                .get_mut(&tracker_id)
                .ok_or_else(|| Error::Session(format!("no progress tracker for execution {tracker_id}")))?;
            record.subtasks.insert(subtask_id, status);
            let counters = record.counters();
            if counters.is_completed() || (counters.pending == 0 && counters.in_progress == 0) {
                record.finished_at.get_or_insert(Utc::now());
            }
            counters
        };

        TraceEvent::ProgressUpdated {
            execution_id: tracker_id,
            completed: counters.completed,
            total: counters.total,
            is_completed: counters.is_completed(),
        }
        .emit();
        self.notify(tracker_id, Some(subtask_id), counters);
        Ok(())
    }

    pub fn status(&self, tracker_id: Uuid) -> Result<ProgressStatus> {
        let records = self.records.read();
        let record = records
            .get(&tracker_id)
            .ok_or_else(|| Error::Session(format!("no progress tracker for execution {tracker_id}")))?;
        let counters = record.counters();
        Ok(ProgressStatus {
            execution_id: tracker_id,
            counters,
            is_completed: counters.is_completed(),
            cancelled: record.cancelled,
            started_at: record.started_at,
            finished_at: record.finished_at,
        })
    }

    /// Marks every non-terminal subtask `cancelled` and the execution as
    /// cancelled; the `Orchestrator` is responsible for actually stopping
    /// in-flight dispatches.
    pub fn cancel(&self, tracker_id: Uuid) -> Result<()> {
        let counters = {
            let mut records = self.records.write();
            let record = records
                .get_mut(&tracker_id)
                .ok_or_else(|| Error::Session(format!("no progress tracker for execution {tracker_id}")))?;
            record.cancelled = true;
            for status in record.subtasks.values_mut() {
                if matches!(status, SubtaskStatus::Pending | SubtaskStatus::Executing) {
                    *status = SubtaskStatus::Cancelled;
                }
            }
            record.finished_at.get_or_insert(Utc::now());
            record.counters()
        };
        self.notify(tracker_id, None, counters);
        Ok(())
    }

    /// Subscribe to this execution's progress notifications.
    pub fn subscribe(&self, tracker_id: Uuid) -> Option<broadcast::Receiver<ProgressEvent>> {
        self.channels.read().get(&tracker_id).map(|tx| tx.subscribe())
    }

    /// Evicts trackers whose execution finished more than
    /// `retention_seconds` ago. Returns the number evicted.
    pub fn cleanup(&self) -> usize {
        let now = Utc::now();
        let expired: Vec<Uuid> = self
            .records
            .read()
            .iter()
            .filter(|(_, r)| {
                r.finished_at
                    .is_some_and(|f| now.signed_duration_since(f).num_seconds() >= self.retention_seconds)
            })
            .map(|(id, _)| *id)
            .collect();
        let mut records = self.records.write();
        let mut channels = self.channels.write();
        for id in &expired {
            records.remove(id);
            channels.remove(id);
        }
        expired.len()
    }

    fn notify(&self, execution_id: Uuid, subtask_id: Option<Uuid>, counters: Counters) {
        if let Some(tx) = self.channels.read().get(&execution_id) {
            let _ = tx.send(ProgressEvent { execution_id, subtask_id, counters });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_invariant_holds_after_updates() {
        let tracker = ProgressTracker::new(3600);
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let exec = Uuid::new_v4();
        tracker.start(exec, &ids);
        tracker.update(exec, ids[0], SubtaskStatus::Completed).unwrap();
        tracker.update(exec, ids[1], SubtaskStatus::Failed).unwrap();
        let status = tracker.status(exec).unwrap();
        let c = status.counters;
        assert_eq!(c.pending + c.in_progress + c.completed + c.failed + c.cancelled, c.total);
        assert!(!status.is_completed);
    }

    #[test]
    fn is_completed_iff_all_completed() {
        let tracker = ProgressTracker::new(3600);
        let ids: Vec<Uuid> = (0..2).map(|_| Uuid::new_v4()).collect();
        let exec = Uuid::new_v4();
        tracker.start(exec, &ids);
        tracker.update(exec, ids[0], SubtaskStatus::Completed).unwrap();
        assert!(!tracker.status(exec).unwrap().is_completed);
        tracker.update(exec, ids[1], SubtaskStatus::Completed).unwrap();
        assert!(tracker.status(exec).unwrap().is_completed);
    }

    #[test]
    fn cancel_marks_pending_subtasks_cancelled() {
        let tracker = ProgressTracker::new(3600);
        let ids: Vec<Uuid> = (0..2).map(|_| Uuid::new_v4()).collect();
        let exec = Uuid::new_v4();
        tracker.start(exec, &ids);
        tracker.cancel(exec).unwrap();
        let status = tracker.status(exec).unwrap();
        assert!(status.cancelled);
        assert_eq!(status.counters.cancelled, 2);
    }

    #[test]
    fn unknown_tracker_is_session_error() {
        let tracker = ProgressTracker::new(3600);
        assert!(matches!(tracker.status(Uuid::new_v4()), Err(Error::Session(_))));
    }
}
