//! Bounded in-memory audit log of recent classification and consensus
//! decisions, for observability alongside structured [`crate::trace::TraceEvent`]
//! logging — the same ring-buffer shape the teacher used for LLM routing
//! decisions, generalized here to intent classification and jury consensus.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;

/// A single recorded decision: either a RAG classification or a jury
/// consensus result, kept uniform so both can share one log and one
/// `recent()` query.
#[derive(Debug, Clone, Serialize)]
pub struct Decision {
    pub timestamp: DateTime<Utc>,
    pub session_id: Option<uuid::Uuid>,
    pub kind: DecisionKind,
    pub intent: String,
    pub confidence: f32,
    pub method: String,
    pub fallback_used: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    RagClassification,
    Consensus,
}

/// Thread-safe ring buffer of recent decisions, evicting the oldest entry
/// once `capacity` is reached.
pub struct DecisionLog {
    inner: Mutex<VecDeque<Decision>>,
    capacity: usize,
}

impl DecisionLog {
    pub fn new(capacity: usize) -> Self {
        Self { inner: Mutex::new(VecDeque::with_capacity(capacity)), capacity }
    }

    pub fn record(&self, decision: Decision) {
        let mut buf = self.inner.lock();
        if buf.len() >= self.capacity {
            buf.pop_front();
        }
        buf.push_back(decision);
    }

    /// Returns the `limit` most recent decisions, newest first.
    pub fn recent(&self, limit: usize) -> Vec<Decision> {
        let buf = self.inner.lock();
        buf.iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make(index: u64, kind: DecisionKind) -> Decision {
        Decision {
            timestamp: Utc::now(),
            session_id: None,
            kind,
            intent: format!("intent-{index}"),
            confidence: 0.5,
            method: "test".to_string(),
            fallback_used: false,
        }
    }

    #[test]
    fn ring_buffer_evicts_oldest_past_capacity() {
        let log = DecisionLog::new(3);
        for i in 0..5 {
            log.record(make(i, DecisionKind::RagClassification));
        }
        let recent = log.recent(10);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].intent, "intent-4");
        assert_eq!(recent[2].intent, "intent-2");
    }

    #[test]
    fn recent_respects_limit() {
        let log = DecisionLog::new(100);
        for i in 0..50 {
            log.record(make(i, DecisionKind::Consensus));
        }
        let recent = log.recent(5);
        assert_eq!(recent.len(), 5);
        assert_eq!(recent[0].intent, "intent-49");
    }

    #[test]
    fn empty_log_reports_empty() {
        let log = DecisionLog::new(10);
        assert!(log.is_empty());
        assert_eq!(log.recent(5).len(), 0);
    }
}
