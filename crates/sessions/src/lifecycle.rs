//! Session lifecycle: the §4.6 state machine, TTL sweeping, and history
//! compression.
//!
//! Grounded on the teacher's reset-lifecycle shape (`LifecycleManager`
//! evaluating whether a session is stale on every inbound message) but
//! driven by the state machine and TTL/compression thresholds instead of
//! daily-reset/per-channel overrides, which have no counterpart here.

use std::sync::Arc;
use std::time::Duration;

use sa_domain::config::SessionsConfig;
use sa_domain::model::{Session, SessionState};
use sa_domain::trace::TraceEvent;

use crate::store::SessionStore;

/// Whether `from -> to` is a legal state machine transition.
///
/// `active -> waiting_slots -> executing -> completed` is the happy path;
/// every non-terminal state can fall into `error`, `paused`, `cancelled`,
/// or `expired`. Terminal states (`completed`, `error`, `cancelled`,
/// `expired`) accept no further transitions.
pub fn valid_transition(from: SessionState, to: SessionState) -> bool {
    use SessionState::*;

    if from == to {
        return false;
    }

    match from {
        Active => matches!(to, WaitingSlots | Executing | Paused | Cancelled | Error | Expired),
        WaitingSlots => matches!(to, Active | Executing | Paused | Cancelled | Error | Expired),
        Executing => matches!(to, Completed | Paused | Cancelled | Error | Expired),
        Paused => matches!(to, Active | Executing | WaitingSlots | Cancelled | Expired),
        Completed | Cancelled | Error | Expired => false,
    }
}

/// Drives TTL sweeping and turn-history compression for a [`SessionStore`].
pub struct LifecycleManager {
    store: Arc<SessionStore>,
    config: SessionsConfig,
}

impl LifecycleManager {
    pub fn new(store: Arc<SessionStore>, config: SessionsConfig) -> Self {
        Self { store, config }
    }

    /// Run one TTL sweep pass, removing expired sessions.
    pub fn sweep(&self) -> Vec<uuid::Uuid> {
        self.store.sweep_expired()
    }

    /// Spawn a background task that sweeps expired sessions on
    /// `cleanup_interval_seconds`. The returned handle can be aborted on
    /// shutdown.
    pub fn spawn_cleanup_task(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let interval = Duration::from_secs(self.config.cleanup_interval_seconds.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let expired = self.sweep();
                if !expired.is_empty() {
                    tracing::info!(count = expired.len(), "TTL sweep removed expired sessions");
                }
            }
        })
    }

    /// If a session's history has grown past `compression_threshold`,
    /// collapse all but the most recent `keep_last_turns` into
    /// `context.summary` and bump `context.compression_level`.
    ///
    /// The "summary" here is a simple concatenation of user messages —
    /// real summarization is expected to go through the Summarizer role via
    /// `sa-providers`, which is out of this crate's scope; this is the
    /// fallback path and the unit of what gets compressed.
    pub fn maybe_compress(&self, id: uuid::Uuid) -> Option<Session> {
        let session = self.store.get(id)?;
        if session.history.len() <= self.config.compression_threshold {
            return None;
        }

        let keep = self.config.keep_last_turns.min(session.history.len());
        let collapse_count = session.history.len() - keep;
        if collapse_count == 0 {
            return None;
        }

        let result = self
            .store
            .update(id, |s| {
                let collapsed: Vec<String> = s
                    .history
                    .drain(0..collapse_count)
                    .map(|t| t.user_message)
                    .collect();

                let mut summary = s.context.summary.take().unwrap_or_default();
                if !summary.is_empty() {
                    summary.push(' ');
                }
                summary.push_str(&collapsed.join(" "));
                s.context.summary = Some(summary);
                s.context.compression_level += 1;
                s.turn_count = s.history.len();
            })
            .ok()?;

        TraceEvent::SessionCompressed {
            session_id: id,
            turns_collapsed: collapse_count,
            compression_level: result.context.compression_level,
        }
        .emit();

        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sa_domain::model::Turn;

    fn config(threshold: usize, keep: usize) -> SessionsConfig {
        SessionsConfig {
            compression_threshold: threshold,
            keep_last_turns: keep,
            ..Default::default()
        }
    }

    #[test]
    fn happy_path_transitions_are_legal() {
        assert!(valid_transition(SessionState::Active, SessionState::WaitingSlots));
        assert!(valid_transition(SessionState::WaitingSlots, SessionState::Executing));
        assert!(valid_transition(SessionState::Executing, SessionState::Completed));
    }

    #[test]
    fn terminal_states_accept_nothing() {
        assert!(!valid_transition(SessionState::Completed, SessionState::Active));
        assert!(!valid_transition(SessionState::Expired, SessionState::Active));
    }

    #[test]
    fn self_transition_is_illegal() {
        assert!(!valid_transition(SessionState::Active, SessionState::Active));
    }

    #[test]
    fn compression_collapses_oldest_turns() {
        let store = Arc::new(SessionStore::new(16, 5, 1800));
        let (session, _) = store.resolve_or_create(None, "alice");
        for i in 0..10 {
            store
                .push_turn(session.id, Turn::new(format!("message {i}")))
                .unwrap();
        }

        let mgr = LifecycleManager::new(store.clone(), config(5, 3));
        let compressed = mgr.maybe_compress(session.id).unwrap();
        assert_eq!(compressed.history.len(), 3);
        assert_eq!(compressed.context.compression_level, 1);
        assert!(compressed.context.summary.is_some());
    }

    #[test]
    fn compression_noop_below_threshold() {
        let store = Arc::new(SessionStore::new(16, 5, 1800));
        let (session, _) = store.resolve_or_create(None, "alice");
        store.push_turn(session.id, Turn::new("hi")).unwrap();

        let mgr = LifecycleManager::new(store, config(40, 10));
        assert!(mgr.maybe_compress(session.id).is_none());
    }
}
