//! In-memory session store.
//!
//! Sessions live for the process lifetime only (TTL + LRU eviction, no
//! durable persistence — a cache/session-scoped store, not a database).
//! Each entry keeps a small ring buffer of prior versions so a caller can
//! undo the last few mutations (e.g. a slot fill that turned out wrong).

use std::collections::HashMap;
use std::collections::VecDeque;

use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use sa_domain::error::{Error, Result};
use sa_domain::model::{Session, SessionState, Turn};
use sa_domain::trace::TraceEvent;

/// A session plus its version history.
struct SessionEntry {
    current: Session,
    /// Prior versions, oldest first, capped at `version_buffer_size`.
    versions: VecDeque<Session>,
}

/// In-memory, TTL-bounded session store.
///
/// Backed by an `RwLock<HashMap<_,_>>` and a separate LRU order list, in
/// the same style as the teacher's `RwLock<HashMap<_,_>>`-guarded registries
/// — one lock for the map, read-mostly access, short write critical sections.
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, SessionEntry>>,
    /// Most-recently-used session IDs, front = most recent.
    lru_order: RwLock<VecDeque<Uuid>>,
    cache_size: usize,
    version_buffer_size: usize,
    default_ttl_seconds: u64,
}

impl SessionStore {
    pub fn new(cache_size: usize, version_buffer_size: usize, default_ttl_seconds: u64) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            lru_order: RwLock::new(VecDeque::new()),
            cache_size: cache_size.max(1),
            version_buffer_size: version_buffer_size.max(1),
            default_ttl_seconds,
        }
    }

    /// Fetch a session by ID, or create a new one for `user_id` if absent.
    /// Returns `(session, is_new)`.
    pub fn resolve_or_create(&self, session_id: Option<Uuid>, user_id: &str) -> (Session, bool) {
        if let Some(id) = session_id {
            if let Some(session) = self.get(id) {
                return (session, false);
            }
        }

        let session = Session::new(user_id, self.default_ttl_seconds);
        self.insert(session.clone());

        TraceEvent::SessionResolved {
            session_id: session.id,
            is_new: true,
            state: format!("{:?}", session.state).to_lowercase(),
        }
        .emit();

        (session, true)
    }

    /// Look up a session by ID, touching its LRU position.
    pub fn get(&self, id: Uuid) -> Option<Session> {
        let sessions = self.sessions.read();
        let entry = sessions.get(&id)?;
        let session = entry.current.clone();
        drop(sessions);
        self.touch_lru(id);
        Some(session)
    }

    /// Insert a brand-new session, evicting the least-recently-used entry
    /// if the store is at `cache_size` capacity.
    fn insert(&self, session: Session) {
        let id = session.id;
        {
            let mut sessions = self.sessions.write();
            sessions.insert(
                id,
                SessionEntry {
                    current: session,
                    versions: VecDeque::new(),
                },
            );
        }
        self.touch_lru(id);
        self.evict_if_over_capacity();
    }

    fn touch_lru(&self, id: Uuid) {
        let mut order = self.lru_order.write();
        order.retain(|&x| x != id);
        order.push_front(id);
    }

    fn evict_if_over_capacity(&self) {
        let victim = {
            let mut order = self.lru_order.write();
            if order.len() <= self.cache_size {
                return;
            }
            order.pop_back()
        };
        if let Some(id) = victim {
            self.sessions.write().remove(&id);
        }
    }

    /// Apply a mutation to a session, snapshotting the pre-mutation state
    /// into the version ring buffer first.
    pub fn update<F>(&self, id: Uuid, f: F) -> Result<Session>
    where
        F: FnOnce(&mut Session),
    {
        let mut sessions = self.sessions.write();
        let entry = sessions
            .get_mut(&id)
            .ok_or_else(|| Error::Session(format!("session {id} not found")))?;

        let snapshot = entry.current.clone();
        entry.versions.push_back(snapshot);
        while entry.versions.len() > self.version_buffer_size {
            entry.versions.pop_front();
        }

        f(&mut entry.current);
        let result = entry.current.clone();
        drop(sessions);
        self.touch_lru(id);
        Ok(result)
    }

    /// Append a turn and bump `updated_at`/`last_activity`/`turn_count`.
    pub fn push_turn(&self, id: Uuid, turn: Turn) -> Result<Session> {
        self.update(id, |s| s.push_turn(turn))
    }

    /// Transition a session's state, validating the move is legal per the
    /// §4.6 state machine. See [`crate::lifecycle::valid_transition`].
    pub fn transition(&self, id: Uuid, to: SessionState, reason: &str) -> Result<Session> {
        let mut sessions = self.sessions.write();
        let entry = sessions
            .get_mut(&id)
            .ok_or_else(|| Error::Session(format!("session {id} not found")))?;

        let from = entry.current.state;
        if !crate::lifecycle::valid_transition(from, to) {
            return Err(Error::Session(format!(
                "illegal session transition {:?} -> {:?}",
                from, to
            )));
        }

        let snapshot = entry.current.clone();
        entry.versions.push_back(snapshot);
        while entry.versions.len() > self.version_buffer_size {
            entry.versions.pop_front();
        }

        entry.current.state = to;
        entry.current.updated_at = Utc::now();
        let result = entry.current.clone();
        drop(sessions);

        TraceEvent::SessionTransitioned {
            session_id: id,
            from: format!("{:?}", from).to_lowercase(),
            to: format!("{:?}", to).to_lowercase(),
            reason: reason.to_string(),
        }
        .emit();

        self.touch_lru(id);
        Ok(result)
    }

    /// Restore a session to an earlier version (0 = oldest retained).
    /// The current state is pushed onto the version buffer in its place,
    /// so restoring is itself undoable.
    pub fn restore(&self, id: Uuid, version_index: usize) -> Result<Session> {
        let mut sessions = self.sessions.write();
        let entry = sessions
            .get_mut(&id)
            .ok_or_else(|| Error::Session(format!("session {id} not found")))?;

        let restored = entry
            .versions
            .get(version_index)
            .cloned()
            .ok_or_else(|| Error::Session(format!("no version {version_index} for session {id}")))?;

        let current = std::mem::replace(&mut entry.current, restored);
        entry.versions.push_back(current);
        while entry.versions.len() > self.version_buffer_size {
            entry.versions.pop_front();
        }

        Ok(entry.current.clone())
    }

    /// Remove a session outright (explicit cancel, or post-TTL sweep).
    pub fn remove(&self, id: Uuid) -> Option<Session> {
        let removed = self.sessions.write().remove(&id).map(|e| e.current);
        self.lru_order.write().retain(|&x| x != id);
        removed
    }

    /// Sweep all sessions whose TTL has elapsed, removing and returning them.
    pub fn sweep_expired(&self) -> Vec<Uuid> {
        let now = Utc::now();
        let expired: Vec<Uuid> = {
            let sessions = self.sessions.read();
            sessions
                .iter()
                .filter(|(_, e)| e.current.is_expired(now))
                .map(|(id, _)| *id)
                .collect()
        };

        for id in &expired {
            self.remove(*id);
            TraceEvent::SessionExpired { session_id: *id }.emit();
        }

        expired
    }

    /// Number of sessions currently held.
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// List all active (non-terminal) session IDs.
    pub fn list_active(&self) -> Vec<Uuid> {
        self.sessions
            .read()
            .iter()
            .filter(|(_, e)| {
                !matches!(
                    e.current.state,
                    SessionState::Completed
                        | SessionState::Cancelled
                        | SessionState::Expired
                        | SessionState::Error
                )
            })
            .map(|(id, _)| *id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_or_create_makes_new_session() {
        let store = SessionStore::new(16, 5, 1800);
        let (session, is_new) = store.resolve_or_create(None, "alice");
        assert!(is_new);
        assert_eq!(session.user_id, "alice");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn resolve_or_create_reuses_existing() {
        let store = SessionStore::new(16, 5, 1800);
        let (first, _) = store.resolve_or_create(None, "alice");
        let (second, is_new) = store.resolve_or_create(Some(first.id), "alice");
        assert!(!is_new);
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn lru_eviction_drops_oldest() {
        let store = SessionStore::new(2, 5, 1800);
        let (s1, _) = store.resolve_or_create(None, "a");
        let (_s2, _) = store.resolve_or_create(None, "b");
        let (_s3, _) = store.resolve_or_create(None, "c");
        assert_eq!(store.len(), 2);
        assert!(store.get(s1.id).is_none());
    }

    #[test]
    fn update_snapshots_prior_version() {
        let store = SessionStore::new(16, 5, 1800);
        let (session, _) = store.resolve_or_create(None, "alice");
        store
            .update(session.id, |s| {
                s.current_intent = Some("book_flight".into());
            })
            .unwrap();
        let restored = store.restore(session.id, 0).unwrap();
        assert!(restored.current_intent.is_none());
    }

    #[test]
    fn transition_rejects_illegal_moves() {
        let store = SessionStore::new(16, 5, 1800);
        let (session, _) = store.resolve_or_create(None, "alice");
        let err = store
            .transition(session.id, SessionState::Completed, "skip ahead")
            .unwrap_err();
        assert!(matches!(err, Error::Session(_)));
    }

    #[test]
    fn sweep_expired_removes_stale_sessions() {
        let store = SessionStore::new(16, 5, 0);
        let (session, _) = store.resolve_or_create(None, "alice");
        std::thread::sleep(std::time::Duration::from_millis(5));
        let expired = store.sweep_expired();
        assert_eq!(expired, vec![session.id]);
        assert!(store.get(session.id).is_none());
    }
}
