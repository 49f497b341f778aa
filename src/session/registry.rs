//! Live session tracking.
//!
//! # Responsibilities
//! - Assign each accepted WebSocket a unique [`SessionId`]
//! - Remember which room it belongs to and when it opened
//! - Release the entry when the session's guard is dropped
//! - Let shutdown wait for sessions to drain

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use uuid::Uuid;

use crate::observability::GatewayMetrics;
use crate::project::{RoomToken, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sess-{}", self.0.simple())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub room: RoomToken,
    pub opened_at: Timestamp,
}

/// Tracks open sessions. Clones share the same table.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<SessionId, SessionInfo>>,
    metrics: GatewayMetrics,
}

impl SessionRegistry {
    pub fn new(metrics: GatewayMetrics) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            metrics,
        }
    }

    /// Record a new session. It stays registered until the guard is dropped.
    pub fn register(&self, room: RoomToken, opened_at: Timestamp) -> SessionGuard {
        let id = SessionId::new();
        self.sessions.insert(id, SessionInfo { room, opened_at });
        self.metrics.session_opened();
        SessionGuard {
            id,
            sessions: Arc::clone(&self.sessions),
            metrics: self.metrics.clone(),
        }
    }

    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }

    /// Sessions currently open in `room`.
    pub fn sessions_in(&self, room: &RoomToken) -> usize {
        self.sessions.iter().filter(|s| &s.value().room == room).count()
    }

    /// Wait until no sessions remain.
    pub async fn wait_for_drain(&self) {
        while !self.sessions.is_empty() {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

/// Keeps a session registered for as long as it lives.
pub struct SessionGuard {
    id: SessionId,
    sessions: Arc<DashMap<SessionId, SessionInfo>>,
    metrics: GatewayMetrics,
}

impl SessionGuard {
    pub fn id(&self) -> SessionId {
        self.id
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.sessions.remove(&self.id).is_some() {
            self.metrics.session_closed();
        }
        tracing::trace!(session_id = %self.id, "Session discarded");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room(s: &str) -> RoomToken {
        RoomToken::parse(s).unwrap()
    }

    #[test]
    fn session_ids_are_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
    }

    #[test]
    fn guards_track_sessions_per_room() {
        let registry = SessionRegistry::new(GatewayMetrics::new());
        assert_eq!(registry.active_count(), 0);

        let a1 = registry.register(room("a"), Timestamp(1));
        let a2 = registry.register(room("a"), Timestamp(2));
        let b = registry.register(room("b"), Timestamp(3));
        assert_eq!(registry.active_count(), 3);
        assert_eq!(registry.sessions_in(&room("a")), 2);

        drop(a1);
        assert_eq!(registry.sessions_in(&room("a")), 1);

        drop(a2);
        drop(b);
        assert_eq!(registry.active_count(), 0);
    }

    #[tokio::test]
    async fn drain_completes_when_last_guard_drops() {
        let registry = SessionRegistry::new(GatewayMetrics::new());
        let guard = registry.register(room("a"), Timestamp(1));

        let waiter = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.wait_for_drain().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .expect("drain should finish")
            .unwrap();
    }
}
