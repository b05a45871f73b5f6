//! In-memory implementation of the session store.
//!
//! Sessions live for the lifetime of the serving process, shared by every
//! request through one lock-guarded map.

use super::{Session, SessionStats, SessionStore, new_session};
use crate::clock::Clock;
use crate::error::ChatGateError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::debug;

/// Process-lifetime session store.
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl MemorySessionStore {
    /// Creates an empty store whose sessions live for `ttl`.
    pub fn new(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            clock,
            ttl,
        }
    }

    fn lock_error(e: impl std::fmt::Display) -> ChatGateError {
        ChatGateError::Store(format!("Session store lock poisoned: {}", e))
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, payload: Value) -> Result<Session, ChatGateError> {
        let session = new_session(self.clock.as_ref(), self.ttl, payload)?;
        let mut sessions = self.sessions.write().map_err(Self::lock_error)?;
        sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn get(&self, id: &str) -> Result<Option<Session>, ChatGateError> {
        let now = self.clock.now();
        {
            let sessions = self.sessions.read().map_err(Self::lock_error)?;
            match sessions.get(id) {
                None => return Ok(None),
                Some(session) if !session.is_expired(now) => return Ok(Some(session.clone())),
                Some(_) => {}
            }
        }

        let mut sessions = self.sessions.write().map_err(Self::lock_error)?;
        if sessions.get(id).is_some_and(|s| s.is_expired(now)) {
            sessions.remove(id);
            debug!(session_id = id, "purged expired session on read");
        }
        Ok(None)
    }

    async fn delete(&self, id: &str) -> Result<bool, ChatGateError> {
        let mut sessions = self.sessions.write().map_err(Self::lock_error)?;
        Ok(sessions.remove(id).is_some())
    }

    async fn sweep(&self) -> Result<usize, ChatGateError> {
        let now = self.clock.now();
        let mut sessions = self.sessions.write().map_err(Self::lock_error)?;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(now));
        Ok(before - sessions.len())
    }

    async fn stats(&self) -> Result<SessionStats, ChatGateError> {
        let now = self.clock.now();
        let sessions = self.sessions.read().map_err(Self::lock_error)?;
        Ok(SessionStats {
            total_sessions: sessions.len(),
            active_sessions: sessions.values().filter(|s| !s.is_expired(now)).count(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use serde_json::json;

    const TTL: Duration = Duration::from_secs(15 * 60);

    fn store() -> (Arc<ManualClock>, MemorySessionStore) {
        let clock = Arc::new(ManualClock::starting_now());
        (clock.clone(), MemorySessionStore::new(clock, TTL))
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let (clock, store) = store();
        let created = store.create(json!({"x": 1})).await.unwrap();

        let fetched = store.get(&created.id).await.unwrap().unwrap();
        assert_eq!(fetched.payload, json!({"x": 1}));
        assert_eq!(fetched.created_at, clock.now());
        assert_eq!(fetched.expires_at, clock.now() + chrono::Duration::minutes(15));
    }

    #[tokio::test]
    async fn unknown_id_is_absent() {
        let (_, store) = store();
        assert!(store.get("template_0_missing00").await.unwrap().is_none());
        assert!(!store.delete("template_0_missing00").await.unwrap());
    }

    #[tokio::test]
    async fn expired_session_is_absent_and_purged() {
        let (clock, store) = store();
        let created = store.create(json!({"x": 1})).await.unwrap();

        clock.advance(TTL);
        assert!(store.get(&created.id).await.unwrap().is_none());
        assert_eq!(store.stats().await.unwrap().total_sessions, 0);
        assert!(!store.delete(&created.id).await.unwrap());
    }

    #[tokio::test]
    async fn delete_reports_removal_once() {
        let (_, store) = store();
        let created = store.create(json!("payload")).await.unwrap();
        assert!(store.delete(&created.id).await.unwrap());
        assert!(!store.delete(&created.id).await.unwrap());
        assert!(store.get(&created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sweep_purges_only_expired() {
        let (clock, store) = store();
        store.create(json!(1)).await.unwrap();
        clock.advance(Duration::from_secs(10 * 60));
        let fresh = store.create(json!(2)).await.unwrap();
        clock.advance(Duration::from_secs(6 * 60));

        assert_eq!(
            store.stats().await.unwrap(),
            SessionStats {
                total_sessions: 2,
                active_sessions: 1
            }
        );
        assert_eq!(store.sweep().await.unwrap(), 1);
        assert!(store.get(&fresh.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn oversized_ttl_is_a_configuration_error() {
        let clock = Arc::new(ManualClock::starting_now());
        let store = MemorySessionStore::new(clock, Duration::from_secs(u64::MAX / 4));

        let err = store.create(json!({"x": 1})).await.unwrap_err();
        assert!(matches!(err, ChatGateError::Config(_)));
        assert_eq!(store.stats().await.unwrap().total_sessions, 0);
    }

    #[tokio::test]
    async fn concurrent_creates_do_not_collide() {
        let (_, store) = store();
        let store = Arc::new(store);
        let handles: Vec<_> = (0..32)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.create(json!(i)).await.unwrap().id })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 32);
        assert_eq!(store.stats().await.unwrap().total_sessions, 32);
    }
}
