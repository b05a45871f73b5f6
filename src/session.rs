//! Ephemeral session store.
//!
//! Sessions carry data from one request flow to a later, independent one,
//! such as a template import redeemed by the chat page. A session lives for a
//! fixed time-to-live and is never modified. Expired sessions behave exactly
//! like missing ones: they are purged lazily when read, and a background
//! sweep purges those nobody reads.

use crate::clock::Clock;
use crate::error::ChatGateError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub mod file;
pub mod memory;

pub use file::FileSessionStore;
pub use memory::MemorySessionStore;

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_SUFFIX_LEN: usize = 9;

/// A short-lived, id-addressed record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,

    /// Opaque payload; named `data` on the wire
    #[serde(rename = "data", alias = "payload")]
    pub payload: Value,

    pub created_at: DateTime<Utc>,

    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Returns true once the session must no longer be served.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Counts reported by [`SessionStore::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    /// Records held, expired or not
    pub total_sessions: usize,
    /// Records not yet expired
    pub active_sessions: usize,
}

/// Durable keyed storage for sessions.
///
/// Implementations must be safe for concurrent use by in-flight requests and
/// must treat unreadable records as absent, deleting them.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Stores `payload` under a fresh id and returns the full record.
    async fn create(&self, payload: Value) -> Result<Session, ChatGateError>;

    /// Returns the session, or `None` if it is missing or expired.
    async fn get(&self, id: &str) -> Result<Option<Session>, ChatGateError>;

    /// Removes the session and reports whether one was there.
    async fn delete(&self, id: &str) -> Result<bool, ChatGateError>;

    /// Purges every expired record and returns how many were removed.
    async fn sweep(&self) -> Result<usize, ChatGateError>;

    /// Counts held and live records.
    async fn stats(&self) -> Result<SessionStats, ChatGateError>;
}

/// Generates a session id: `template_<unix millis>_<9 base36 chars>`.
pub fn generate_session_id(now: DateTime<Utc>) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())] as char)
        .collect();
    format!("template_{}_{}", now.timestamp_millis(), suffix)
}

/// Builds a new record stamped by `clock`.
///
/// Fails with [`ChatGateError::Config`] when `ttl` pushes the expiry past the
/// representable date range.
pub(crate) fn new_session(
    clock: &dyn Clock,
    ttl: Duration,
    payload: Value,
) -> Result<Session, ChatGateError> {
    let now = clock.now();
    let expires_at = now
        .checked_add_signed(crate::clock::to_chrono(ttl))
        .ok_or_else(|| ChatGateError::Config(format!("Session TTL {:?} is too large", ttl)))?;
    Ok(Session {
        id: generate_session_id(now),
        payload,
        created_at: now,
        expires_at,
    })
}

/// Spawns a task that sweeps `store` every `interval`.
///
/// The first sweep happens one interval after spawning. Sweep failures are
/// logged and the task carries on.
pub fn spawn_sweeper(store: Arc<dyn SessionStore>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match store.sweep().await {
                Ok(0) => {}
                Ok(purged) => debug!(purged, "swept expired sessions"),
                Err(e) => warn!(error = %e, "session sweep failed"),
            }
        }
    })
}
