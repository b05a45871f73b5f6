//! File-backed implementation of the session store.
//!
//! Each session is one JSON file named after its id, so records survive a
//! process restart. Files that cannot be parsed are deleted and reported as
//! absent.

use super::{Session, SessionStats, SessionStore, new_session};
use crate::clock::Clock;
use crate::error::ChatGateError;
use async_trait::async_trait;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tracing::{debug, warn};

/// What a single record on disk turned out to be.
enum Record {
    Missing,
    Corrupt,
    Found(Session),
}

/// Session store keeping one JSON file per session under a directory.
pub struct FileSessionStore {
    dir: PathBuf,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl FileSessionStore {
    /// Opens a store under `dir`, creating the directory if needed.
    pub async fn open(
        dir: impl Into<PathBuf>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
    ) -> Result<Self, ChatGateError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir, clock, ttl })
    }

    /// Returns the directory holding the session files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Maps an id to its file, refusing ids that could escape the directory.
    fn path_for(&self, id: &str) -> Option<PathBuf> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        valid.then(|| self.dir.join(format!("{}.json", id)))
    }

    async fn read_record(path: &Path) -> Result<Record, ChatGateError> {
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Record::Missing),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_slice(&bytes) {
            Ok(session) => Ok(Record::Found(session)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "discarding unreadable session record");
                Ok(Record::Corrupt)
            }
        }
    }

    /// Removes a file, treating an already-missing file as success.
    async fn remove(path: &Path) -> Result<bool, ChatGateError> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes `bytes` to a sibling temp file and renames it over `path`, so
    /// readers never see a half-written record. The temp file is removed if
    /// either step fails.
    async fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), ChatGateError> {
        let tmp = path.with_extension("json.tmp");
        let written = match fs::write(&tmp, bytes).await {
            Ok(()) => fs::rename(&tmp, path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            if let Err(cleanup) = Self::remove(&tmp).await {
                warn!(path = %tmp.display(), error = %cleanup, "failed to remove temp session file");
            }
            return Err(e.into());
        }
        Ok(())
    }

    /// Lists every session file in the directory.
    async fn session_files(&self) -> Result<Vec<PathBuf>, ChatGateError> {
        let mut entries = fs::read_dir(&self.dir).await?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        Ok(files)
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn create(&self, payload: Value) -> Result<Session, ChatGateError> {
        let session = new_session(self.clock.as_ref(), self.ttl, payload)?;
        let path = self
            .path_for(&session.id)
            .ok_or_else(|| ChatGateError::Store(format!("Invalid session id: {}", session.id)))?;

        Self::write_atomically(&path, &serde_json::to_vec(&session)?).await?;
        Ok(session)
    }

    async fn get(&self, id: &str) -> Result<Option<Session>, ChatGateError> {
        let Some(path) = self.path_for(id) else {
            return Ok(None);
        };

        match Self::read_record(&path).await? {
            Record::Missing => Ok(None),
            Record::Corrupt => {
                Self::remove(&path).await?;
                Ok(None)
            }
            Record::Found(session) if session.is_expired(self.clock.now()) => {
                Self::remove(&path).await?;
                debug!(session_id = id, "purged expired session on read");
                Ok(None)
            }
            Record::Found(session) => Ok(Some(session)),
        }
    }

    async fn delete(&self, id: &str) -> Result<bool, ChatGateError> {
        match self.path_for(id) {
            Some(path) => Self::remove(&path).await,
            None => Ok(false),
        }
    }

    async fn sweep(&self) -> Result<usize, ChatGateError> {
        let now = self.clock.now();
        let mut purged = 0;
        for path in self.session_files().await? {
            let stale = match Self::read_record(&path).await? {
                Record::Missing => false,
                Record::Corrupt => true,
                Record::Found(session) => session.is_expired(now),
            };
            if stale && Self::remove(&path).await? {
                purged += 1;
            }
        }
        Ok(purged)
    }

    async fn stats(&self) -> Result<SessionStats, ChatGateError> {
        let now = self.clock.now();
        let mut stats = SessionStats {
            total_sessions: 0,
            active_sessions: 0,
        };
        for path in self.session_files().await? {
            if let Record::Found(session) = Self::read_record(&path).await? {
                stats.total_sessions += 1;
                if !session.is_expired(now) {
                    stats.active_sessions += 1;
                }
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use serde_json::json;

    const TTL: Duration = Duration::from_secs(15 * 60);

    async fn store(dir: &Path) -> (Arc<ManualClock>, FileSessionStore) {
        let clock = Arc::new(ManualClock::starting_now());
        let store = FileSessionStore::open(dir, clock.clone(), TTL).await.unwrap();
        (clock, store)
    }

    #[tokio::test]
    async fn sessions_survive_reopening() {
        let dir = tempfile::tempdir().unwrap();
        let (clock, first) = store(dir.path()).await;
        let created = first.create(json!({"x": 1})).await.unwrap();
        drop(first);

        let reopened = FileSessionStore::open(dir.path(), clock, TTL).await.unwrap();
        let fetched = reopened.get(&created.id).await.unwrap().unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn expired_session_file_is_removed_on_read() {
        let dir = tempfile::tempdir().unwrap();
        let (clock, store) = store(dir.path()).await;
        let created = store.create(json!({"x": 1})).await.unwrap();
        let path = store.path_for(&created.id).unwrap();
        assert!(path.exists());

        clock.advance(TTL + Duration::from_secs(1));
        assert!(store.get(&created.id).await.unwrap().is_none());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn corrupt_record_is_absent_and_purged() {
        let dir = tempfile::tempdir().unwrap();
        let (_, store) = store(dir.path()).await;
        let path = dir.path().join("template_1_corrupt00.json");
        std::fs::write(&path, b"{not json").unwrap();

        assert!(store.get("template_1_corrupt00").await.unwrap().is_none());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn failed_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        // A non-empty directory in the way makes the rename fail.
        let target = dir.path().join("template_1_blocked00.json");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("occupant"), b"x").unwrap();

        let result = FileSessionStore::write_atomically(&target, b"{}").await;

        assert!(result.is_err());
        assert!(!dir.path().join("template_1_blocked00.json.tmp").exists());
        assert!(target.is_dir());
    }

    #[tokio::test]
    async fn path_traversal_ids_are_absent() {
        let dir = tempfile::tempdir().unwrap();
        let (_, store) = store(dir.path()).await;
        assert!(store.get("../etc/passwd").await.unwrap().is_none());
        assert!(!store.delete("../secret").await.unwrap());
    }

    #[tokio::test]
    async fn sweep_removes_expired_and_corrupt_files() {
        let dir = tempfile::tempdir().unwrap();
        let (clock, store) = store(dir.path()).await;
        store.create(json!("old")).await.unwrap();
        clock.advance(TTL);
        let fresh = store.create(json!("new")).await.unwrap();
        std::fs::write(dir.path().join("junk.json"), b"[]").unwrap();

        assert_eq!(store.sweep().await.unwrap(), 2);
        assert_eq!(
            store.stats().await.unwrap(),
            SessionStats {
                total_sessions: 1,
                active_sessions: 1
            }
        );
        assert!(store.get(&fresh.id).await.unwrap().is_some());
        assert!(store.delete(&fresh.id).await.unwrap());
    }
}
