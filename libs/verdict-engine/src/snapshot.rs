//! Snapshot persistence across an intentional reload.
//!
//! A submission's results are saved right before the host reloads and are
//! handed back exactly once on the next load. The stored body may outlive the
//! pending flag for diagnostics, but it is never consumed twice.

use async_trait::async_trait;
use std::sync::Mutex;
use tracing::{info, warn};
use verdict_common::types::Snapshot;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("Failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Snapshot storage error: {0}")]
    Storage(String),
}

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Persist `snapshot`, replacing any earlier one
    async fn save(&self, snapshot: &Snapshot) -> Result<(), SnapshotError>;

    /// Take the pending snapshot, if any. Missing, already consumed and
    /// unreadable snapshots all come back as `None`.
    async fn consume(&self) -> Option<Snapshot>;
}

fn parse_snapshot(body: &str) -> Option<Snapshot> {
    match serde_json::from_str::<Snapshot>(body) {
        Ok(snapshot) => Some(snapshot.into_restored()),
        Err(e) => {
            warn!(error = %e, "Discarding malformed snapshot");
            None
        }
    }
}

#[derive(Debug, Default)]
struct MemorySlot {
    body: Option<String>,
    pending: bool,
}

/// Process-local store, used by tests and by the API when Redis is not configured
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    slot: Mutex<MemorySlot>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with an arbitrary pending body
    pub fn with_raw(body: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(MemorySlot {
                body: Some(body.into()),
                pending: true,
            }),
        }
    }

    /// Last saved body, kept after consumption
    pub fn retained(&self) -> Option<String> {
        self.slot.lock().ok().and_then(|slot| slot.body.clone())
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn save(&self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        let body = serde_json::to_string(snapshot)?;
        let mut slot = self
            .slot
            .lock()
            .map_err(|e| SnapshotError::Storage(e.to_string()))?;
        slot.body = Some(body);
        slot.pending = true;
        Ok(())
    }

    async fn consume(&self) -> Option<Snapshot> {
        let body = {
            let mut slot = self.slot.lock().ok()?;
            if !std::mem::take(&mut slot.pending) {
                return None;
            }
            slot.body.clone()?
        };
        parse_snapshot(&body)
    }
}

/// Redis-backed store for one exercise session
#[derive(Clone)]
pub struct RedisSnapshotStore {
    conn: redis::aio::ConnectionManager,
    session_id: String,
}

impl RedisSnapshotStore {
    pub fn new(conn: redis::aio::ConnectionManager, session_id: impl Into<String>) -> Self {
        Self {
            conn,
            session_id: session_id.into(),
        }
    }
}

#[async_trait]
impl SnapshotStore for RedisSnapshotStore {
    async fn save(&self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        let mut conn = self.conn.clone();
        verdict_common::redis::store_snapshot(&mut conn, &self.session_id, snapshot)
            .await
            .map_err(|e| SnapshotError::Storage(e.to_string()))?;

        info!(session_id = %self.session_id, results = snapshot.results.len(), "Snapshot saved");
        Ok(())
    }

    async fn consume(&self) -> Option<Snapshot> {
        let mut conn = self.conn.clone();
        match verdict_common::redis::take_pending_snapshot(&mut conn, &self.session_id).await {
            Ok(Some(body)) => parse_snapshot(&body),
            Ok(None) => None,
            Err(e) => {
                warn!(session_id = %self.session_id, error = %e, "Failed to read snapshot");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use verdict_common::types::{CaseResult, Language, Mode};

    fn case_result(is_submission: bool) -> CaseResult {
        CaseResult {
            atomic_id: "q1#0".to_string(),
            origin_id: "q1".to_string(),
            ordinal: 0,
            hidden: true,
            passed: true,
            input: "1".to_string(),
            actual_output: "2".to_string(),
            expected_output: "2".to_string(),
            error: String::new(),
            time_ms: Some(3.5),
            memory_kb: 1024,
            is_submission,
        }
    }

    fn snapshot() -> Snapshot {
        Snapshot::new(
            "print(int(input()) + 1)",
            Language::Python,
            Mode::Submit,
            vec![case_result(false), case_result(true)],
        )
    }

    #[tokio::test]
    async fn test_consume_returns_saved_snapshot_once() {
        let store = MemorySnapshotStore::new();
        let saved = snapshot();
        store.save(&saved).await.unwrap();

        let restored = store.consume().await.expect("snapshot should be pending");
        assert_eq!(restored.code, saved.code);
        assert_eq!(restored.timestamp, saved.timestamp);
        assert_eq!(restored.results.len(), 2);
        assert!(restored.results.iter().all(|r| r.is_submission));

        assert!(store.consume().await.is_none());
        assert!(store.retained().is_some());
    }

    #[tokio::test]
    async fn test_save_overwrites_previous_snapshot() {
        let store = MemorySnapshotStore::new();
        let mut first = snapshot();
        first.code = "first".to_string();
        let mut second = snapshot();
        second.code = "second".to_string();

        store.save(&first).await.unwrap();
        store.save(&second).await.unwrap();

        assert_eq!(store.consume().await.unwrap().code, "second");
        assert!(store.consume().await.is_none());
    }

    #[tokio::test]
    async fn test_empty_store_consumes_none() {
        assert!(MemorySnapshotStore::new().consume().await.is_none());
    }

    #[tokio::test]
    async fn test_malformed_snapshot_consumes_none() {
        let store = MemorySnapshotStore::with_raw("{\"code\": 42");
        assert!(store.consume().await.is_none());
    }

    #[tokio::test]
    #[ignore] // Requires a running Redis instance (REDIS_URL)
    async fn test_redis_store_single_consumption() {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        let client = redis::Client::open(url.as_str()).expect("Failed to create Redis client");
        let conn = client.get_connection_manager().await.expect("Failed to connect to Redis");

        let store = RedisSnapshotStore::new(conn, format!("test-{}", std::process::id()));
        store.save(&snapshot()).await.unwrap();

        assert!(store.consume().await.is_some());
        assert!(store.consume().await.is_none());
    }
}
