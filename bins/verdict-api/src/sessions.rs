// Live exercise sessions keyed by client-supplied id
//
// Sessions idle past the TTL are swept, and the least recently used one is
// dropped when the map is full. A session still held by an in-flight
// request is never swept.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};
use verdict_engine::session::ExerciseSession;

struct Entry {
    session: Arc<ExerciseSession>,
    last_used: Instant,
}

pub struct SessionRegistry {
    entries: Mutex<HashMap<String, Entry>>,
    idle_ttl: Duration,
    capacity: usize,
}

impl SessionRegistry {
    pub fn new(idle_ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            idle_ttl,
            capacity: capacity.max(1),
        }
    }

    pub fn idle_ttl(&self) -> Duration {
        self.idle_ttl
    }

    /// Session for `id`, built with `create` on first use
    pub async fn get_or_create<F>(&self, id: &str, create: F) -> Arc<ExerciseSession>
    where
        F: FnOnce() -> ExerciseSession,
    {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        if let Some(entry) = entries.get_mut(id) {
            entry.last_used = now;
            return entry.session.clone();
        }

        if entries.len() >= self.capacity {
            evict_expired(&mut entries, now, self.idle_ttl);
        }
        if entries.len() >= self.capacity {
            evict_oldest(&mut entries);
        }

        let session = Arc::new(create());
        entries.insert(
            id.to_string(),
            Entry {
                session: session.clone(),
                last_used: now,
            },
        );
        info!(session_id = %id, sessions = entries.len(), "Session created");
        session
    }

    /// Session for `id` if it is live. Counts as a use.
    pub async fn get(&self, id: &str) -> Option<Arc<ExerciseSession>> {
        let mut entries = self.entries.lock().await;
        let entry = entries.get_mut(id)?;
        entry.last_used = Instant::now();
        Some(entry.session.clone())
    }

    /// Drop sessions idle for longer than the TTL as of `now`. Returns how many went.
    pub async fn evict_idle(&self, now: Instant) -> usize {
        let mut entries = self.entries.lock().await;
        let evicted = evict_expired(&mut entries, now, self.idle_ttl);
        if evicted > 0 {
            info!(evicted = evicted, remaining = entries.len(), "Idle sessions evicted");
        }
        evicted
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

fn evict_expired(entries: &mut HashMap<String, Entry>, now: Instant, ttl: Duration) -> usize {
    let before = entries.len();
    entries.retain(|_, entry| {
        let idle = now.saturating_duration_since(entry.last_used);
        idle <= ttl || Arc::strong_count(&entry.session) > 1
    });
    before - entries.len()
}

fn evict_oldest(entries: &mut HashMap<String, Entry>) {
    let oldest = entries
        .iter()
        .min_by_key(|(_, entry)| entry.last_used)
        .map(|(id, _)| id.clone());

    if let Some(id) = oldest {
        entries.remove(&id);
        debug!(session_id = %id, "Session limit reached, dropped least recently used");
    }
}

/// Sweep idle sessions every `period` until the process exits
pub fn spawn_sweeper(registry: Arc<SessionRegistry>, period: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            registry.evict_idle(Instant::now()).await;
        }
    });
}
