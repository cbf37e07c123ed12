use crate::types::Snapshot;
use redis::{AsyncCommands, RedisResult};

/// Redis snapshot semantics - defines only key layout and the raw
/// read/write primitives so the API and any other consumer agree on them.

pub const SNAPSHOT_PREFIX: &str = "verdict:snapshot";

/// Key holding the serialized snapshot body for an exercise session
pub fn snapshot_key(session_id: &str) -> String {
    format!("{}:{}", SNAPSHOT_PREFIX, session_id)
}

/// Key holding the "restore pending" flag for an exercise session
pub fn pending_key(session_id: &str) -> String {
    format!("{}:{}:pending", SNAPSHOT_PREFIX, session_id)
}

/// Store a snapshot and raise its pending flag.
///
/// Overwrites any previous snapshot for the session. Both keys carry a
/// 24-hour TTL so an abandoned session does not leak.
pub async fn store_snapshot(
    conn: &mut redis::aio::ConnectionManager,
    session_id: &str,
    snapshot: &Snapshot,
) -> RedisResult<()> {
    let payload = serde_json::to_string(snapshot)
        .map_err(|e| redis::RedisError::from((redis::ErrorKind::TypeError, "serialization error", e.to_string())))?;

    let _: () = conn.set_ex(snapshot_key(session_id), payload, 86400).await?;
    let _: () = conn.set_ex(pending_key(session_id), 1, 86400).await?;

    Ok(())
}

/// Clear the pending flag and return the raw snapshot body if this caller
/// was the one to clear it.
///
/// `DEL` reports how many keys it removed, so at most one caller ever sees
/// `1` for a given save. The body is left in place for diagnostics.
pub async fn take_pending_snapshot(
    conn: &mut redis::aio::ConnectionManager,
    session_id: &str,
) -> RedisResult<Option<String>> {
    let removed: i64 = conn.del(pending_key(session_id)).await?;
    if removed == 0 {
        return Ok(None);
    }

    conn.get(snapshot_key(session_id)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_key_format() {
        assert_eq!(snapshot_key("abc"), "verdict:snapshot:abc");
    }

    #[test]
    fn test_pending_key_is_distinct_and_deterministic() {
        let key1 = pending_key("abc");
        let key2 = pending_key("abc");
        assert_eq!(key1, key2);
        assert_ne!(key1, snapshot_key("abc"));
        assert!(key1.starts_with("verdict:snapshot:abc"));
    }
}
