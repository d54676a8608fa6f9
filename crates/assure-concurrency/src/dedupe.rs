use redis::aio::ConnectionManager;
use tracing::error;

use assure_core::error::{AssureError, Result};

/// Rejects a message ID seen within the last `ttl_secs` via `SET key 1 NX
/// EX ttl`, same as the source.
pub struct Deduplicator {
    conn: ConnectionManager,
    ttl_secs: u64,
    scope: &'static str,
}

impl Deduplicator {
    pub fn new(conn: ConnectionManager, ttl_secs: u64, scope: &'static str) -> Self {
        Self {
            conn,
            ttl_secs,
            scope,
        }
    }

    /// Returns `true` if `message_id` hasn't been seen before (i.e. this
    /// call claimed it), `false` if it's a duplicate.
    pub async fn is_new(&mut self, message_id: &str) -> Result<bool> {
        let key = format!("dedupe:{}:{message_id}", self.scope);
        let created: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg("1")
            .arg("NX")
            .arg("EX")
            .arg(self.ttl_secs)
            .query_async(&mut self.conn)
            .await
            .map_err(|e| {
                error!(key = %key, err = %e, "REDIS_FAILURE: dedupe set failed");
                AssureError::Cache(e.to_string())
            })?;

        Ok(created.is_some())
    }
}
