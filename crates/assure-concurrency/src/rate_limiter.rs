use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::error;

use assure_core::error::{AssureError, Result};

/// Fixed-window rate limiter: INCR, then EXPIRE only on the window's first
/// hit, same as the source.
pub struct RateLimiter {
    conn: ConnectionManager,
    window_secs: u64,
    max_messages: u32,
    scope: &'static str,
}

impl RateLimiter {
    pub fn new(conn: ConnectionManager, window_secs: u64, max_messages: u32, scope: &'static str) -> Self {
        Self {
            conn,
            window_secs,
            max_messages,
            scope,
        }
    }

    pub async fn allow(&mut self, key: &str) -> Result<bool> {
        let redis_key = format!("rl:{}:{key}", self.scope);
        let count: i64 = self.conn.incr(&redis_key, 1).await.map_err(|e| {
            error!(key = %redis_key, err = %e, "REDIS_FAILURE: rate limiter incr failed");
            AssureError::Cache(e.to_string())
        })?;

        if count == 1 {
            let _: () = self
                .conn
                .expire(&redis_key, self.window_secs as i64)
                .await
                .map_err(|e| AssureError::Cache(e.to_string()))?;
        }

        Ok(count <= self.max_messages as i64)
    }
}
