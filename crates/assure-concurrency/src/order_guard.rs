use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{error, warn};

use assure_core::error::{AssureError, Result};

/// Rejects messages that arrive with a timestamp older than the last one
/// accepted for the same user, same as the source.
pub struct OrderGuard {
    conn: ConnectionManager,
    ttl_secs: u64,
    scope: &'static str,
}

impl OrderGuard {
    pub fn new(conn: ConnectionManager, ttl_secs: u64, scope: &'static str) -> Self {
        Self {
            conn,
            ttl_secs,
            scope,
        }
    }

    pub async fn allow(&mut self, user_key: &str, ts: i64) -> Result<bool> {
        let key = format!("order:{}:{user_key}", self.scope);

        let last: Option<String> = self
            .conn
            .get(&key)
            .await
            .map_err(|e| AssureError::Cache(e.to_string()))?;

        if let Some(last_raw) = &last {
            match last_raw.parse::<i64>() {
                Ok(last_ts) if ts < last_ts => return Ok(false),
                Ok(_) => {}
                Err(e) => warn!(key = %key, last = %last_raw, err = %e, "OrderGuard: failed to parse last ts"),
            }
        }

        let mut pipe = redis::pipe();
        pipe.atomic()
            .set(&key, ts.to_string())
            .ignore()
            .expire(&key, self.ttl_secs as i64)
            .ignore();
        pipe.query_async::<()>(&mut self.conn).await.map_err(|e| {
            error!(key = %key, err = %e, "REDIS_FAILURE: order guard pipeline failed");
            AssureError::Cache(e.to_string())
        })?;

        Ok(true)
    }
}
