use std::time::{Duration, Instant};

use redis::aio::ConnectionManager;
use tracing::error;
use uuid::Uuid;

use assure_core::error::{AssureError, Result};

/// Distributed lock with token-verified release, matching the source's
/// SETNX-with-PX-acquire / Lua-verified-release pattern.
pub struct RedisLock {
    conn: ConnectionManager,
    key: String,
    token: String,
    ttl_ms: u64,
    wait: Duration,
}

const RELEASE_SCRIPT: &str = r#"
if redis.call('get', KEYS[1]) == ARGV[1] then
    return redis.call('del', KEYS[1])
else
    return 0
end
"#;

impl RedisLock {
    pub fn new(conn: ConnectionManager, scope_key: &str, ttl: Duration, wait: Duration) -> Self {
        Self {
            conn,
            key: format!("lock:{scope_key}"),
            token: Uuid::new_v4().to_string(),
            ttl_ms: ttl.as_millis() as u64,
            wait,
        }
    }

    /// Poll every 50ms (matching the source) until the lock is acquired or
    /// `wait` elapses. Acquisition is a single atomic `SET key token NX PX
    /// ttl_ms`, same as the source's `set(nx=True, px=...)`.
    pub async fn acquire(&mut self) -> Result<()> {
        let deadline = Instant::now() + self.wait;
        loop {
            let acquired: Option<String> = redis::cmd("SET")
                .arg(&self.key)
                .arg(&self.token)
                .arg("NX")
                .arg("PX")
                .arg(self.ttl_ms)
                .query_async(&mut self.conn)
                .await
                .map_err(|e| {
                    error!(key = %self.key, err = %e, "REDIS_FAILURE: lock set failed");
                    AssureError::Cache(e.to_string())
                })?;

            if acquired.is_some() {
                return Ok(());
            }

            if Instant::now() >= deadline {
                return Err(AssureError::LockTimeout {
                    key: self.key.clone(),
                });
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    /// Release the lock only if it's still held by this token.
    pub async fn release(&mut self) -> Result<()> {
        let _: i64 = redis::Script::new(RELEASE_SCRIPT)
            .key(&self.key)
            .arg(&self.token)
            .invoke_async(&mut self.conn)
            .await
            .map_err(|e| {
                error!(key = %self.key, err = %e, "REDIS_FAILURE: lock release failed");
                AssureError::Cache(e.to_string())
            })?;
        Ok(())
    }
}
