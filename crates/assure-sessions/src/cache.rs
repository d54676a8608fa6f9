use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::error;

use assure_core::error::{AssureError, Result};
use assure_core::types::Session;

/// JSON-based session cache in Redis with TTL, matching the source's
/// `SessionCache`.
pub struct SessionCache {
    conn: ConnectionManager,
    ttl_secs: u64,
}

impl SessionCache {
    pub fn new(conn: ConnectionManager, ttl_secs: u64) -> Self {
        Self { conn, ttl_secs }
    }

    fn key(session_id: &str) -> String {
        format!("session:{session_id}")
    }

    pub async fn get(&mut self, session_id: &str) -> Result<Option<Session>> {
        let raw: Option<String> = self.conn.get(Self::key(session_id)).await.map_err(|e| {
            error!(session_id, err = %e, "REDIS_FAILURE: session cache get failed");
            AssureError::Cache(e.to_string())
        })?;

        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn set(&mut self, session: &Session) -> Result<()> {
        let payload = serde_json::to_string(session)?;
        let _: () = self
            .conn
            .set_ex(Self::key(&session.session_id), payload, self.ttl_secs)
            .await
            .map_err(|e| {
                error!(session_id = %session.session_id, err = %e, "REDIS_FAILURE: session cache set failed");
                AssureError::Cache(e.to_string())
            })?;
        Ok(())
    }

    pub async fn invalidate(&mut self, session_id: &str) -> Result<()> {
        let _: () = self.conn.del(Self::key(session_id)).await.map_err(|e| {
            error!(session_id, err = %e, "REDIS_FAILURE: session cache invalidate failed");
            AssureError::Cache(e.to_string())
        })?;
        Ok(())
    }
}
