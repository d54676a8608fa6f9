use std::sync::Mutex;

use assure_core::error::{AssureError, Result};
use assure_core::types::{HistoryEntry, Session, MAX_HISTORY_ENTRIES};
use rusqlite::{params, Connection};
use tracing::instrument;

/// Durable rusqlite-backed store for the `sessions` document and its
/// `conversation_history` log. A single `Mutex<Connection>` is sufficient
/// for a single-node deployment, same tradeoff as the teacher's session
/// manager.
pub struct SessionStore {
    db: Mutex<Connection>,
}

impl SessionStore {
    pub fn new(conn: Connection) -> Result<Self> {
        crate::db::init_db(&conn)?;
        Ok(Self { db: Mutex::new(conn) })
    }

    #[instrument(skip(self, session), fields(session_id = %session.session_id))]
    pub fn upsert(&self, session: &Session) -> Result<()> {
        // `history` is persisted separately via `append_history`; the
        // document row carries everything else.
        let mut without_history = session.clone();
        without_history.history.clear();
        let data = serde_json::to_string(&without_history)?;

        let db = self.db.lock().expect("session store mutex poisoned");
        db.execute(
            "INSERT INTO sessions (session_id, data, last_active)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(session_id) DO UPDATE SET data = excluded.data, last_active = excluded.last_active",
            params![
                session.session_id,
                data,
                session.last_active.to_rfc3339(),
            ],
        )
        .map_err(|e| AssureError::Database(e.to_string()))?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn get(&self, session_id: &str) -> Result<Option<Session>> {
        let db = self.db.lock().expect("session store mutex poisoned");
        let row: Option<String> = db
            .query_row(
                "SELECT data FROM sessions WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(AssureError::Database(other.to_string())),
            })?;

        let Some(data) = row else { return Ok(None) };
        drop(db);

        let mut session: Session = serde_json::from_str(&data)?;
        session.history = self.recent_history(session_id, MAX_HISTORY_ENTRIES)?;
        Ok(Some(session))
    }

    #[instrument(skip(self))]
    pub fn delete(&self, session_id: &str) -> Result<()> {
        let db = self.db.lock().expect("session store mutex poisoned");
        db.execute("DELETE FROM sessions WHERE session_id = ?1", params![session_id])
            .map_err(|e| AssureError::Database(e.to_string()))?;
        db.execute(
            "DELETE FROM conversation_history WHERE session_id = ?1",
            params![session_id],
        )
        .map_err(|e| AssureError::Database(e.to_string()))?;
        Ok(())
    }

    /// Append one turn to the append-only history log.
    pub fn append_history(&self, session_id: &str, entry: &HistoryEntry) -> Result<()> {
        let db = self.db.lock().expect("session store mutex poisoned");
        db.execute(
            "INSERT INTO conversation_history (session_id, timestamp, user, assistant)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                session_id,
                entry.timestamp.to_rfc3339(),
                entry.user,
                entry.assistant,
            ],
        )
        .map_err(|e| AssureError::Database(e.to_string()))?;
        Ok(())
    }

    /// Cheap connectivity check for the readiness probe.
    pub fn ping(&self) -> Result<()> {
        let db = self.db.lock().expect("session store mutex poisoned");
        db.query_row("SELECT 1", [], |_| Ok(()))
            .map_err(|e| AssureError::Database(e.to_string()))
    }

    /// The most recent `limit` turns, oldest first (matching in-memory
    /// `Session.history` ordering).
    pub fn recent_history(&self, session_id: &str, limit: usize) -> Result<Vec<HistoryEntry>> {
        let db = self.db.lock().expect("session store mutex poisoned");
        let mut stmt = db
            .prepare(
                "SELECT timestamp, user, assistant FROM conversation_history
                 WHERE session_id = ?1
                 ORDER BY timestamp DESC
                 LIMIT ?2",
            )
            .map_err(|e| AssureError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![session_id, limit as i64], |row| {
                let timestamp: String = row.get(0)?;
                Ok((timestamp, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
            })
            .map_err(|e| AssureError::Database(e.to_string()))?;

        let mut entries: Vec<HistoryEntry> = Vec::new();
        for row in rows {
            let (timestamp, user, assistant) = row.map_err(|e| AssureError::Database(e.to_string()))?;
            let timestamp = chrono::DateTime::parse_from_rfc3339(&timestamp)
                .map_err(|e| AssureError::Internal(format!("corrupt history timestamp: {e}")))?;
            entries.push(HistoryEntry {
                timestamp,
                user,
                assistant,
            });
        }
        entries.reverse();
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assure_core::catalog::Product;

    fn store() -> SessionStore {
        SessionStore::new(Connection::open_in_memory().unwrap()).unwrap()
    }

    #[test]
    fn roundtrips_a_session_without_history_in_the_blob() {
        let store = store();
        let mut session = Session::new("abc");
        session.product = Some(Product::Travel);
        store.upsert(&session).unwrap();

        let loaded = store.get("abc").unwrap().unwrap();
        assert_eq!(loaded.product, Some(Product::Travel));
        assert!(loaded.history.is_empty());
    }

    #[test]
    fn history_is_recovered_from_the_append_only_log() {
        let store = store();
        let session = Session::new("abc");
        store.upsert(&session).unwrap();

        for i in 0..3 {
            let entry = HistoryEntry {
                timestamp: assure_core::time::now_sgt(),
                user: format!("msg{i}"),
                assistant: format!("reply{i}"),
            };
            store.append_history("abc", &entry).unwrap();
        }

        let loaded = store.get("abc").unwrap().unwrap();
        assert_eq!(loaded.history.len(), 3);
        assert_eq!(loaded.history[0].user, "msg0");
        assert_eq!(loaded.history[2].user, "msg2");
    }

    #[test]
    fn missing_session_returns_none() {
        let store = store();
        assert!(store.get("nope").unwrap().is_none());
    }

    #[test]
    fn ping_succeeds_against_an_open_connection() {
        let store = store();
        assert!(store.ping().is_ok());
    }

    #[test]
    fn delete_removes_document_and_history() {
        let store = store();
        let session = Session::new("abc");
        store.upsert(&session).unwrap();
        let entry = HistoryEntry {
            timestamp: assure_core::time::now_sgt(),
            user: "hi".into(),
            assistant: "hello".into(),
        };
        store.append_history("abc", &entry).unwrap();

        store.delete("abc").unwrap();
        assert!(store.get("abc").unwrap().is_none());
        assert!(store.recent_history("abc", 5).unwrap().is_empty());
    }
}
