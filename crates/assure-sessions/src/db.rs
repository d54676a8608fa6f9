use rusqlite::Connection;

use assure_core::error::{AssureError, Result};

/// Initialise the `sessions` and `conversation_history` tables and their
/// indexes. Safe to call on every startup.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS sessions (
            session_id  TEXT PRIMARY KEY,
            data        TEXT NOT NULL,
            last_active TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_sessions_last_active
            ON sessions(last_active);

        CREATE TABLE IF NOT EXISTS conversation_history (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id TEXT NOT NULL,
            timestamp  TEXT NOT NULL,
            user       TEXT NOT NULL,
            assistant  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_history_session
            ON conversation_history(session_id);
        CREATE INDEX IF NOT EXISTS idx_history_timestamp
            ON conversation_history(timestamp);",
    )
    .map_err(|e| AssureError::Database(e.to_string()))?;
    Ok(())
}
