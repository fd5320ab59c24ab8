//! SQLite conversation log.
//!
//! One row per turn, never updated or deleted. Timestamps are UTC RFC 3339
//! with millisecond precision so lexical order matches time order; ties are
//! broken by the autoincrement id.

use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};

use super::{TurnSink, open_conn};
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    fn from_db(s: &str) -> Self {
        if s == "user" { Role::User } else { Role::Assistant }
    }
}

/// One stored message. Immutable once written.
///
/// The history endpoint serves `{role, message, timestamp}`; the row id and
/// session id stay server-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    #[serde(skip)]
    pub id: i64,
    #[serde(skip)]
    pub session_id: String,
    pub role: Role,
    #[serde(rename = "message")]
    pub text: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub start_time: String,
}

#[derive(Debug, Clone)]
pub struct ConversationLog {
    conn: Arc<Mutex<Connection>>,
}

impl ConversationLog {
    pub fn open(db_path: &Path) -> Result<Self, AppError> {
        let conn = open_conn(db_path)?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS chat_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                role TEXT NOT NULL,
                message TEXT NOT NULL,
                timestamp TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_chat_history_session ON chat_history(session_id);
            ",
        )
        .map_err(|e| AppError::Storage(format!("chat_history: initialize schema: {e}")))?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    /// All turns of `session_id` in timestamp order, or `None` if the
    /// session has never been written.
    pub async fn history(&self, session_id: &str) -> Result<Option<Vec<Turn>>, AppError> {
        let conn = self.conn.clone();
        let session_id = session_id.to_string();
        tokio::task::spawn_blocking(move || -> Result<Option<Vec<Turn>>, AppError> {
            let conn = conn.lock().unwrap_or_else(|e| e.into_inner());
            let mut stmt = conn
                .prepare(
                    "SELECT id, session_id, role, message, timestamp FROM chat_history \
                     WHERE session_id = ?1 ORDER BY timestamp ASC, id ASC",
                )
                .map_err(|e| AppError::Storage(format!("chat_history: prepare history: {e}")))?;
            let turns = stmt
                .query_map(params![session_id], |row| {
                    Ok(Turn {
                        id: row.get(0)?,
                        session_id: row.get(1)?,
                        role: Role::from_db(&row.get::<_, String>(2)?),
                        text: row.get(3)?,
                        timestamp: row.get(4)?,
                    })
                })
                .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
                .map_err(|e| AppError::Storage(format!("chat_history: read history: {e}")))?;
            Ok(if turns.is_empty() { None } else { Some(turns) })
        })
        .await
        .map_err(|e| AppError::Storage(format!("chat_history: history task failed: {e}")))?
    }

    /// Every session with its first-turn time, most recent first.
    pub async fn list_sessions(&self) -> Result<Vec<SessionSummary>, AppError> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap_or_else(|e| e.into_inner());
            let mut stmt = conn
                .prepare(
                    "SELECT session_id, MIN(timestamp) AS start_time FROM chat_history \
                     GROUP BY session_id ORDER BY start_time DESC",
                )
                .map_err(|e| AppError::Storage(format!("chat_history: prepare sessions: {e}")))?;
            stmt.query_map([], |row| {
                Ok(SessionSummary { session_id: row.get(0)?, start_time: row.get(1)? })
            })
            .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
            .map_err(|e| AppError::Storage(format!("chat_history: list sessions: {e}")))
        })
        .await
        .map_err(|e| AppError::Storage(format!("chat_history: sessions task failed: {e}")))?
    }
}

impl TurnSink for ConversationLog {
    async fn append(&self, session_id: &str, role: Role, text: &str) -> Result<(), AppError> {
        let conn = self.conn.clone();
        let session_id = session_id.to_string();
        let text = text.to_string();
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap_or_else(|e| e.into_inner());
            conn.execute(
                "INSERT INTO chat_history (session_id, role, message, timestamp) VALUES (?1, ?2, ?3, ?4)",
                params![session_id, role.as_str(), text, timestamp],
            )
            .map(|_| ())
            .map_err(|e| AppError::Storage(format!("chat_history: append: {e}")))
        })
        .await
        .map_err(|e| AppError::Storage(format!("chat_history: append task failed: {e}")))?
    }
}
