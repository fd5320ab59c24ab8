//! Memory subsystem — the conversation log and its SQLite plumbing.
//!
//! ```text
//! {work_dir}/
//! ├── chat_history.db     chat_history(id, session_id, role, message, timestamp)
//! └── agri_knowledge.db   owned by the knowledge stage, opened with the same helper
//! ```
//!
//! The reply path only ever appends through [`TurnSink`]; the history read
//! path (`/api/chat/*`) reads [`ConversationLog`] directly.

pub mod conversation_log;

use std::fs;
use std::future::Future;
use std::path::Path;

use rusqlite::Connection;

use crate::error::AppError;

pub use conversation_log::{ConversationLog, Role, SessionSummary, Turn};

/// Append-only sink for conversation turns.
pub trait TurnSink: Send + Sync {
    fn append(&self, session_id: &str, role: Role, text: &str) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Open a SQLite connection to `db_path` and apply the shared pragmas.
///
/// Creates the parent directory if needed.
///
/// - `journal_mode = WAL` — readers don't block the appending writer.
/// - `busy_timeout = 5000` — wait up to 5 s before returning `SQLITE_BUSY`.
pub(crate) fn open_conn(db_path: &Path) -> Result<Connection, AppError> {
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(db_path)
        .map_err(|e| AppError::Storage(format!("open {}: {e}", db_path.display())))?;

    conn.pragma_update(None, "journal_mode", "WAL")
        .map_err(|e| AppError::Storage(format!("set journal_mode WAL: {e}")))?;
    conn.pragma_update(None, "busy_timeout", 5000)
        .map_err(|e| AppError::Storage(format!("set busy_timeout: {e}")))?;

    Ok(conn)
}
