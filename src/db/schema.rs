//! Database schema and types

use crate::answer::AnswerSource;
use crate::locale::Language;
pub use crate::state_machine::Session;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS users (
    username TEXT PRIMARY KEY,
    password_hash TEXT NOT NULL,
    salt TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    username TEXT NOT NULL,
    state TEXT NOT NULL,
    closed BOOLEAN NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sessions_username ON sessions(username);

CREATE TABLE IF NOT EXISTS queries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL,
    session_id TEXT NOT NULL,
    query TEXT NOT NULL,
    response TEXT NOT NULL,
    source TEXT NOT NULL,
    language TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_queries_username ON queries(username, id);
";

/// Account record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub username: String,
    /// Base64 SHA-256 of salt || password
    pub password_hash: String,
    /// Base64 random salt
    pub salt: String,
    pub created_at: DateTime<Utc>,
}

/// Session row: the latest snapshot of one conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub username: String,
    pub state: Session,
    pub closed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A resolved query, ready to be appended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewQueryRecord {
    pub username: String,
    pub session_id: String,
    pub query: String,
    pub response: String,
    pub source: AnswerSource,
    pub language: Language,
    pub created_at: DateTime<Utc>,
}

/// Stored query record. Write-once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRecord {
    pub id: i64,
    pub username: String,
    pub session_id: String,
    pub query: String,
    pub response: String,
    pub source: AnswerSource,
    pub language: Language,
    pub created_at: DateTime<Utc>,
}
