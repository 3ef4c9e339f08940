//! Database module for Dr. Aidy
//!
//! Provides persistence for accounts, session snapshots and stored query
//! records.

mod schema;

pub use schema::*;

use crate::answer::AnswerSource;
use crate::locale::Language;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Failed to encode session state: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Session not found: {0}")]
    SessionNotFound(String),
    #[error("User already exists: {0}")]
    UserExists(String),
    #[error("Database connection lock poisoned")]
    Poisoned,
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn conn(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    fn run_migrations(&self) -> DbResult<()> {
        self.conn()?.execute_batch(SCHEMA)?;
        Ok(())
    }

    // ==================== User Operations ====================

    pub fn insert_user(&self, user: &UserRecord) -> DbResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO users (username, password_hash, salt, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                user.username,
                user.password_hash,
                user.salt,
                user.created_at.to_rfc3339()
            ],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation => {
                DbError::UserExists(user.username.clone())
            }
            other => DbError::Sqlite(other),
        })?;
        Ok(())
    }

    /// Exact username lookup
    pub fn find_user(&self, username: &str) -> DbResult<Option<UserRecord>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                "SELECT username, password_hash, salt, created_at FROM users WHERE username = ?1",
                params![username],
                |row| {
                    Ok(UserRecord {
                        username: row.get(0)?,
                        password_hash: row.get(1)?,
                        salt: row.get(2)?,
                        created_at: parse_datetime(&row.get::<_, String>(3)?),
                    })
                },
            )
            .optional()?;
        Ok(user)
    }

    // ==================== Session Operations ====================

    /// Create a new session in its initial state
    pub fn create_session(&self, id: &str, username: &str) -> DbResult<SessionRecord> {
        let conn = self.conn()?;
        let now = Utc::now();
        let state = Session::default();

        conn.execute(
            "INSERT INTO sessions (id, username, state, closed, created_at, updated_at)
             VALUES (?1, ?2, ?3, 0, ?4, ?4)",
            params![id, username, serde_json::to_string(&state)?, now.to_rfc3339()],
        )?;

        Ok(SessionRecord {
            id: id.to_string(),
            username: username.to_string(),
            state,
            closed: false,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn get_session(&self, id: &str) -> DbResult<SessionRecord> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, username, state, closed, created_at, updated_at FROM sessions WHERE id = ?1",
            params![id],
            |row| {
                let state_json: String = row.get(2)?;
                let state: Session = serde_json::from_str(&state_json).unwrap_or_else(|e| {
                    tracing::warn!(session_id = %id, error = %e, "Unreadable session state, resetting");
                    Session::default()
                });
                Ok(SessionRecord {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    state,
                    closed: row.get(3)?,
                    created_at: parse_datetime(&row.get::<_, String>(4)?),
                    updated_at: parse_datetime(&row.get::<_, String>(5)?),
                })
            },
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => DbError::SessionNotFound(id.to_string()),
            other => DbError::Sqlite(other),
        })
    }

    /// Replace the session snapshot
    pub fn update_session(&self, id: &str, state: &Session) -> DbResult<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE sessions SET state = ?1, updated_at = ?2 WHERE id = ?3",
            params![serde_json::to_string(state)?, Utc::now().to_rfc3339(), id],
        )?;
        if updated == 0 {
            return Err(DbError::SessionNotFound(id.to_string()));
        }
        Ok(())
    }

    /// Mark a session as logged out
    pub fn close_session(&self, id: &str) -> DbResult<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE sessions SET closed = 1, updated_at = ?1 WHERE id = ?2",
            params![Utc::now().to_rfc3339(), id],
        )?;
        if updated == 0 {
            return Err(DbError::SessionNotFound(id.to_string()));
        }
        Ok(())
    }

    // ==================== Query Record Operations ====================

    /// Append one stored query record
    pub fn append_query(&self, record: &NewQueryRecord) -> DbResult<QueryRecord> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO queries (username, session_id, query, response, source, language, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.username,
                record.session_id,
                record.query,
                record.response,
                record.source.as_str(),
                record.language.code(),
                record.created_at.to_rfc3339(),
            ],
        )?;

        Ok(QueryRecord {
            id: conn.last_insert_rowid(),
            username: record.username.clone(),
            session_id: record.session_id.clone(),
            query: record.query.clone(),
            response: record.response.clone(),
            source: record.source,
            language: record.language,
            created_at: record.created_at,
        })
    }

    /// All stored queries of a user, oldest first
    pub fn list_queries(&self, username: &str) -> DbResult<Vec<QueryRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, username, session_id, query, response, source, language, created_at
             FROM queries WHERE username = ?1 ORDER BY id ASC",
        )?;

        let rows = stmt.query_map(params![username], |row| {
            Ok(QueryRecord {
                id: row.get(0)?,
                username: row.get(1)?,
                session_id: row.get(2)?,
                query: row.get(3)?,
                response: row.get(4)?,
                source: AnswerSource::parse(&row.get::<_, String>(5)?)
                    .unwrap_or(AnswerSource::Fallback),
                language: Language::from_code(&row.get::<_, String>(6)?)
                    .unwrap_or(Language::English),
                created_at: parse_datetime(&row.get::<_, String>(7)?),
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
