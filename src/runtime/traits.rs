//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the executor with mock implementations.

use crate::answer::{Answer, AnswerPipeline};
use crate::db::{Database, NewQueryRecord};
use crate::locale::Language;
use crate::speech::{TranscriptionError, VoicePipeline};
use crate::state_machine::Session;
use async_trait::async_trait;
use std::sync::Arc;

/// Storage for session snapshots
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Replace the stored snapshot of a session
    async fn update_session(&self, session_id: &str, state: &Session) -> Result<(), String>;

    /// Get the stored snapshot of a session
    async fn get_session(&self, session_id: &str) -> Result<Session, String>;
}

/// Append-only sink for stored query records
#[async_trait]
pub trait QueryStore: Send + Sync {
    async fn append_query(&self, record: &NewQueryRecord) -> Result<(), String>;
}

/// Combined storage trait for convenience
pub trait Storage: SessionStore + QueryStore {}
impl<T: SessionStore + QueryStore> Storage for T {}

/// Produces an answer for a query. Never fails.
#[async_trait]
pub trait Answerer: Send + Sync {
    async fn answer(&self, query: &str, language: Language) -> Answer;
}

/// Captures one spoken query in the session language
#[async_trait]
pub trait VoiceCapture: Send + Sync {
    async fn capture(&self, language: Language) -> Result<String, TranscriptionError>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    async fn update_session(&self, session_id: &str, state: &Session) -> Result<(), String> {
        (**self).update_session(session_id, state).await
    }

    async fn get_session(&self, session_id: &str) -> Result<Session, String> {
        (**self).get_session(session_id).await
    }
}

#[async_trait]
impl<T: QueryStore + ?Sized> QueryStore for Arc<T> {
    async fn append_query(&self, record: &NewQueryRecord) -> Result<(), String> {
        (**self).append_query(record).await
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Adapter to use Database as Storage
#[derive(Clone)]
pub struct DatabaseStorage {
    db: Database,
}

impl DatabaseStorage {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SessionStore for DatabaseStorage {
    async fn update_session(&self, session_id: &str, state: &Session) -> Result<(), String> {
        self.db
            .update_session(session_id, state)
            .map_err(|e| e.to_string())
    }

    async fn get_session(&self, session_id: &str) -> Result<Session, String> {
        let record = self.db.get_session(session_id).map_err(|e| e.to_string())?;
        Ok(record.state)
    }
}

#[async_trait]
impl QueryStore for DatabaseStorage {
    async fn append_query(&self, record: &NewQueryRecord) -> Result<(), String> {
        self.db
            .append_query(record)
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

#[async_trait]
impl Answerer for AnswerPipeline {
    async fn answer(&self, query: &str, language: Language) -> Answer {
        AnswerPipeline::answer(self, query, language).await
    }
}

#[async_trait]
impl VoiceCapture for VoicePipeline {
    async fn capture(&self, language: Language) -> Result<String, TranscriptionError> {
        VoicePipeline::capture(self, language).await
    }
}
