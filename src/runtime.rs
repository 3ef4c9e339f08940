//! Runtime for executing sessions
//!
//! Each active session gets its own event loop task. The manager starts
//! them on demand from the persisted snapshot and routes events to them.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::SessionRuntime;
pub use traits::*;

use crate::answer::AnswerPipeline;
use crate::db::{Database, DbError, QueryRecord, SessionRecord};
use crate::speech::VoicePipeline;
use crate::state_machine::{Event, Session, SessionContext, TransitionError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch, RwLock};
use tokio_util::sync::CancellationToken;

/// Type alias for production runtime with concrete implementations
pub type ProductionRuntime = SessionRuntime<DatabaseStorage, AnswerPipeline, VoicePipeline>;

/// An event plus, for caller-originated events, where to send the verdict
#[derive(Debug)]
pub struct Dispatch {
    pub event: Event,
    pub reply: Option<oneshot::Sender<Result<Session, TransitionError>>>,
}

impl Dispatch {
    /// Event produced by a background task; nobody waits for the result
    pub fn background(event: Event) -> Self {
        Self { event, reply: None }
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Rejected(#[from] TransitionError),
    #[error("Session not found: {0}")]
    SessionNotFound(String),
    #[error("Session is closed: {0}")]
    SessionClosed(String),
    #[error("Session runtime stopped")]
    RuntimeStopped,
    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<DbError> for DispatchError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::SessionNotFound(id) => DispatchError::SessionNotFound(id),
            other => DispatchError::Storage(other.to_string()),
        }
    }
}

/// Handle to interact with a running session
#[derive(Clone)]
pub struct SessionHandle {
    pub event_tx: mpsc::Sender<Dispatch>,
    pub state_rx: watch::Receiver<Session>,
    shutdown: CancellationToken,
}

impl SessionHandle {
    /// False once the event loop has exited
    fn is_running(&self) -> bool {
        !self.event_tx.is_closed()
    }
}

/// Session snapshot for display
#[derive(Debug, Clone)]
pub struct SessionView {
    pub id: String,
    pub username: String,
    pub state: Session,
}

/// How long a runtime with nothing in flight waits for events before stopping
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Manager for all session runtimes.
///
/// Runtimes are started on demand from the persisted snapshot and dropped
/// again once their session ends or goes idle.
pub struct RuntimeManager {
    db: Database,
    answers: Arc<AnswerPipeline>,
    voice: Arc<VoicePipeline>,
    idle_timeout: Duration,
    runtimes: RwLock<HashMap<String, SessionHandle>>,
}

impl RuntimeManager {
    pub fn new(db: Database, answers: Arc<AnswerPipeline>, voice: Arc<VoicePipeline>) -> Self {
        Self {
            db,
            answers,
            voice,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            runtimes: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Get the database handle
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Start a new session for an existing user
    pub fn create_session(&self, username: &str) -> Result<SessionRecord, DispatchError> {
        let id = uuid::Uuid::new_v4().to_string();
        let record = self.db.create_session(&id, username)?;
        tracing::info!(session_id = %id, username = %username, "Created session");
        Ok(record)
    }

    /// Get or create a runtime for a session
    pub async fn get_or_create(&self, session_id: &str) -> Result<SessionHandle, DispatchError> {
        // Check if already running
        {
            let runtimes = self.runtimes.read().await;
            if let Some(handle) = runtimes.get(session_id).filter(|h| h.is_running()) {
                return Ok(handle.clone());
            }
        }

        // Hold the write lock while starting so a session never gets two runtimes
        let mut runtimes = self.runtimes.write().await;
        if let Some(handle) = runtimes.get(session_id).filter(|h| h.is_running()) {
            return Ok(handle.clone());
        }

        let record = self.db.get_session(session_id)?;
        if record.closed {
            return Err(DispatchError::SessionClosed(session_id.to_string()));
        }

        let (event_tx, event_rx) = mpsc::channel(32);
        let (state_tx, state_rx) = watch::channel(record.state.clone());
        let shutdown = CancellationToken::new();

        let runtime: ProductionRuntime = SessionRuntime::new(
            SessionContext::new(&record.id, &record.username),
            record.state,
            DatabaseStorage::new(self.db.clone()),
            self.answers.clone(),
            self.voice.clone(),
            event_rx,
            event_tx.clone(),
            state_tx,
            shutdown.clone(),
        )
        .with_idle_timeout(self.idle_timeout);

        // Start runtime in background
        let id = session_id.to_string();
        tokio::spawn(async move {
            runtime.run().await;
            tracing::info!(session_id = %id, "Session runtime finished");
        });

        let handle = SessionHandle {
            event_tx,
            state_rx,
            shutdown,
        };
        runtimes.insert(session_id.to_string(), handle.clone());
        Ok(handle)
    }

    /// Send an event to a session and wait for the resulting state.
    ///
    /// A runtime that stopped for idleness before taking the event is
    /// restarted once. The runtime of a session that has ended is dropped.
    pub async fn dispatch(&self, session_id: &str, event: Event) -> Result<Session, DispatchError> {
        let session = match self.try_dispatch(session_id, event.clone()).await {
            Err(DispatchError::RuntimeStopped) => {
                tracing::debug!(session_id = %session_id, "Runtime stopped, restarting");
                self.try_dispatch(session_id, event).await?
            }
            other => other?,
        };

        if session.phase.is_terminal() {
            self.evict(session_id).await;
        }
        Ok(session)
    }

    async fn try_dispatch(&self, session_id: &str, event: Event) -> Result<Session, DispatchError> {
        let handle = self.get_or_create(session_id).await?;
        let (reply_tx, reply_rx) = oneshot::channel();
        handle
            .event_tx
            .send(Dispatch {
                event,
                reply: Some(reply_tx),
            })
            .await
            .map_err(|_| DispatchError::RuntimeStopped)?;

        let session = reply_rx.await.map_err(|_| DispatchError::RuntimeStopped)??;
        Ok(session)
    }

    /// Stop a session's runtime; the next event starts it again from storage
    async fn evict(&self, session_id: &str) {
        if let Some(handle) = self.runtimes.write().await.remove(session_id) {
            handle.shutdown.cancel();
            tracing::info!(session_id = %session_id, "Evicted session runtime");
        }
    }

    /// Current state of a session. Reads only; never starts a runtime.
    pub async fn snapshot(&self, session_id: &str) -> Result<SessionView, DispatchError> {
        let record = self.db.get_session(session_id)?;
        let live = self
            .runtimes
            .read()
            .await
            .get(session_id)
            .filter(|handle| handle.is_running())
            .map(|handle| handle.state_rx.borrow().clone());

        Ok(SessionView {
            id: record.id,
            username: record.username,
            state: live.unwrap_or(record.state),
        })
    }

    /// Clear the session, stop its runtime and mark it closed
    pub async fn logout(&self, session_id: &str) -> Result<(), DispatchError> {
        self.dispatch(session_id, Event::Clear).await?;
        self.evict(session_id).await;
        self.db.close_session(session_id)?;
        tracing::info!(session_id = %session_id, "Logged out");
        Ok(())
    }

    /// Stored query records of a user, oldest first
    pub fn history(&self, username: &str) -> Result<Vec<QueryRecord>, DispatchError> {
        Ok(self.db.list_queries(username)?)
    }

    /// Stop every running session
    pub async fn shutdown(&self) {
        for (_, handle) in self.runtimes.write().await.drain() {
            handle.shutdown.cancel();
        }
    }
}
