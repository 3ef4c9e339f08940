//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use super::executor::SessionRuntime;
use super::traits::*;
use super::Dispatch;
use crate::answer::{Answer, AnswerSource};
use crate::db::{NewQueryRecord, QueryRecord};
use crate::locale::Language;
use crate::speech::TranscriptionError;
use crate::state_machine::{Event, Phase, Session, SessionContext, TransitionError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Mock Answerer
// ============================================================================

/// Answerer returning one fixed answer, optionally after a delay
pub struct MockAnswerer {
    answer: Answer,
    delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
}

impl MockAnswerer {
    pub fn fixed(text: impl Into<String>, source: AnswerSource) -> Self {
        Self {
            answer: Answer {
                text: text.into(),
                source,
            },
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queries answered so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for MockAnswerer {
    fn default() -> Self {
        Self::fixed(
            "Cool the burn under running water.",
            AnswerSource::KnowledgeBase,
        )
    }
}

#[async_trait]
impl Answerer for MockAnswerer {
    async fn answer(&self, query: &str, _language: Language) -> Answer {
        self.calls.lock().unwrap().push(query.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.answer.clone()
    }
}

// ============================================================================
// Mock Voice Capture
// ============================================================================

pub struct MockVoice {
    result: Result<String, TranscriptionError>,
    delay: Option<Duration>,
    captures: AtomicUsize,
    completed: AtomicUsize,
}

impl MockVoice {
    pub fn new(result: Result<String, TranscriptionError>) -> Self {
        Self {
            result,
            delay: None,
            captures: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn captures(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }

    /// Captures that ran to the end instead of being abandoned
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

impl Default for MockVoice {
    fn default() -> Self {
        Self::new(Err(TranscriptionError::ServiceUnavailable(
            "no microphone".to_string(),
        )))
    }
}

#[async_trait]
impl VoiceCapture for MockVoice {
    async fn capture(&self, _language: Language) -> Result<String, TranscriptionError> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.completed.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

// ============================================================================
// In-Memory Storage
// ============================================================================

#[derive(Default)]
struct StorageInner {
    sessions: Mutex<HashMap<String, Session>>,
    queries: Mutex<Vec<QueryRecord>>,
    fail_writes: AtomicBool,
}

/// In-memory storage for testing; clones share the same data
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    inner: Arc<StorageInner>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write fail until switched off again
    pub fn fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn session(&self, session_id: &str) -> Option<Session> {
        self.inner.sessions.lock().unwrap().get(session_id).cloned()
    }

    pub fn queries(&self) -> Vec<QueryRecord> {
        self.inner.queries.lock().unwrap().clone()
    }

    fn check_writable(&self) -> Result<(), String> {
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            Err("storage unavailable".to_string())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SessionStore for InMemoryStorage {
    async fn update_session(&self, session_id: &str, state: &Session) -> Result<(), String> {
        self.check_writable()?;
        self.inner
            .sessions
            .lock()
            .unwrap()
            .insert(session_id.to_string(), state.clone());
        Ok(())
    }

    async fn get_session(&self, session_id: &str) -> Result<Session, String> {
        self.session(session_id)
            .ok_or_else(|| format!("Session not found: {session_id}"))
    }
}

#[async_trait]
impl QueryStore for InMemoryStorage {
    async fn append_query(&self, record: &NewQueryRecord) -> Result<(), String> {
        self.check_writable()?;
        let mut queries = self.inner.queries.lock().unwrap();
        let id = i64::try_from(queries.len()).unwrap() + 1;
        queries.push(QueryRecord {
            id,
            username: record.username.clone(),
            session_id: record.session_id.clone(),
            query: record.query.clone(),
            response: record.response.clone(),
            source: record.source,
            language: record.language,
            created_at: record.created_at,
        });
        Ok(())
    }
}

// ============================================================================
// Test Runtime
// ============================================================================

/// A running session runtime wired to mocks
pub struct TestRuntime {
    pub storage: InMemoryStorage,
    pub answerer: Arc<MockAnswerer>,
    pub voice: Arc<MockVoice>,
    event_tx: mpsc::Sender<Dispatch>,
    state_rx: watch::Receiver<Session>,
    shutdown: CancellationToken,
}

impl TestRuntime {
    pub fn builder() -> TestRuntimeBuilder {
        TestRuntimeBuilder::default()
    }

    /// Send an event and wait for the runtime's verdict
    pub async fn send(&self, event: Event) -> Result<Session, TransitionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.event_tx
            .send(Dispatch {
                event,
                reply: Some(reply_tx),
            })
            .await
            .unwrap();
        reply_rx.await.unwrap()
    }

    pub fn current(&self) -> Session {
        self.state_rx.borrow().clone()
    }

    /// Wait (bounded) until the published state satisfies `pred`
    pub async fn wait_for(&self, pred: impl Fn(&Session) -> bool) -> Session {
        let mut rx = self.state_rx.clone();
        let state = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| pred(s)))
            .await
            .expect("timed out waiting for session state")
            .unwrap()
            .clone();
        state
    }

    pub async fn wait_for_phase(&self, pred: impl Fn(&Phase) -> bool) -> Session {
        self.wait_for(|s| pred(&s.phase)).await
    }

    /// Resolves once the runtime's event loop has exited
    pub async fn stopped(&self) {
        self.event_tx.closed().await;
    }
}

impl Drop for TestRuntime {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[derive(Default)]
pub struct TestRuntimeBuilder {
    initial_state: Option<Session>,
    answerer: Option<MockAnswerer>,
    voice: Option<MockVoice>,
    idle_timeout: Option<Duration>,
}

impl TestRuntimeBuilder {
    pub fn initial_state(mut self, state: Session) -> Self {
        self.initial_state = Some(state);
        self
    }

    pub fn answerer(mut self, answerer: MockAnswerer) -> Self {
        self.answerer = Some(answerer);
        self
    }

    pub fn voice(mut self, voice: MockVoice) -> Self {
        self.voice = Some(voice);
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Spawn the runtime on the current tokio runtime
    pub fn start(self) -> TestRuntime {
        let state = self.initial_state.unwrap_or_default();
        let storage = InMemoryStorage::new();
        let answerer = Arc::new(self.answerer.unwrap_or_default());
        let voice = Arc::new(self.voice.unwrap_or_default());

        let (event_tx, event_rx) = mpsc::channel(32);
        let (state_tx, state_rx) = watch::channel(state.clone());
        let shutdown = CancellationToken::new();

        let mut runtime = SessionRuntime::new(
            SessionContext::new("test-session", "test-user"),
            state,
            storage.clone(),
            answerer.clone(),
            voice.clone(),
            event_rx,
            event_tx.clone(),
            state_tx,
            shutdown.clone(),
        );
        if let Some(timeout) = self.idle_timeout {
            runtime = runtime.with_idle_timeout(timeout);
        }
        tokio::spawn(runtime.run());

        TestRuntime {
            storage,
            answerer,
            voice,
            event_tx,
            state_rx,
            shutdown,
        }
    }
}
