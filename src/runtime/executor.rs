//! Session runtime executor

use super::traits::{Answerer, Storage, VoiceCapture};
use super::Dispatch;
use crate::state_machine::{
    transition, Effect, Event, Phase, Session, SessionContext, TransitionError,
};
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Runs one session: applies events in arrival order and executes the
/// resulting effects. Generic over storage, answering and voice capture.
pub struct SessionRuntime<S, A, V>
where
    S: Storage + Clone + 'static,
    A: Answerer + 'static,
    V: VoiceCapture + 'static,
{
    context: SessionContext,
    state: Session,
    storage: S,
    answerer: Arc<A>,
    voice: Arc<V>,
    event_rx: mpsc::Receiver<Dispatch>,
    event_tx: mpsc::Sender<Dispatch>,
    state_tx: watch::Sender<Session>,
    shutdown: CancellationToken,
    /// Token to abandon the in-flight answer
    answer_cancel_token: Option<CancellationToken>,
    /// Token to abandon the in-flight capture; cancelled once the capture ends
    capture_cancel_token: Option<CancellationToken>,
    /// Stop after this long without events while nothing is in flight
    idle_timeout: Option<Duration>,
}

impl<S, A, V> SessionRuntime<S, A, V>
where
    S: Storage + Clone + 'static,
    A: Answerer + 'static,
    V: VoiceCapture + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        context: SessionContext,
        state: Session,
        storage: S,
        answerer: Arc<A>,
        voice: Arc<V>,
        event_rx: mpsc::Receiver<Dispatch>,
        event_tx: mpsc::Sender<Dispatch>,
        state_tx: watch::Sender<Session>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            context,
            state,
            storage,
            answerer,
            voice,
            event_rx,
            event_tx,
            state_tx,
            shutdown,
            answer_cancel_token: None,
            capture_cancel_token: None,
            idle_timeout: None,
        }
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// No answer or capture is running, so stopping loses nothing
    fn is_idle(&self) -> bool {
        !self.state.phase.is_busy()
            && self
                .capture_cancel_token
                .as_ref()
                .map_or(true, CancellationToken::is_cancelled)
    }

    pub async fn run(mut self) {
        tracing::info!(session_id = %self.context.session_id, "Starting session runtime");

        // A session persisted mid-answer would otherwise never leave AwaitingAnswer
        if let Phase::AwaitingAnswer { query, message_id } = &self.state.phase {
            tracing::info!(session_id = %self.context.session_id, "Resuming interrupted answer");
            let effect = Effect::resolve_answer(message_id, query, self.state.display_language());
            self.execute_effect(effect).await;
        }

        // Process events in a loop - no recursion
        loop {
            let may_idle = self.idle_timeout.is_some() && self.is_idle();
            let idle_timeout = self.idle_timeout.unwrap_or_default();

            tokio::select! {
                biased;

                () = self.shutdown.cancelled() => break,

                Some(dispatch) = self.event_rx.recv() => {
                    let Dispatch { event, reply } = dispatch;
                    let result = self.process_event(event).await;
                    if let Err(e) = &result {
                        tracing::debug!(session_id = %self.context.session_id, error = %e, "Event rejected");
                    }
                    if let Some(reply) = reply {
                        let _ = reply.send(result);
                    }
                }

                () = tokio::time::sleep(idle_timeout), if may_idle => {
                    tracing::info!(session_id = %self.context.session_id, "Session runtime idle");
                    break;
                }

                else => break,
            }
        }

        self.abort_pending();
        tracing::info!(session_id = %self.context.session_id, "Session runtime stopped");
    }

    /// Apply an event and any events chained by its effects. The result of
    /// the first transition decides the reply; chained rejections are logged.
    async fn process_event(&mut self, event: Event) -> Result<Session, TransitionError> {
        let mut events_to_process = VecDeque::from([event]);
        let mut first = true;

        while let Some(current_event) = events_to_process.pop_front() {
            let name = current_event.name();

            // Pure state transition
            let result = match transition(&self.state, &self.context, current_event) {
                Ok(r) => r,
                Err(e) if first => return Err(e),
                Err(e) => {
                    tracing::warn!(event = name, error = %e, "Chained event rejected");
                    continue;
                }
            };
            first = false;

            tracing::debug!(
                session_id = %self.context.session_id,
                event = name,
                phase = self.state.phase.name(),
                next_phase = result.new_state.phase.name(),
                "Transition"
            );
            self.state = result.new_state;

            // Execute effects and collect generated events
            for effect in result.effects {
                if let Some(generated_event) = self.execute_effect(effect).await {
                    events_to_process.push_back(generated_event);
                }
            }

            // Observers see a state only once it has been persisted
            self.state_tx.send_replace(self.state.clone());
        }

        Ok(self.state.clone())
    }

    /// Execute an effect and optionally return a chained event.
    ///
    /// Persistence failures are logged and never block the conversation.
    async fn execute_effect(&mut self, effect: Effect) -> Option<Event> {
        match effect {
            Effect::PersistSession => {
                if let Err(e) = self
                    .storage
                    .update_session(&self.context.session_id, &self.state)
                    .await
                {
                    tracing::error!(session_id = %self.context.session_id, error = %e, "Failed to persist session");
                }
                None
            }

            Effect::PersistQuery { record } => {
                if let Err(e) = self.storage.append_query(&record).await {
                    tracing::error!(session_id = %self.context.session_id, error = %e, "Failed to store query record");
                } else {
                    tracing::info!(
                        session_id = %self.context.session_id,
                        username = %record.username,
                        source = %record.source,
                        language = %record.language,
                        "Stored query record"
                    );
                }
                None
            }

            Effect::ResolveAnswer {
                message_id,
                query,
                language,
            } => {
                // A typed query overtakes a capture still in flight
                if let Some(token) = self.capture_cancel_token.take() {
                    if !token.is_cancelled() {
                        tracing::info!(session_id = %self.context.session_id, "Abandoning voice capture for submitted query");
                        token.cancel();
                    }
                }

                let cancel_token = CancellationToken::new();
                self.answer_cancel_token = Some(cancel_token.clone());

                // Spawn answer pipeline as background task
                let answerer = self.answerer.clone();
                let event_tx = self.event_tx.clone();
                tokio::spawn(async move {
                    tokio::select! {
                        biased;

                        () = cancel_token.cancelled() => {
                            tracing::info!(message_id = %message_id, "Answer abandoned");
                        }

                        answer = answerer.answer(&query, language) => {
                            let event = Event::AnswerResolved {
                                message_id,
                                answer,
                                resolved_at: Utc::now(),
                            };
                            let _ = event_tx.send(Dispatch::background(event)).await;
                        }
                    }
                });
                None
            }

            Effect::CaptureVoice { language } => {
                if self
                    .capture_cancel_token
                    .as_ref()
                    .is_some_and(|token| !token.is_cancelled())
                {
                    tracing::debug!(session_id = %self.context.session_id, "Already listening");
                    return None;
                }

                let cancel_token = CancellationToken::new();
                self.capture_cancel_token = Some(cancel_token.clone());

                // Spawn capture as background task
                let voice = self.voice.clone();
                let event_tx = self.event_tx.clone();
                tokio::spawn(async move {
                    let _done = cancel_token.clone().drop_guard();
                    tokio::select! {
                        biased;

                        () = cancel_token.cancelled() => {
                            tracing::info!("Voice capture abandoned");
                        }

                        result = voice.capture(language) => {
                            let event = match result {
                                Ok(text) => Event::VoiceCaptured {
                                    text,
                                    message_id: uuid::Uuid::new_v4().to_string(),
                                },
                                Err(failure) => {
                                    tracing::info!(error = %failure, "Voice capture failed");
                                    Event::VoiceFailed { failure }
                                }
                            };
                            let _ = event_tx.send(Dispatch::background(event)).await;
                        }
                    }
                });
                None
            }

            Effect::SubmitPendingVoice { message_id } => {
                Some(Event::SubmitPendingVoice { message_id })
            }

            Effect::AbortPending => {
                self.abort_pending();
                None
            }
        }
    }

    fn abort_pending(&mut self) {
        if let Some(token) = self.answer_cancel_token.take() {
            token.cancel();
        }
        if let Some(token) = self.capture_cancel_token.take() {
            token.cancel();
        }
    }
}
