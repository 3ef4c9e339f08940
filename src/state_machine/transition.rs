//! Pure state transition function

use super::{Effect, Event, Phase, Session, SessionContext, Turn};
use crate::answer::Answer;
use crate::db::NewQueryRecord;
use crate::locale::{self, Language};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: Session,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: Session) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Why an event was rejected. The session is left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Language has already been chosen for this session")]
    LanguageAlreadyChosen,
    #[error("Choose a language first")]
    LanguageNotChosen,
    #[error("Still answering the previous question")]
    Busy,
    #[error("Session has ended, clear it to start again")]
    SessionEnded,
    #[error("Message is empty")]
    EmptyInput,
    #[error("No captured speech to submit")]
    NoPendingVoice,
    #[error("Answer does not belong to the pending question")]
    StaleAnswer,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

impl TransitionError {
    /// Stable machine-readable name
    pub fn code(&self) -> &'static str {
        match self {
            TransitionError::LanguageAlreadyChosen => "language_already_chosen",
            TransitionError::LanguageNotChosen => "language_not_chosen",
            TransitionError::Busy => "busy",
            TransitionError::SessionEnded => "session_ended",
            TransitionError::EmptyInput => "empty_input",
            TransitionError::NoPendingVoice => "no_pending_voice",
            TransitionError::StaleAnswer => "stale_answer",
            TransitionError::InvalidTransition(_) => "invalid_transition",
        }
    }
}

/// Pure transition function: no I/O, the same inputs always give the same
/// outputs. Side effects are described by the returned `Effect`s.
pub fn transition(
    state: &Session,
    context: &SessionContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    let language = state.display_language();

    match (&state.phase, event) {
        // Clear resets from anywhere
        (_, Event::Clear) => Ok(TransitionResult::new(Session::default())
            .with_effect(Effect::AbortPending)
            .with_effect(Effect::PersistSession)),

        // ============================================================
        // Language choice
        // ============================================================
        (Phase::LanguageUnset, Event::ChooseLanguage { language }) => {
            let mut next = state.clone();
            next.language = Some(language);
            next.transcript.push(Turn::assistant(locale::greeting(language)));
            next.phase = Phase::AwaitingInput;
            Ok(TransitionResult::new(next).with_effect(Effect::PersistSession))
        }

        (_, Event::ChooseLanguage { .. }) => Err(TransitionError::LanguageAlreadyChosen),

        (Phase::Ended, _) => Err(TransitionError::SessionEnded),

        (Phase::LanguageUnset, _) => Err(TransitionError::LanguageNotChosen),

        // ============================================================
        // Input
        // ============================================================
        (Phase::AwaitingInput, Event::Submit { text, message_id }) => {
            submit(state.clone(), &text, &message_id, language)
        }

        (Phase::AwaitingInput, Event::StartListening) => {
            Ok(TransitionResult::new(state.clone())
                .with_effect(Effect::CaptureVoice { language }))
        }

        (Phase::AwaitingInput, Event::VoiceCaptured { text, message_id }) => {
            if text.trim().is_empty() {
                return Err(TransitionError::EmptyInput);
            }
            let mut next = state.clone();
            next.pending_voice_text = Some(text);
            Ok(TransitionResult::new(next)
                .with_effect(Effect::PersistSession)
                .with_effect(Effect::SubmitPendingVoice { message_id }))
        }

        (Phase::AwaitingInput, Event::VoiceFailed { failure }) => {
            let mut next = state.clone();
            next.transcript.push(Turn::assistant(locale::transcription_failure(
                language, &failure,
            )));
            Ok(TransitionResult::new(next).with_effect(Effect::PersistSession))
        }

        (Phase::AwaitingInput, Event::SubmitPendingVoice { message_id }) => {
            let mut next = state.clone();
            let text = next
                .pending_voice_text
                .take()
                .ok_or(TransitionError::NoPendingVoice)?;
            submit(next, &text, &message_id, language)
        }

        // ============================================================
        // Answer
        // ============================================================
        (
            Phase::AwaitingAnswer {
                query,
                message_id: expected,
            },
            Event::AnswerResolved {
                message_id,
                answer,
                resolved_at,
            },
        ) if *expected == message_id => {
            let record = query_record(context, query, &answer, language, resolved_at);

            let mut next = state.clone();
            next.transcript.push(Turn::assistant(answer.text));
            next.transcript.push(Turn::assistant(locale::follow_up(language)));
            next.phase = Phase::AwaitingFollowUp;

            Ok(TransitionResult::new(next)
                .with_effect(Effect::PersistQuery { record })
                .with_effect(Effect::PersistSession))
        }

        (_, Event::AnswerResolved { .. }) => Err(TransitionError::StaleAnswer),

        (Phase::AwaitingAnswer { .. }, _) => Err(TransitionError::Busy),

        // ============================================================
        // Follow-up
        // ============================================================
        (Phase::AwaitingFollowUp, Event::FollowUp { another: true }) => {
            let mut next = state.clone();
            next.phase = Phase::AwaitingInput;
            Ok(TransitionResult::new(next).with_effect(Effect::PersistSession))
        }

        (Phase::AwaitingFollowUp, Event::FollowUp { another: false }) => {
            let mut next = state.clone();
            next.transcript.push(Turn::assistant(locale::farewell(language)));
            next.phase = Phase::Ended;
            Ok(TransitionResult::new(next).with_effect(Effect::PersistSession))
        }

        // ============================================================
        // Invalid Transitions
        // ============================================================
        (phase, event) => Err(TransitionError::InvalidTransition(format!(
            "No transition from {} with event {}",
            phase.name(),
            event.name()
        ))),
    }
}

fn submit(
    mut next: Session,
    text: &str,
    message_id: &str,
    language: Language,
) -> Result<TransitionResult, TransitionError> {
    let query = text.trim();
    if query.is_empty() {
        return Err(TransitionError::EmptyInput);
    }

    next.transcript.push(Turn::user(query));
    next.pending_voice_text = None;
    next.phase = Phase::AwaitingAnswer {
        query: query.to_string(),
        message_id: message_id.to_string(),
    };

    Ok(TransitionResult::new(next)
        .with_effect(Effect::PersistSession)
        .with_effect(Effect::resolve_answer(message_id, query, language)))
}

fn query_record(
    context: &SessionContext,
    query: &str,
    answer: &Answer,
    language: Language,
    resolved_at: DateTime<Utc>,
) -> NewQueryRecord {
    NewQueryRecord {
        username: context.username.clone(),
        session_id: context.session_id.clone(),
        query: query.to_string(),
        response: answer.text.clone(),
        source: answer.source,
        language,
        created_at: resolved_at,
    }
}
