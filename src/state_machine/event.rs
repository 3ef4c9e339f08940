//! Events that can occur in a session

use crate::answer::Answer;
use crate::locale::Language;
use crate::speech::TranscriptionError;
use chrono::{DateTime, Utc};

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // User events
    ChooseLanguage {
        language: Language,
    },
    Submit {
        text: String,
        message_id: String,
    },
    StartListening,
    FollowUp {
        another: bool,
    },
    Clear,

    // Voice capture events
    VoiceCaptured {
        text: String,
        message_id: String,
    },
    VoiceFailed {
        failure: TranscriptionError,
    },
    SubmitPendingVoice {
        message_id: String,
    },

    // Answer pipeline events
    AnswerResolved {
        message_id: String,
        answer: Answer,
        resolved_at: DateTime<Utc>,
    },
}

impl Event {
    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Event::ChooseLanguage { .. } => "choose_language",
            Event::Submit { .. } => "submit",
            Event::StartListening => "start_listening",
            Event::FollowUp { .. } => "follow_up",
            Event::Clear => "clear",
            Event::VoiceCaptured { .. } => "voice_captured",
            Event::VoiceFailed { .. } => "voice_failed",
            Event::SubmitPendingVoice { .. } => "submit_pending_voice",
            Event::AnswerResolved { .. } => "answer_resolved",
        }
    }
}
