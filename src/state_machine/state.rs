//! Session state types

use crate::locale::Language;
use serde::{Deserialize, Serialize};

/// Who said a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// One message of the transcript. Turns are append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Where the conversation is in its flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Phase {
    /// Fresh session, waiting for a language choice
    #[default]
    LanguageUnset,

    /// Ready for a typed or spoken query
    AwaitingInput,

    /// A query is being answered
    AwaitingAnswer { query: String, message_id: String },

    /// Answer shown, waiting for "anything else?" yes/no
    AwaitingFollowUp,

    /// User said no; only `Clear` is accepted
    Ended,
}

impl Phase {
    /// Short name used in logs and API responses
    pub fn name(&self) -> &'static str {
        match self {
            Phase::LanguageUnset => "language_unset",
            Phase::AwaitingInput => "awaiting_input",
            Phase::AwaitingAnswer { .. } => "awaiting_answer",
            Phase::AwaitingFollowUp => "awaiting_follow_up",
            Phase::Ended => "ended",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Ended)
    }

    /// An answer is in flight
    pub fn is_busy(&self) -> bool {
        matches!(self, Phase::AwaitingAnswer { .. })
    }
}

/// Full state of one conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Session {
    /// `None` until the user picks a language
    pub language: Option<Language>,
    pub transcript: Vec<Turn>,
    pub phase: Phase,
    /// Transcribed speech waiting to be submitted; only set in `AwaitingInput`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_voice_text: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// The session's language, English before one has been chosen
    pub fn display_language(&self) -> Language {
        self.language.unwrap_or(Language::English)
    }
}

/// Identity of the session a transition runs for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub session_id: String,
    pub username: String,
}

impl SessionContext {
    pub fn new(session_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            username: username.into(),
        }
    }
}
