//! Effects produced by state transitions

use crate::db::NewQueryRecord;
use crate::locale::Language;

/// Effects to be executed after a state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Persist the new session snapshot
    PersistSession,

    /// Append a stored query record (write-once)
    PersistQuery { record: NewQueryRecord },

    /// Run the answer pipeline (spawns as background task)
    ResolveAnswer {
        message_id: String,
        query: String,
        language: Language,
    },

    /// Listen for speech (spawns as background task)
    CaptureVoice { language: Language },

    /// Feed the pending voice text back in as a submission
    SubmitPendingVoice { message_id: String },

    /// Abandon any in-flight answer or capture
    AbortPending,
}

impl Effect {
    pub fn resolve_answer(message_id: &str, query: &str, language: Language) -> Self {
        Effect::ResolveAnswer {
            message_id: message_id.to_string(),
            query: query.to_string(),
            language,
        }
    }
}
