//! API request and response types

use crate::db::QueryRecord;
use crate::locale::{Language, UiLabels, CHOOSE_LANGUAGE};
use crate::state_machine::Session;
use serde::{Deserialize, Serialize};

/// Username and password, for both registration and login
#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub username: String,
}

/// Request to start a session for a registered user
#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct LanguageRequest {
    pub language: Language,
}

/// Request to submit a typed query
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub text: String,
    /// Client-chosen id; generated when absent
    pub message_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FollowUpRequest {
    pub another: bool,
}

/// One button of the language chooser
#[derive(Debug, Serialize)]
pub struct LanguageOption {
    pub language: Language,
    pub label: &'static str,
}

/// Shown until a language has been chosen
#[derive(Debug, Serialize)]
pub struct LanguagePrompt {
    pub prompt: &'static str,
    pub options: Vec<LanguageOption>,
}

impl LanguagePrompt {
    fn new() -> Self {
        Self {
            prompt: CHOOSE_LANGUAGE,
            options: Language::ALL
                .into_iter()
                .map(|language| LanguageOption {
                    language,
                    label: language.native_name(),
                })
                .collect(),
        }
    }
}

/// Session snapshot with the labels to render it
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub state: Session,
    pub labels: UiLabels,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub choose_language: Option<LanguagePrompt>,
}

impl SessionResponse {
    pub fn new(id: impl Into<String>, username: Option<String>, state: Session) -> Self {
        let choose_language = state.language.is_none().then(LanguagePrompt::new);
        Self {
            id: id.into(),
            username,
            labels: UiLabels::for_language(state.display_language()),
            state,
            choose_language,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub queries: Vec<QueryRecord>,
}

/// Response for lifecycle actions
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Machine-readable reason for rejected events
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: &'static str) -> Self {
        self.code = Some(code);
        self
    }
}
