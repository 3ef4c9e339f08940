//! HTTP request handlers

use super::types::{
    ChatRequest, CreateSessionRequest, CredentialsRequest, ErrorResponse, FollowUpRequest,
    HistoryResponse, LanguageRequest, LoginResponse, SessionResponse, SuccessResponse,
};
use super::AppState;
use crate::accounts::{self, AccountError};
use crate::runtime::DispatchError;
use crate::state_machine::Event;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Accounts
        .route("/api/accounts/register", post(register))
        .route("/api/accounts/login", post(login))
        // Session lifecycle
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_session))
        .route("/api/sessions/:id/logout", post(logout))
        .route("/api/sessions/:id/history", get(get_history))
        // Conversation events
        .route("/api/sessions/:id/language", post(choose_language))
        .route("/api/sessions/:id/chat", post(send_chat))
        .route("/api/sessions/:id/voice", post(start_listening))
        .route("/api/sessions/:id/follow-up", post(follow_up))
        .route("/api/sessions/:id/clear", post(clear_session))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Accounts
// ============================================================

async fn register(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> Result<(StatusCode, Json<LoginResponse>), AppError> {
    accounts::register(state.runtime.db(), &req.username, &req.password)?;
    Ok((
        StatusCode::CREATED,
        Json(LoginResponse {
            username: req.username.trim().to_string(),
        }),
    ))
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let username = accounts::login(state.runtime.db(), &req.username, &req.password)?;
    Ok(Json(LoginResponse { username }))
}

// ============================================================
// Session Lifecycle
// ============================================================

async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), AppError> {
    let username = req.username.trim();
    let known = state
        .runtime
        .db()
        .find_user(username)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    if known.is_none() {
        return Err(AppError::NotFound(format!("Unknown user: {username}")));
    }

    let record = state.runtime.create_session(username)?;
    Ok((
        StatusCode::CREATED,
        Json(SessionResponse::new(
            record.id,
            Some(record.username),
            record.state,
        )),
    ))
}

/// Snapshot only; never starts a runtime or changes state
async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let view = state.runtime.snapshot(&id).await?;
    Ok(Json(SessionResponse::new(
        view.id,
        Some(view.username),
        view.state,
    )))
}

async fn logout(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.runtime.logout(&id).await?;
    Ok(Json(SuccessResponse { success: true }))
}

async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<HistoryResponse>, AppError> {
    let view = state.runtime.snapshot(&id).await?;
    let queries = state.runtime.history(&view.username)?;
    Ok(Json(HistoryResponse { queries }))
}

// ============================================================
// Conversation Events
// ============================================================

async fn dispatch(
    state: &AppState,
    id: String,
    event: Event,
) -> Result<Json<SessionResponse>, AppError> {
    let session = state.runtime.dispatch(&id, event).await?;
    Ok(Json(SessionResponse::new(id, None, session)))
}

async fn choose_language(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<LanguageRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    dispatch(
        &state,
        id,
        Event::ChooseLanguage {
            language: req.language,
        },
    )
    .await
}

async fn send_chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let message_id = req
        .message_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    dispatch(
        &state,
        id,
        Event::Submit {
            text: req.text,
            message_id,
        },
    )
    .await
}

/// Starts a capture; the transcript is updated once it finishes
async fn start_listening(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    dispatch(&state, id, Event::StartListening).await
}

async fn follow_up(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<FollowUpRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    dispatch(
        &state,
        id,
        Event::FollowUp {
            another: req.another,
        },
    )
    .await
}

async fn clear_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    dispatch(&state, id, Event::Clear).await
}

// ============================================================
// Version
// ============================================================

async fn get_version() -> &'static str {
    concat!("aidy ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    Conflict {
        message: String,
        code: &'static str,
    },
    Gone(String),
    Internal(String),
}

impl From<DispatchError> for AppError {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::Rejected(rejection) => AppError::Conflict {
                message: rejection.to_string(),
                code: rejection.code(),
            },
            DispatchError::SessionNotFound(_) => AppError::NotFound(e.to_string()),
            DispatchError::SessionClosed(_) => AppError::Gone(e.to_string()),
            DispatchError::RuntimeStopped | DispatchError::Storage(_) => {
                tracing::error!(error = %e, "Dispatch failed");
                AppError::Internal(e.to_string())
            }
        }
    }
}

impl From<AccountError> for AppError {
    fn from(e: AccountError) -> Self {
        match e {
            AccountError::MissingCredentials => AppError::BadRequest(e.to_string()),
            AccountError::UsernameTaken => AppError::Conflict {
                message: e.to_string(),
                code: "username_taken",
            },
            AccountError::InvalidCredentials => AppError::Unauthorized(e.to_string()),
            AccountError::Db(_) => {
                tracing::error!(error = %e, "Account store failed");
                AppError::Internal(e.to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ErrorResponse::new(msg)),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, ErrorResponse::new(msg)),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorResponse::new(msg)),
            AppError::Conflict { message, code } => {
                (StatusCode::CONFLICT, ErrorResponse::new(message).with_code(code))
            }
            AppError::Gone(msg) => (StatusCode::GONE, ErrorResponse::new(msg)),
            AppError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorResponse::new(msg))
            }
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answer::{AnswerConfig, AnswerPipeline};
    use crate::db::Database;
    use crate::knowledge::KnowledgeIndex;
    use crate::locale::Language;
    use crate::runtime::RuntimeManager;
    use crate::speech::{
        CommandTranscriber, ScriptDetector, TranslateError, Translator, VoicePipeline,
        DEFAULT_LISTEN_TIMEOUT,
    };
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    struct NoTranslation;

    #[async_trait]
    impl Translator for NoTranslation {
        async fn translate(&self, _text: &str, _target: Language) -> Result<String, TranslateError> {
            Err(TranslateError::Status(503))
        }
    }

    fn app() -> Router {
        let index = KnowledgeIndex::from_json(
            r#"{"intents": [{"tag": "burns", "patterns": ["burn"], "responses": ["Cool the burn under running water."]}]}"#,
        )
        .unwrap();
        let answers = AnswerPipeline::new(None, Arc::new(index), AnswerConfig::default());
        let voice = VoicePipeline::new(
            Arc::new(CommandTranscriber::unconfigured()),
            Arc::new(ScriptDetector),
            Arc::new(NoTranslation),
            DEFAULT_LISTEN_TIMEOUT,
        );
        let runtime = RuntimeManager::new(
            Database::open_in_memory().unwrap(),
            Arc::new(answers),
            Arc::new(voice),
        );
        create_router(AppState::new(Arc::new(runtime)))
    }

    async fn call(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn signed_up_session(app: &Router) -> String {
        let (status, _) = call(
            app,
            "POST",
            "/api/accounts/register",
            Some(json!({"username": "alice", "password": "pw"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) =
            call(app, "POST", "/api/sessions", Some(json!({"username": "alice"}))).await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_accounts() {
        let app = app();
        signed_up_session(&app).await;

        let (status, body) = call(
            &app,
            "POST",
            "/api/accounts/register",
            Some(json!({"username": "alice", "password": "other"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "username_taken");

        let (status, body) = call(
            &app,
            "POST",
            "/api/accounts/login",
            Some(json!({"username": "alice", "password": "pw"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["username"], "alice");

        let (status, _) = call(
            &app,
            "POST",
            "/api/accounts/login",
            Some(json!({"username": "alice", "password": "wrong"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_session_requires_known_user() {
        let app = app();
        let (status, _) =
            call(&app, "POST", "/api/sessions", Some(json!({"username": "nobody"}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_new_session_offers_language_choice() {
        let app = app();
        let id = signed_up_session(&app).await;

        let (status, body) = call(&app, "GET", &format!("/api/sessions/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"]["phase"]["type"], "language_unset");
        assert_eq!(body["choose_language"]["prompt"], "Please choose your language:");
        assert_eq!(body["choose_language"]["options"][1]["label"], "தமிழ்");
        assert_eq!(body["labels"]["speak"], "🎙️ Speak");
    }

    #[tokio::test]
    async fn test_conversation_over_http() {
        let app = app();
        let id = signed_up_session(&app).await;

        let (status, body) = call(
            &app,
            "POST",
            &format!("/api/sessions/{id}/language"),
            Some(json!({"language": "tamil"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["labels"]["yes"], "✅ ஆம்");
        assert!(body.get("choose_language").is_none());

        let (status, body) = call(
            &app,
            "POST",
            &format!("/api/sessions/{id}/chat"),
            Some(json!({"text": "burn"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"]["phase"]["type"], "awaiting_answer");

        let mut answered = Value::Null;
        for _ in 0..100 {
            let (_, body) = call(&app, "GET", &format!("/api/sessions/{id}"), None).await;
            if body["state"]["phase"]["type"] == "awaiting_follow_up" {
                answered = body;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(
            answered["state"]["transcript"][2]["content"],
            "Cool the burn under running water."
        );

        let (status, body) = call(
            &app,
            "POST",
            &format!("/api/sessions/{id}/follow-up"),
            Some(json!({"another": false})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"]["phase"]["type"], "ended");

        let (status, body) = call(&app, "GET", &format!("/api/sessions/{id}/history"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["queries"][0]["query"], "burn");
        assert_eq!(body["queries"][0]["source"], "knowledge_base");
        assert_eq!(body["queries"][0]["language"], "tamil");
    }

    #[tokio::test]
    async fn test_rejected_event_is_conflict() {
        let app = app();
        let id = signed_up_session(&app).await;

        let (status, body) = call(
            &app,
            "POST",
            &format!("/api/sessions/{id}/chat"),
            Some(json!({"text": "burn"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "language_not_chosen");
    }

    #[tokio::test]
    async fn test_logout_then_gone() {
        let app = app();
        let id = signed_up_session(&app).await;

        let (status, body) = call(&app, "POST", &format!("/api/sessions/{id}/logout"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let (status, _) = call(&app, "POST", &format!("/api/sessions/{id}/clear"), None).await;
        assert_eq!(status, StatusCode::GONE);
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let app = app();
        let (status, _) = call(&app, "GET", "/api/sessions/missing", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
