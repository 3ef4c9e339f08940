//! Dr. Aidy - bilingual first-aid conversational assistant
//!
//! An HTTP backend driving a per-session conversation state machine that
//! answers first-aid questions from a generative model, falling back to a
//! curated intent knowledge base.

mod accounts;
mod answer;
mod api;
mod config;
mod db;
mod knowledge;
mod llm;
mod locale;
mod runtime;
mod speech;
mod state_machine;

use answer::AnswerPipeline;
use api::{create_router, AppState};
use config::AppConfig;
use db::Database;
use knowledge::KnowledgeIndex;
use llm::{GeminiConfig, GeminiService, LlmService, LoggingService};
use runtime::RuntimeManager;
use speech::{CommandTranscriber, GoogleTranslator, ScriptDetector, VoicePipeline};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const TRANSLATE_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aidy=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = AppConfig::from_env()?;

    // Ensure database directory exists
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::info!(path = %config.db_path.display(), "Opening database");
    let db = Database::open(&config.db_path)?;

    tracing::info!(path = %config.intents_path.display(), "Loading knowledge base");
    let index = Arc::new(KnowledgeIndex::load(&config.intents_path)?);

    let responder: Option<Arc<dyn LlmService>> = match &config.gemini_api_key {
        Some(api_key) if config.generative => {
            let mut gemini = GeminiConfig::new(api_key.clone());
            gemini.model.clone_from(&config.gemini_model);
            let service: Arc<dyn LlmService> = Arc::new(GeminiService::new(&gemini)?);
            tracing::info!(model = %config.gemini_model, "Generative answering enabled");
            Some(Arc::new(LoggingService::new(service)))
        }
        _ => {
            tracing::warn!("Generative answering disabled, using the knowledge base only");
            None
        }
    };
    let answers = AnswerPipeline::new(responder, index, config.answer);

    let transcriber = match config.listen_command.as_deref() {
        Some([program, args @ ..]) => CommandTranscriber::new(program.clone(), args.to_vec()),
        _ => {
            tracing::warn!("AIDY_LISTEN_COMMAND not set, voice input is unavailable");
            CommandTranscriber::unconfigured()
        }
    };
    let voice = VoicePipeline::new(
        Arc::new(transcriber),
        Arc::new(ScriptDetector),
        Arc::new(GoogleTranslator::new(TRANSLATE_TIMEOUT)?),
        config.listen_timeout,
    );

    let runtime = Arc::new(
        RuntimeManager::new(db, Arc::new(answers), Arc::new(voice))
            .with_idle_timeout(config.session_idle_timeout),
    );
    let state = AppState::new(runtime.clone());

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(state)
        .layer(cors)
        .layer(compression)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Dr. Aidy server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;

    runtime.shutdown().await;
    Ok(())
}
