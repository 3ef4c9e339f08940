//! Speech capture

use crate::locale::Language;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Why a capture produced no text
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranscriptionError {
    #[error("No speech before the listen timeout")]
    Timeout,
    #[error("Speech could not be understood")]
    Unintelligible,
    #[error("Speech recognition unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("{0}")]
    Other(String),
}

#[async_trait]
pub trait SpeechTranscriber: Send + Sync {
    /// Capture one utterance, waiting at most `timeout` for speech to start
    async fn listen(&self, timeout: Duration, language: Language)
        -> Result<String, TranscriptionError>;
}

/// Runs an external capture/recognition program and reads the transcript
/// from its stdout.
///
/// The program receives `AIDY_SPEECH_LANGUAGE` (`en-US` / `ta-IN`) and
/// `AIDY_LISTEN_TIMEOUT_SECS`. It is killed once the listen timeout plus
/// the recognition grace period has elapsed.
#[derive(Debug, Clone, Default)]
pub struct CommandTranscriber {
    program: Option<String>,
    args: Vec<String>,
    recognition_grace: Duration,
}

impl CommandTranscriber {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: Some(program.into()),
            args,
            recognition_grace: Duration::from_secs(10),
        }
    }

    /// A transcriber with nothing to run; every capture reports the service as unavailable
    pub fn unconfigured() -> Self {
        Self::default()
    }

    pub fn with_recognition_grace(mut self, grace: Duration) -> Self {
        self.recognition_grace = grace;
        self
    }
}

#[async_trait]
impl SpeechTranscriber for CommandTranscriber {
    async fn listen(
        &self,
        timeout: Duration,
        language: Language,
    ) -> Result<String, TranscriptionError> {
        let Some(program) = &self.program else {
            return Err(TranscriptionError::ServiceUnavailable(
                "no speech capture command configured".to_string(),
            ));
        };

        let child = Command::new(program)
            .args(&self.args)
            .env("AIDY_SPEECH_LANGUAGE", language.speech_tag())
            .env("AIDY_LISTEN_TIMEOUT_SECS", timeout.as_secs().to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TranscriptionError::ServiceUnavailable(format!("{program}: {e}")))?;

        let output = tokio::time::timeout(timeout + self.recognition_grace, child.wait_with_output())
            .await
            .map_err(|_| TranscriptionError::Timeout)?
            .map_err(|e| TranscriptionError::Other(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::warn!(status = %output.status, stderr = %stderr, "Speech capture command failed");
            return Err(TranscriptionError::ServiceUnavailable(if stderr.is_empty() {
                output.status.to_string()
            } else {
                stderr
            }));
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if text.is_empty() {
            return Err(TranscriptionError::Unintelligible);
        }
        Ok(text)
    }
}
