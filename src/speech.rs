//! Spoken input
//!
//! Speech capture, language detection and translation collaborators, and
//! the pipeline that turns a capture request into query text in the
//! session's language.

mod detector;
mod transcriber;
mod translator;

pub use detector::{DetectError, LanguageDetector, ScriptDetector};
pub use transcriber::{CommandTranscriber, SpeechTranscriber, TranscriptionError};
pub use translator::{GoogleTranslator, TranslateError, Translator};

use crate::locale::Language;
use std::sync::Arc;
use std::time::Duration;

/// Reference time to wait for the user to start speaking
pub const DEFAULT_LISTEN_TIMEOUT: Duration = Duration::from_secs(5);

/// Capture -> detect -> translate-on-mismatch
pub struct VoicePipeline {
    transcriber: Arc<dyn SpeechTranscriber>,
    detector: Arc<dyn LanguageDetector>,
    translator: Arc<dyn Translator>,
    listen_timeout: Duration,
}

impl VoicePipeline {
    pub fn new(
        transcriber: Arc<dyn SpeechTranscriber>,
        detector: Arc<dyn LanguageDetector>,
        translator: Arc<dyn Translator>,
        listen_timeout: Duration,
    ) -> Self {
        Self {
            transcriber,
            detector,
            translator,
            listen_timeout,
        }
    }

    /// Listen once and return text in `language`.
    ///
    /// Only capture failures are surfaced; detection falls back to English
    /// and a failed translation keeps the transcribed text.
    pub async fn capture(&self, language: Language) -> Result<String, TranscriptionError> {
        let text = self.transcriber.listen(self.listen_timeout, language).await?;

        let detected = self.detector.detect(&text).unwrap_or_else(|e| {
            tracing::debug!(error = %e, "Language detection failed, assuming English");
            Language::English.code().to_string()
        });

        if detected == language.code() {
            return Ok(text);
        }

        tracing::info!(detected = %detected, target = %language, "Translating spoken input");
        match self.translator.translate(&text, language).await {
            Ok(translated) if !translated.trim().is_empty() => Ok(translated),
            Ok(_) => Ok(text),
            Err(e) => {
                tracing::warn!(error = %e, "Translation failed, keeping transcribed text");
                Ok(text)
            }
        }
    }
}
