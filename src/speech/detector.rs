//! Best-effort detection of the language of transcribed text

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DetectError {
    #[error("No letters to detect a language from")]
    NoFeatures,
}

pub trait LanguageDetector: Send + Sync {
    /// ISO 639-1 code of the dominant language of `text`
    fn detect(&self, text: &str) -> Result<String, DetectError>;
}

/// Detects Tamil vs. Latin-script text by counting letters per script
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptDetector;

impl LanguageDetector for ScriptDetector {
    fn detect(&self, text: &str) -> Result<String, DetectError> {
        let mut tamil = 0usize;
        let mut latin = 0usize;
        for c in text.chars() {
            if ('\u{0B80}'..='\u{0BFF}').contains(&c) {
                tamil += 1;
            } else if c.is_ascii_alphabetic() {
                latin += 1;
            }
        }

        match (tamil, latin) {
            (0, 0) => Err(DetectError::NoFeatures),
            (t, l) if t >= l => Ok("ta".to_string()),
            _ => Ok("en".to_string()),
        }
    }
}
