//! Display languages and the fixed strings shown in each of them

use crate::speech::TranscriptionError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A supported display language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    English,
    Tamil,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::English, Language::Tamil];

    /// ISO 639-1 code, as reported by language detection
    pub fn code(self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Tamil => "ta",
        }
    }

    /// BCP 47 tag handed to speech recognition
    pub fn speech_tag(self) -> &'static str {
        match self {
            Language::English => "en-US",
            Language::Tamil => "ta-IN",
        }
    }

    /// Name of the language written in that language (button label)
    pub fn native_name(self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Tamil => "தமிழ்",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "en" => Some(Language::English),
            "ta" => Some(Language::Tamil),
            _ => None,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::English => write!(f, "English"),
            Language::Tamil => write!(f, "Tamil"),
        }
    }
}

pub fn greeting(language: Language) -> &'static str {
    match language {
        Language::English => "Hello! How can I assist you?",
        Language::Tamil => "வணக்கம்! நான் எப்படி உதவலாம்?",
    }
}

pub fn follow_up(language: Language) -> &'static str {
    match language {
        Language::English => "Do you have any other questions?",
        Language::Tamil => "உங்களுக்குத் துணை செய்ய ஏதேனும் கூடுதல் கேள்விகள் உள்ளதா?",
    }
}

pub fn farewell(language: Language) -> &'static str {
    match language {
        Language::English => "Okay! Stay safe and take care! 😊",
        Language::Tamil => "சரி! பாதுகாப்பாக இருங்கள், நல்லபடியாக இருங்கள்! 😊",
    }
}

/// Returned when neither the model nor the knowledge base has an answer
pub fn apology(language: Language) -> &'static str {
    match language {
        Language::English => "Sorry! I don't have the answer, consult with a doctor pls.",
        Language::Tamil => {
            "மன்னிக்கவும்! எனக்கு இந்த தகவல் இல்லை, மருத்துவரை தொடர்பு கொள்ளவும்."
        }
    }
}

/// User-facing explanation of a failed voice capture
pub fn transcription_failure(language: Language, failure: &TranscriptionError) -> String {
    match (language, failure) {
        (Language::English, TranscriptionError::Timeout) => {
            "I didn't hear anything. Please try again.".to_string()
        }
        (Language::Tamil, TranscriptionError::Timeout) => {
            "எதுவும் கேட்கவில்லை, மீண்டும் முயற்சிக்கவும்.".to_string()
        }
        (Language::English, TranscriptionError::Unintelligible) => {
            "Sorry, I couldn't understand your voice.".to_string()
        }
        (Language::Tamil, TranscriptionError::Unintelligible) => {
            "மன்னிக்கவும், உங்கள் குரலை புரிந்துகொள்ள முடியவில்லை.".to_string()
        }
        (Language::English, TranscriptionError::ServiceUnavailable(_)) => {
            "Speech recognition service is unavailable.".to_string()
        }
        (Language::Tamil, TranscriptionError::ServiceUnavailable(_)) => {
            "மன்னிக்கவும், சேவை கிடைக்கவில்லை.".to_string()
        }
        (Language::English, TranscriptionError::Other(message)) => format!("Error: {message}"),
        (Language::Tamil, TranscriptionError::Other(message)) => format!("பிழை: {message}"),
    }
}

/// Labels for the input controls of a conversation
#[derive(Debug, Clone, Serialize)]
pub struct UiLabels {
    pub title: &'static str,
    pub input_placeholder: &'static str,
    pub speak: &'static str,
    pub listening: &'static str,
    pub yes: &'static str,
    pub no: &'static str,
}

impl UiLabels {
    pub fn for_language(language: Language) -> Self {
        match language {
            Language::English => Self {
                title: "Dr.Aidy - First Aid Chatbot",
                input_placeholder: "Type your message here...",
                speak: "🎙️ Speak",
                listening: "Listening... Speak now!",
                yes: "✅ Yes",
                no: "❌ No",
            },
            Language::Tamil => Self {
                title: "Dr.Aidy - முதலுதவி உதவியாளர்",
                input_placeholder: "உங்கள் கேள்வியை இங்கே உள்ளிடவும்...",
                speak: "🎙️ பேசவும்",
                listening: "கேட்கிறேன்... இப்போது பேசவும்!",
                yes: "✅ ஆம்",
                no: "❌ இல்லை",
            },
        }
    }
}

/// Prompt shown before a language has been chosen
pub const CHOOSE_LANGUAGE: &str = "Please choose your language:";
