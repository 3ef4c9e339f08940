//! Environment configuration, validated once at startup

use crate::answer::{AnswerConfig, DEFAULT_MIN_ANSWER_WORDS};
use crate::knowledge::{ResponseSelection, DEFAULT_MATCH_THRESHOLD};
use crate::llm::DEFAULT_MODEL;
use crate::runtime::DEFAULT_IDLE_TIMEOUT;
use crate::speech::DEFAULT_LISTEN_TIMEOUT;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_INTENTS_PATH: &str = "data/intents.json";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid {key}={value:?}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
    #[error("GEMINI_API_KEY is required while generative answering is enabled (set AIDY_GENERATIVE=off to run without it)")]
    MissingApiKey,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub db_path: PathBuf,
    pub intents_path: PathBuf,
    /// Set whenever generative answering is enabled
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub generative: bool,
    pub answer: AnswerConfig,
    /// Program and arguments of the speech capture command
    pub listen_command: Option<Vec<String>>,
    pub listen_timeout: Duration,
    /// Session runtimes with nothing in flight stop after this long
    pub session_idle_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match get("AIDY_PORT") {
            Some(v) => parse(&v, "AIDY_PORT", "expected a port number")?,
            None => DEFAULT_PORT,
        };

        let db_path = get("AIDY_DB_PATH").map_or_else(
            || {
                let home = get("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(home).join(".aidy").join("aidy.db")
            },
            PathBuf::from,
        );

        let intents_path = PathBuf::from(
            get("AIDY_INTENTS_PATH").unwrap_or_else(|| DEFAULT_INTENTS_PATH.to_string()),
        );

        let generative = match get("AIDY_GENERATIVE") {
            Some(v) => parse_switch(&v)?,
            None => true,
        };

        let gemini_api_key = get("GEMINI_API_KEY");
        if generative && gemini_api_key.is_none() {
            return Err(ConfigError::MissingApiKey);
        }

        let match_threshold = match get("AIDY_MATCH_THRESHOLD") {
            Some(v) => {
                let threshold: u8 = parse(&v, "AIDY_MATCH_THRESHOLD", "expected 0-100")?;
                if threshold > 100 {
                    return Err(ConfigError::InvalidValue {
                        key: "AIDY_MATCH_THRESHOLD",
                        value: v,
                        reason: "expected 0-100",
                    });
                }
                threshold
            }
            None => DEFAULT_MATCH_THRESHOLD,
        };

        let min_words = match get("AIDY_MIN_ANSWER_WORDS") {
            Some(v) => parse(&v, "AIDY_MIN_ANSWER_WORDS", "expected a word count")?,
            None => DEFAULT_MIN_ANSWER_WORDS,
        };

        let selection = match get("AIDY_RESPONSE_SELECTION") {
            Some(v) => ResponseSelection::parse(&v).ok_or(ConfigError::InvalidValue {
                key: "AIDY_RESPONSE_SELECTION",
                value: v,
                reason: "expected first or rotate",
            })?,
            None => ResponseSelection::First,
        };

        let listen_timeout = match get("AIDY_LISTEN_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(parse(
                &v,
                "AIDY_LISTEN_TIMEOUT_SECS",
                "expected whole seconds",
            )?),
            None => DEFAULT_LISTEN_TIMEOUT,
        };

        let session_idle_timeout = match get("AIDY_SESSION_IDLE_SECS") {
            Some(v) => {
                let secs: u64 = parse(&v, "AIDY_SESSION_IDLE_SECS", "expected whole seconds")?;
                if secs == 0 {
                    return Err(ConfigError::InvalidValue {
                        key: "AIDY_SESSION_IDLE_SECS",
                        value: v,
                        reason: "expected at least one second",
                    });
                }
                Duration::from_secs(secs)
            }
            None => DEFAULT_IDLE_TIMEOUT,
        };

        let listen_command = get("AIDY_LISTEN_COMMAND")
            .map(|v| v.split_whitespace().map(str::to_string).collect());

        Ok(Self {
            port,
            db_path,
            intents_path,
            gemini_api_key,
            gemini_model: get("AIDY_GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            generative,
            answer: AnswerConfig {
                match_threshold,
                min_words,
                selection,
                ..AnswerConfig::default()
            },
            listen_command,
            listen_timeout,
            session_idle_timeout,
        })
    }
}

fn parse<T: std::str::FromStr>(
    value: &str,
    key: &'static str,
    reason: &'static str,
) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
        reason,
    })
}

fn parse_switch(value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: "AIDY_GENERATIVE",
            value: value.to_string(),
            reason: "expected on or off",
        }),
    }
}
