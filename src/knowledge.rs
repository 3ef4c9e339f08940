//! First-aid knowledge base
//!
//! An intent dataset is indexed once at startup and then queried with
//! approximate matching when the generative model has nothing useful.

mod index;
mod matching;
mod resolver;

#[cfg(test)]
mod proptests;

pub use index::{IntentRecord, KnowledgeIndex, ResponseSelection};
pub use resolver::{resolve, Resolution, DEFAULT_MATCH_THRESHOLD};

use std::path::PathBuf;
use thiserror::Error;

/// Failures while loading the intent dataset. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("Failed to read intent dataset {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Intent dataset is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Malformed intent #{index}: {reason}")]
    Malformed { index: usize, reason: String },
}
