//! Intent dataset and the pattern -> answer index built from it

use super::KnowledgeError;
use rand::seq::SliceRandom;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// One first-aid topic: example phrasings and candidate answers
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IntentRecord {
    #[serde(default)]
    pub tag: Option<String>,
    pub patterns: Vec<String>,
    pub responses: Vec<String>,
}

/// On-disk layout: `{"intents": [...]}`
#[derive(Debug, Deserialize)]
struct IntentFile {
    intents: Vec<IntentRecord>,
}

/// How an answer is picked among an intent's responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseSelection {
    /// Always the first response of the intent
    #[default]
    First,
    /// A uniformly random response variant per lookup
    Rotate,
}

impl ResponseSelection {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "first" => Some(Self::First),
            "rotate" | "random" => Some(Self::Rotate),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct IndexEntry {
    pattern: String,
    responses: Arc<[String]>,
}

/// Read-only mapping from normalized pattern to the answers of its intent
#[derive(Debug, Clone, Default)]
pub struct KnowledgeIndex {
    entries: Vec<IndexEntry>,
}

impl KnowledgeIndex {
    /// Build the index from intents in dataset order.
    ///
    /// Patterns that collide after normalization keep their first position
    /// but take the answers of the later intent.
    pub fn build(intents: &[IntentRecord]) -> Result<Self, KnowledgeError> {
        let mut entries: Vec<IndexEntry> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for (index, intent) in intents.iter().enumerate() {
            validate_intent(index, intent)?;
            let responses: Arc<[String]> = intent.responses.iter().cloned().collect();

            for pattern in &intent.patterns {
                let key = normalize(pattern);
                if let Some(&position) = positions.get(&key) {
                    entries[position].responses = Arc::clone(&responses);
                } else {
                    positions.insert(key.clone(), entries.len());
                    entries.push(IndexEntry {
                        pattern: key,
                        responses: Arc::clone(&responses),
                    });
                }
            }
        }

        Ok(Self { entries })
    }

    /// Parse a JSON dataset (`{"intents": [...]}`) and build the index
    pub fn from_json(json: &str) -> Result<Self, KnowledgeError> {
        let file: IntentFile = serde_json::from_str(json)?;
        Self::build(&file.intents)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, KnowledgeError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| KnowledgeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Normalized patterns in index order
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.pattern.as_str())
    }

    /// Answer mapped to an already-normalized pattern
    pub fn answer_for(&self, pattern: &str, selection: ResponseSelection) -> Option<&str> {
        let entry = self.entries.iter().find(|e| e.pattern == pattern)?;
        let answer = match selection {
            ResponseSelection::First => entry.responses.first(),
            ResponseSelection::Rotate => entry.responses.choose(&mut rand::thread_rng()),
        };
        answer.map(String::as_str)
    }
}

/// Lowercase a pattern or query and collapse its whitespace
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn validate_intent(index: usize, intent: &IntentRecord) -> Result<(), KnowledgeError> {
    let malformed = |reason: &str| KnowledgeError::Malformed {
        index,
        reason: reason.to_string(),
    };

    if intent.patterns.is_empty() {
        return Err(malformed("no patterns"));
    }
    if intent.responses.is_empty() {
        return Err(malformed("no responses"));
    }
    if intent.patterns.iter().any(|p| p.trim().is_empty()) {
        return Err(malformed("blank pattern"));
    }
    if intent.responses.iter().any(|r| r.trim().is_empty()) {
        return Err(malformed("blank response"));
    }
    Ok(())
}
