//! Answer pipeline
//!
//! Resolves a query to a non-empty answer: the generative responder is
//! asked first, short drafts are discarded, then the knowledge base is
//! consulted, and finally a localized apology is returned.

use crate::knowledge::{
    resolve, KnowledgeIndex, Resolution, ResponseSelection, DEFAULT_MATCH_THRESHOLD,
};
use crate::llm::{LlmRequest, LlmService, Sampling};
use crate::locale::{self, Language};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Generated drafts with fewer words than this are discarded
pub const DEFAULT_MIN_ANSWER_WORDS: usize = 5;

const MAX_OUTPUT_TOKENS: u32 = 1000;

/// Sampling used for first-aid drafts
const GENERATION_SAMPLING: Sampling = Sampling {
    temperature: Some(1.0),
    top_p: Some(0.95),
    top_k: Some(40),
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerConfig {
    pub match_threshold: u8,
    pub min_words: usize,
    pub selection: ResponseSelection,
    pub max_output_tokens: u32,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            min_words: DEFAULT_MIN_ANSWER_WORDS,
            selection: ResponseSelection::First,
            max_output_tokens: MAX_OUTPUT_TOKENS,
        }
    }
}

/// Which stage of the pipeline produced an answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerSource {
    Generative,
    KnowledgeBase,
    Fallback,
}

impl AnswerSource {
    pub fn as_str(self) -> &'static str {
        match self {
            AnswerSource::Generative => "generative",
            AnswerSource::KnowledgeBase => "knowledge_base",
            AnswerSource::Fallback => "fallback",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "generative" => Some(AnswerSource::Generative),
            "knowledge_base" => Some(AnswerSource::KnowledgeBase),
            "fallback" => Some(AnswerSource::Fallback),
            _ => None,
        }
    }
}

impl fmt::Display for AnswerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub source: AnswerSource,
}

/// Instruction sent to the generative responder
pub fn render_prompt(query: &str, language: Language) -> String {
    match language {
        Language::English => format!("Provide a **2-3 line** first-aid measure for: {query}."),
        Language::Tamil => {
            format!("குறைந்தது 2-3 வரிகளில் {query} க்கு முதல் உதவி அறிவுரை வழங்கவும்.")
        }
    }
}

pub struct AnswerPipeline {
    /// `None` when generative answering is disabled
    responder: Option<Arc<dyn LlmService>>,
    index: Arc<KnowledgeIndex>,
    config: AnswerConfig,
}

impl AnswerPipeline {
    pub fn new(
        responder: Option<Arc<dyn LlmService>>,
        index: Arc<KnowledgeIndex>,
        config: AnswerConfig,
    ) -> Self {
        Self {
            responder,
            index,
            config,
        }
    }

    pub fn config(&self) -> &AnswerConfig {
        &self.config
    }

    /// Always returns a non-empty answer. Responder failures are logged and
    /// treated as an empty draft.
    pub async fn answer(&self, query: &str, language: Language) -> Answer {
        let draft = self.generate(query, language).await;
        let words = draft.split_whitespace().count();

        if words > 0 && words >= self.config.min_words {
            tracing::info!(words, "Using generated answer");
            return Answer {
                text: draft.trim().to_string(),
                source: AnswerSource::Generative,
            };
        }
        if words > 0 {
            tracing::info!(
                words,
                min_words = self.config.min_words,
                "Generated answer too short, discarding"
            );
        }

        match resolve(
            query,
            &self.index,
            self.config.match_threshold,
            self.config.selection,
        ) {
            Resolution::Match {
                answer,
                pattern,
                score,
            } => {
                tracing::info!(pattern = %pattern, score, "Answered from knowledge base");
                Answer {
                    text: answer,
                    source: AnswerSource::KnowledgeBase,
                }
            }
            Resolution::NoMatch { best_score } => {
                tracing::info!(?best_score, "No knowledge base match, apologizing");
                Answer {
                    text: locale::apology(language).to_string(),
                    source: AnswerSource::Fallback,
                }
            }
        }
    }

    async fn generate(&self, query: &str, language: Language) -> String {
        let Some(responder) = &self.responder else {
            return String::new();
        };

        let request = LlmRequest::prompt(render_prompt(query, language))
            .with_max_tokens(self.config.max_output_tokens)
            .with_sampling(GENERATION_SAMPLING);

        match responder.complete(&request).await {
            Ok(response) => response.text,
            Err(e) => {
                tracing::warn!(error = %e, kind = ?e.kind, "Generative responder failed");
                String::new()
            }
        }
    }
}
