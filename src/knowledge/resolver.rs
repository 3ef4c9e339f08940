//! Fuzzy lookup of a free-text query in the knowledge index

use super::index::{normalize, KnowledgeIndex, ResponseSelection};
use super::matching::weighted_ratio;

/// Scores must be strictly above this to count as a match
pub const DEFAULT_MATCH_THRESHOLD: u8 = 60;

/// Outcome of resolving a query against the index
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Match {
        answer: String,
        pattern: String,
        score: u8,
    },
    NoMatch {
        /// Highest score seen, if the index was not empty
        best_score: Option<u8>,
    },
}

impl Resolution {
    pub fn answer(&self) -> Option<&str> {
        match self {
            Resolution::Match { answer, .. } => Some(answer),
            Resolution::NoMatch { .. } => None,
        }
    }
}

/// Find the best-scoring pattern for `query` and accept it if its score is
/// strictly greater than `threshold`.
///
/// A pattern equal to the normalized query always wins with 100. Other ties
/// keep the earliest pattern in index order.
pub fn resolve(
    query: &str,
    index: &KnowledgeIndex,
    threshold: u8,
    selection: ResponseSelection,
) -> Resolution {
    let query = normalize(query);

    let best = match index.patterns().find(|pattern| *pattern == query) {
        Some(pattern) => Some((pattern, 100)),
        None => best_fuzzy(&query, index),
    };

    match best {
        Some((pattern, score)) if score > threshold => match index.answer_for(pattern, selection) {
            Some(answer) => Resolution::Match {
                answer: answer.to_string(),
                pattern: pattern.to_string(),
                score,
            },
            None => Resolution::NoMatch {
                best_score: Some(score),
            },
        },
        Some((_, score)) => Resolution::NoMatch {
            best_score: Some(score),
        },
        None => Resolution::NoMatch { best_score: None },
    }
}

fn best_fuzzy<'a>(query: &str, index: &'a KnowledgeIndex) -> Option<(&'a str, u8)> {
    let mut best: Option<(&str, u8)> = None;
    for pattern in index.patterns() {
        let score = weighted_ratio(query, pattern);
        if best.map_or(true, |(_, top)| score > top) {
            best = Some((pattern, score));
        }
    }
    best
}
