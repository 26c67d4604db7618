use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ChatMessage;

/// Similarity percentage a fuzzy match must reach unless the user picks another.
pub const DEFAULT_FUZZY_CUTOFF: u8 = 75;

/// A search over the filtered messages held by the backend session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchQuery {
    /// Whole-word, case-insensitive occurrences of `keyword`, counted per sender.
    Keyword(String),
    /// Messages at least `cutoff` percent similar to `query`.
    Fuzzy { query: String, cutoff: u8 },
}

impl SearchQuery {
    pub fn fuzzy(query: impl Into<String>) -> Self {
        SearchQuery::Fuzzy {
            query: query.into(),
            cutoff: DEFAULT_FUZZY_CUTOFF,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            SearchQuery::Keyword(keyword) => keyword,
            SearchQuery::Fuzzy { query, .. } => query,
        }
    }

    /// Trims the search text and checks it is worth sending.
    pub fn normalized(self) -> Result<Self, String> {
        let query = match self {
            SearchQuery::Keyword(keyword) => SearchQuery::Keyword(keyword.trim().to_string()),
            SearchQuery::Fuzzy { query, cutoff } => {
                if cutoff > 100 {
                    return Err(format!(
                        "Similarity cutoff must be between 0 and 100, got {cutoff}."
                    ));
                }
                SearchQuery::Fuzzy {
                    query: query.trim().to_string(),
                    cutoff,
                }
            }
        };
        if query.text().is_empty() {
            return Err("Enter something to search for.".to_string());
        }
        Ok(query)
    }
}

/// Answer of the keyword count endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeywordCount {
    /// Matches per sender; senders without a match are absent.
    #[serde(default)]
    pub counts: BTreeMap<String, u64>,
    #[serde(default)]
    pub total_matches: u64,
    /// How many filtered messages were searched.
    #[serde(default)]
    pub message_count: u64,
}

impl KeywordCount {
    /// Senders with the most matches first; ties by name.
    pub fn ranked(&self) -> Vec<(&str, u64)> {
        let mut ranked: Vec<(&str, u64)> = self
            .counts
            .iter()
            .map(|(sender, count)| (sender.as_str(), *count))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked
    }
}

/// Answer of the fuzzy search endpoint, best match first.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FuzzyMatches {
    #[serde(default)]
    pub matches: Vec<ChatMessage>,
    #[serde(default)]
    pub match_count: usize,
    #[serde(default)]
    pub total_messages_searched: usize,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub similarity_cutoff: u64,
}

impl FuzzyMatches {
    /// Each match with the similarity score the backend attached to it.
    pub fn scored(&self) -> impl Iterator<Item = (u64, &ChatMessage)> {
        self.matches.iter().map(|message| {
            let score = message
                .field("match_score")
                .and_then(|score| score.as_f64())
                .unwrap_or_default();
            (score.round() as u64, message)
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchResult {
    Keyword { keyword: String, count: KeywordCount },
    Fuzzy(FuzzyMatches),
}
