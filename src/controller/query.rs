//! Query preprocessing and heuristic complexity

use crate::embedding::tokenize;
use serde::Serialize;

const STOP_WORDS: &[&str] = &[
    "the", "is", "are", "was", "be", "an", "and", "or", "of", "to", "in", "on", "for", "with",
    "it", "its", "this", "that", "what", "where", "which", "who", "does", "do", "did", "can",
    "could", "should", "would", "there", "me", "my", "we", "our", "you", "your", "from", "at",
    "by", "as", "into", "about", "show", "tell", "code",
];

const BROAD_WORDS: &[&str] = &[
    "how",
    "why",
    "architecture",
    "flow",
    "all",
    "overall",
    "design",
    "interact",
    "interacts",
    "relationship",
    "between",
    "lifecycle",
    "explain",
];

const LOOKUP_PREFIXES: &[&str] = &["where is", "where's", "where are", "find", "locate", "which file"];

const BASE_COMPLEXITY: i32 = 25;

/// A query prepared for retrieval
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessedQuery {
    pub text: String,
    /// Lowercase content tokens, stop words removed, first occurrence order
    pub keywords: Vec<String>,
    /// Code-like identifiers found verbatim in the query
    pub identifiers: Vec<String>,
    /// Complexity estimate (0-100) used when the oracle gives none
    pub heuristic_complexity: u8,
}

/// Turns raw query text into a [`ProcessedQuery`]
#[derive(Debug, Clone, Default)]
pub struct QueryProcessor;

impl QueryProcessor {
    pub fn new() -> Self {
        Self
    }

    pub fn process(&self, query: &str) -> ProcessedQuery {
        let text = query.trim().to_string();

        let mut keywords: Vec<String> = Vec::new();
        for token in tokenize(&text) {
            if !STOP_WORDS.contains(&token.as_str()) && !keywords.contains(&token) {
                keywords.push(token);
            }
        }

        let identifiers = extract_identifiers(&text);
        let heuristic_complexity = estimate_complexity(&text, &keywords, &identifiers);

        ProcessedQuery {
            text,
            keywords,
            identifiers,
            heuristic_complexity,
        }
    }
}

/// Words that look like code: snake_case, camelCase, paths, or `a::b`
fn extract_identifiers(text: &str) -> Vec<String> {
    let mut identifiers = Vec::new();
    for word in text.split_whitespace() {
        let word = word.trim_matches(|c: char| !(c.is_alphanumeric() || c == '_'));
        if word.len() < 2 {
            continue;
        }
        let has_inner_upper = word.chars().skip(1).any(char::is_uppercase)
            && word.chars().any(char::is_lowercase);
        let code_like = word.contains('_')
            || word.contains("::")
            || word.contains('/')
            || (word.contains('.') && !word.ends_with('.'))
            || has_inner_upper;

        if code_like && !identifiers.iter().any(|i: &String| i == word) {
            identifiers.push(word.to_string());
        }
    }
    identifiers
}

fn estimate_complexity(text: &str, keywords: &[String], identifiers: &[String]) -> u8 {
    let lower = text.to_lowercase();
    let mut score = BASE_COMPLEXITY;

    score += (keywords.len().saturating_sub(3) as i32 * 5).min(30);

    let broad = keywords
        .iter()
        .filter(|k| BROAD_WORDS.contains(&k.as_str()))
        .count() as i32;
    score += (broad * 15).min(40);

    if identifiers.len() > 1 {
        score += ((identifiers.len() as i32 - 1) * 10).min(20);
    }

    if LOOKUP_PREFIXES.iter().any(|p| lower.starts_with(p)) {
        score -= 15;
    }

    score.clamp(0, 100) as u8
}
