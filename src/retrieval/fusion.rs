//! Weighted score fusion for combining keyword and semantic results

use crate::embedding::{KeywordSearchResult, SearchResult};
use crate::retrieval::{Provenance, SearchHit};
use ahash::AHashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FusionError {
    #[error("Invalid weight configuration: weights must be non-negative and not both zero")]
    InvalidWeights,
}

/// Default weight of normalized keyword scores
pub const DEFAULT_KEYWORD_WEIGHT: f32 = 0.4;
/// Default weight of cosine similarity scores
pub const DEFAULT_SEMANTIC_WEIGHT: f32 = 0.6;

/// Configuration for fusion algorithm
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionConfig {
    /// Weight for keyword results
    pub keyword_weight: f32,

    /// Weight for semantic results
    pub semantic_weight: f32,
}

impl FusionConfig {
    pub fn new(keyword_weight: f32, semantic_weight: f32) -> Result<Self, FusionError> {
        if keyword_weight < 0.0
            || semantic_weight < 0.0
            || (keyword_weight == 0.0 && semantic_weight == 0.0)
        {
            return Err(FusionError::InvalidWeights);
        }

        Ok(Self {
            keyword_weight,
            semantic_weight,
        })
    }
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            keyword_weight: DEFAULT_KEYWORD_WEIGHT,
            semantic_weight: DEFAULT_SEMANTIC_WEIGHT,
        }
    }
}

/// Combine keyword and semantic results with a weighted sum
///
/// Keyword scores are divided by the batch maximum so both inputs live in
/// roughly [0, 1]: `score(id) = kw(id) / max_kw * keyword_weight + cos(id) * semantic_weight`.
///
/// # Returns
/// Fused hits sorted by score descending; ties keep first-seen order
/// (keyword results first).
pub fn weighted_fusion(
    keyword_results: &[KeywordSearchResult],
    semantic_results: &[SearchResult],
    config: &FusionConfig,
) -> Vec<SearchHit> {
    let max_keyword = keyword_results
        .iter()
        .map(|r| r.score)
        .fold(0.0f64, f64::max);

    let mut hits: Vec<SearchHit> = Vec::new();
    let mut positions: AHashMap<String, usize> = AHashMap::new();

    for result in keyword_results {
        let normalized = if max_keyword > 0.0 {
            (result.score / max_keyword) as f32
        } else {
            0.0
        };
        let score = normalized * config.keyword_weight;
        accumulate(&mut hits, &mut positions, &result.id, score, Provenance::Keyword);
    }

    for result in semantic_results {
        let score = result.score * config.semantic_weight;
        accumulate(&mut hits, &mut positions, &result.id, score, Provenance::Semantic);
    }

    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    hits
}

fn accumulate(
    hits: &mut Vec<SearchHit>,
    positions: &mut AHashMap<String, usize>,
    id: &str,
    score: f32,
    provenance: Provenance,
) {
    match positions.get(id) {
        Some(&index) => {
            let hit = &mut hits[index];
            hit.score += score;
            hit.provenance = hit.provenance.merge(provenance);
        }
        None => {
            positions.insert(id.to_string(), hits.len());
            hits.push(SearchHit {
                id: id.to_string(),
                score,
                provenance,
            });
        }
    }
}
