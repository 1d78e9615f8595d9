//! Provenance tracking and scored element structures

use crate::elements::CodeElement;
use serde::{Deserialize, Serialize};

/// Which index produced a search hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Keyword (BM25) index only
    Keyword,
    /// Vector index only
    Semantic,
    /// Both indexes
    Hybrid,
}

impl Provenance {
    /// Combine with a hit for the same element from the other index
    pub fn merge(self, other: Provenance) -> Provenance {
        if self == other {
            self
        } else {
            Provenance::Hybrid
        }
    }
}

/// Search result before hydration: (element ID, score, provenance)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub score: f32,
    pub provenance: Provenance,
}

/// A code element with relevance score and provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredElement {
    pub element: CodeElement,

    /// Fused relevance score (higher is better)
    pub score: f32,

    pub provenance: Provenance,
}

impl ScoredElement {
    pub fn new(element: CodeElement, score: f32, provenance: Provenance) -> Self {
        Self {
            element,
            score,
            provenance,
        }
    }
}
