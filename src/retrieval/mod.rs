//! Hybrid Retrieval
//!
//! Combines BM25 keyword ranking and cosine similarity over code elements
//! with weighted score fusion and type-based reweighting, plus the
//! containment-aware deduplication used when accumulating evidence.

mod deduplication;
mod fusion;
mod hybrid;
mod provenance;
mod reranker;

pub use deduplication::{deduplicate_by_id, deduplicate_elements};
pub use fusion::{
    weighted_fusion, FusionConfig, FusionError, DEFAULT_KEYWORD_WEIGHT, DEFAULT_SEMANTIC_WEIGHT,
};
pub use hybrid::{HybridConfig, HybridRetriever, IndexReport, SearchError};
pub use provenance::{Provenance, ScoredElement, SearchHit};
pub use reranker::{rerank_by_type, type_weight};
