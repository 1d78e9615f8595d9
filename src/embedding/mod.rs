/// Embedding & Indexing
///
/// Leaf indexes and embedding generation for hybrid retrieval.
/// Architecture:
/// - EmbeddingProvider trait for abstraction over embedding backends
/// - HttpEmbeddingProvider for OpenAI-compatible services
/// - FastEmbedProvider for local models (`local-embeddings` feature)
/// - VectorIndex for exact cosine similarity search
/// - KeywordIndex for BM25 keyword search
/// - BatchProcessor for batched, failure-tolerant embedding
mod batch;
mod keyword_index;
mod provider;
mod vector_index;

pub use batch::{BatchItem, BatchProcessor, BatchResult};
pub use keyword_index::{tokenize, Bm25Params, KeywordIndex, KeywordSearchResult};
#[cfg(feature = "local-embeddings")]
pub use provider::FastEmbedProvider;
pub use provider::{EmbeddingError, EmbeddingProvider, HttpEmbeddingProvider};
pub use vector_index::{cosine_similarity, SearchResult, VectorIndex};
