//! Hybrid search combining keyword and semantic ranking over code elements

use crate::elements::CodeElement;
use crate::embedding::{BatchItem, BatchProcessor, EmbeddingProvider, KeywordIndex, VectorIndex};
use crate::retrieval::{rerank_by_type, weighted_fusion, FusionConfig, ScoredElement};
use ahash::AHashMap;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Embedding failed for {failed} of {total} elements: {message}")]
    EmbeddingFailed {
        failed: usize,
        total: usize,
        message: String,
    },

    #[error("Invalid fusion weights: keyword {keyword}, semantic {semantic}")]
    InvalidWeights { keyword: f32, semantic: f32 },
}

/// Hybrid retriever configuration
#[derive(Debug, Clone)]
pub struct HybridConfig {
    pub fusion: FusionConfig,

    /// Characters of code included in keyword documents
    pub code_excerpt_chars: usize,

    /// Characters of code included in embedding texts
    pub embedding_code_chars: usize,

    /// Texts per embedding request
    pub batch_size: usize,

    /// Lower bound on candidates drawn from each index
    pub min_candidates: usize,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            fusion: FusionConfig::default(),
            code_excerpt_chars: 1000,
            embedding_code_chars: 1500,
            batch_size: 32,
            min_candidates: 20,
        }
    }
}

impl HybridConfig {
    /// Default configuration with custom fusion weights
    pub fn with_weights(keyword_weight: f32, semantic_weight: f32) -> Result<Self, SearchError> {
        let fusion = FusionConfig::new(keyword_weight, semantic_weight).map_err(|_| {
            SearchError::InvalidWeights {
                keyword: keyword_weight,
                semantic: semantic_weight,
            }
        })?;

        Ok(Self {
            fusion,
            ..Default::default()
        })
    }
}

/// Outcome of indexing a batch of elements
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexReport {
    pub indexed: usize,
    pub skipped_duplicates: usize,
    pub embedded: usize,
}

/// Keyword and vector indexes over one element set
pub struct HybridRetriever {
    config: HybridConfig,
    elements: Vec<CodeElement>,
    positions: AHashMap<String, usize>,
    keyword_index: KeywordIndex,
    vector_index: VectorIndex,
}

impl HybridRetriever {
    pub fn new(config: HybridConfig) -> Self {
        Self {
            config,
            elements: Vec::new(),
            positions: AHashMap::new(),
            keyword_index: KeywordIndex::new(),
            vector_index: VectorIndex::new(),
        }
    }

    /// Index elements into the keyword index and, with an embedder, the
    /// vector index
    ///
    /// Elements whose ID is already indexed are skipped. Embedding problems
    /// never roll back keyword indexing: the keyword index stays usable and
    /// the failure is reported as `SearchError::EmbeddingFailed`.
    ///
    /// # Arguments
    /// * `elements` - Elements to index
    /// * `embedder` - Optional embedding provider
    pub fn index_elements(
        &mut self,
        elements: &[CodeElement],
        embedder: Option<&dyn EmbeddingProvider>,
    ) -> Result<IndexReport, SearchError> {
        let mut report = IndexReport::default();
        let mut documents = Vec::with_capacity(elements.len());
        let mut batch_items = Vec::new();

        for element in elements {
            if self.positions.contains_key(&element.id) {
                report.skipped_duplicates += 1;
                continue;
            }

            documents.push((element.id.clone(), self.keyword_document(element)));
            if embedder.is_some() {
                batch_items.push(BatchItem {
                    id: element.id.clone(),
                    text: self.embedding_text(element),
                });
            }

            self.positions.insert(element.id.clone(), self.elements.len());
            self.elements.push(element.clone());
            report.indexed += 1;
        }

        self.keyword_index.insert_batch(documents);
        info!(
            "Indexed {} elements for keyword search ({} duplicates skipped)",
            report.indexed, report.skipped_duplicates
        );

        let Some(embedder) = embedder else {
            return Ok(report);
        };
        if batch_items.is_empty() {
            return Ok(report);
        }

        let processor = BatchProcessor::new(embedder, self.config.batch_size);
        let result = processor.process(&batch_items);
        report.embedded = result.vectors.len();
        self.vector_index.insert_batch(result.vectors);

        if result.failed > 0 {
            warn!(
                "{} of {} elements could not be embedded; keyword search is unaffected",
                result.failed,
                batch_items.len()
            );
            return Err(SearchError::EmbeddingFailed {
                failed: result.failed,
                total: batch_items.len(),
                message: result.errors.join("; "),
            });
        }

        Ok(report)
    }

    /// Search both indexes and fuse the rankings
    ///
    /// # Arguments
    /// * `query` - Free-text query for the keyword index
    /// * `query_vector` - Query embedding for the vector index, if available
    /// * `top_k` - Maximum results
    pub fn search(
        &self,
        query: &str,
        query_vector: Option<&[f32]>,
        top_k: usize,
    ) -> Vec<ScoredElement> {
        if top_k == 0 {
            return Vec::new();
        }

        let candidates = (top_k * 2).max(self.config.min_candidates);
        let keyword_results = self.keyword_index.search(query, candidates);
        let semantic_results = match query_vector {
            Some(vector) if !self.vector_index.is_empty() => {
                self.vector_index.search(vector, candidates)
            }
            _ => Vec::new(),
        };

        debug!(
            "Hybrid search '{}': {} keyword, {} semantic candidates",
            query,
            keyword_results.len(),
            semantic_results.len()
        );

        let mut results: Vec<ScoredElement> =
            weighted_fusion(&keyword_results, &semantic_results, &self.config.fusion)
                .into_iter()
                .filter_map(|hit| {
                    self.element(&hit.id)
                        .map(|element| ScoredElement::new(element.clone(), hit.score, hit.provenance))
                })
                .collect();

        rerank_by_type(&mut results);
        results.truncate(top_k);
        results
    }

    pub fn element(&self, id: &str) -> Option<&CodeElement> {
        self.positions.get(id).map(|&index| &self.elements[index])
    }

    pub fn elements(&self) -> &[CodeElement] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Whether any element has a stored embedding
    pub fn has_vectors(&self) -> bool {
        !self.vector_index.is_empty()
    }

    fn keyword_document(&self, element: &CodeElement) -> String {
        let mut parts = vec![
            element.name.clone(),
            element.kind.to_string(),
            element.language.clone(),
            element.path.clone(),
        ];
        parts.extend(element.docstring.iter().cloned());
        parts.extend(element.signature.iter().cloned());
        parts.extend(element.summary.iter().cloned());
        parts.push(truncate_chars(&element.code, self.config.code_excerpt_chars).to_string());
        parts.join(" ")
    }

    fn embedding_text(&self, element: &CodeElement) -> String {
        let mut text = format!("Type: {}\nName: {}\n", element.kind, element.name);
        if let Some(signature) = &element.signature {
            text.push_str(&format!("Signature: {}\n", signature));
        }
        if let Some(docstring) = &element.docstring {
            text.push_str(&format!("Documentation: {}\n", docstring));
        }
        text.push_str(&format!(
            "Code:\n{}",
            truncate_chars(&element.code, self.config.embedding_code_chars)
        ));
        text
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}
