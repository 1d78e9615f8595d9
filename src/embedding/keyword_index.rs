/// In-memory Okapi BM25 keyword index
use ahash::AHashMap;

/// BM25 term-frequency saturation
pub const DEFAULT_K1: f64 = 1.5;
/// BM25 length normalization
pub const DEFAULT_B: f64 = 0.75;
/// Scale applied to the mean IDF when replacing negative IDF values
pub const DEFAULT_EPSILON: f64 = 0.25;

/// Smallest IDF a common term may be floored to
const MIN_IDF_FLOOR: f64 = 1e-6;

/// BM25 ranking parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
    pub epsilon: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self {
            k1: DEFAULT_K1,
            b: DEFAULT_B,
            epsilon: DEFAULT_EPSILON,
        }
    }
}

/// Search result with ID and relevance score
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordSearchResult {
    /// Element ID of the document
    pub id: String,
    /// BM25 relevance score
    pub score: f64,
}

#[derive(Debug, Clone)]
struct KeywordDocument {
    id: String,
    term_freqs: AHashMap<String, usize>,
    length: usize,
}

/// BM25 keyword index
///
/// Term statistics (document frequency, average length, IDF) are kept
/// current after every insert, so the index is always searchable.
#[derive(Debug, Clone, Default)]
pub struct KeywordIndex {
    params: Bm25Params,
    documents: Vec<KeywordDocument>,
    doc_freqs: AHashMap<String, usize>,
    idf: AHashMap<String, f64>,
    total_length: usize,
    avg_doc_len: f64,
}

/// Split text into lowercase alphanumeric tokens longer than one character.
/// Underscores and punctuation are boundaries, so `parse_config` yields
/// `parse` and `config`.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.chars().count() > 1)
        .map(|token| token.to_lowercase())
        .collect()
}

impl KeywordIndex {
    pub fn new() -> Self {
        Self::with_params(Bm25Params::default())
    }

    pub fn with_params(params: Bm25Params) -> Self {
        Self {
            params,
            ..Default::default()
        }
    }

    /// Insert a document and refresh corpus statistics
    pub fn insert(&mut self, id: impl Into<String>, text: &str) {
        self.push_document(id.into(), text);
        self.refresh_statistics();
    }

    /// Insert multiple documents, refreshing statistics once
    pub fn insert_batch<I, S>(&mut self, items: I)
    where
        I: IntoIterator<Item = (S, String)>,
        S: Into<String>,
    {
        for (id, text) in items {
            self.push_document(id.into(), &text);
        }
        self.refresh_statistics();
    }

    fn push_document(&mut self, id: String, text: &str) {
        let tokens = tokenize(text);
        let mut term_freqs: AHashMap<String, usize> = AHashMap::new();
        for token in &tokens {
            *term_freqs.entry(token.clone()).or_insert(0) += 1;
        }

        for term in term_freqs.keys() {
            *self.doc_freqs.entry(term.clone()).or_insert(0) += 1;
        }

        self.total_length += tokens.len();
        self.documents.push(KeywordDocument {
            id,
            term_freqs,
            length: tokens.len(),
        });
    }

    fn refresh_statistics(&mut self) {
        let n = self.documents.len() as f64;
        self.avg_doc_len = if self.documents.is_empty() {
            0.0
        } else {
            self.total_length as f64 / n
        };

        self.idf.clear();
        if self.doc_freqs.is_empty() {
            return;
        }

        let mut idf_sum = 0.0;
        let mut negative_terms = Vec::new();
        for (term, &df) in &self.doc_freqs {
            let df = df as f64;
            let idf = (n - df + 0.5).ln() - (df + 0.5).ln();
            idf_sum += idf;
            if idf < 0.0 {
                negative_terms.push(term.clone());
            }
            self.idf.insert(term.clone(), idf);
        }

        // Common terms get a small positive weight instead of a penalty
        let average_idf = idf_sum / self.doc_freqs.len() as f64;
        let floor = (self.params.epsilon * average_idf).max(MIN_IDF_FLOOR);
        for term in negative_terms {
            self.idf.insert(term, floor);
        }
    }

    /// Search the index
    ///
    /// # Returns
    /// At most `limit` results with positive score, best first. Ties keep
    /// insertion order.
    pub fn search(&self, query: &str, limit: usize) -> Vec<KeywordSearchResult> {
        if limit == 0 || self.documents.is_empty() {
            return Vec::new();
        }

        let terms = tokenize(query);
        if terms.is_empty() {
            return Vec::new();
        }

        let Bm25Params { k1, b, .. } = self.params;
        let avg_len = if self.avg_doc_len > 0.0 {
            self.avg_doc_len
        } else {
            1.0
        };

        let mut results: Vec<KeywordSearchResult> = self
            .documents
            .iter()
            .filter_map(|doc| {
                let length_norm = 1.0 - b + b * doc.length as f64 / avg_len;
                let score: f64 = terms
                    .iter()
                    .filter_map(|term| {
                        let tf = *doc.term_freqs.get(term)? as f64;
                        let idf = *self.idf.get(term)?;
                        Some(idf * (tf * (k1 + 1.0)) / (tf + k1 * length_norm))
                    })
                    .sum();

                (score > 0.0).then(|| KeywordSearchResult {
                    id: doc.id.clone(),
                    score,
                })
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(limit);
        results
    }

    /// IDF of a term, if it occurs in the corpus
    pub fn idf(&self, term: &str) -> Option<f64> {
        self.idf.get(term).copied()
    }

    pub fn avg_doc_len(&self) -> f64 {
        self.avg_doc_len
    }

    /// Remove all documents
    pub fn clear(&mut self) {
        self.documents.clear();
        self.doc_freqs.clear();
        self.idf.clear();
        self.total_length = 0;
        self.avg_doc_len = 0.0;
    }

    /// Get the number of documents in the index
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Check if index is empty
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}
