/// In-memory vector index with exact cosine similarity search
use ahash::AHashMap;

/// Search result with ID and similarity score
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    /// Element ID of the vector
    pub id: String,
    /// Cosine similarity (0.0 to 1.0 after filtering, higher is more similar)
    pub score: f32,
}

/// Brute-force vector index
///
/// The first inserted vector fixes the index dimension. Later vectors of a
/// different length are stored but never match: their similarity is 0.
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    entries: Vec<(String, Vec<f32>)>,
    /// Entry position by ID
    positions: AHashMap<String, usize>,
    dimension: Option<usize>,
}

/// Cosine similarity of two vectors.
///
/// Returns 0.0 for empty, zero-magnitude, or dimension-mismatched inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a.sqrt() * norm_b.sqrt())) as f32
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a vector, replacing any vector stored under the same ID
    pub fn insert(&mut self, id: impl Into<String>, vector: Vec<f32>) {
        let id = id.into();
        if self.dimension.is_none() && !vector.is_empty() {
            self.dimension = Some(vector.len());
        }

        match self.positions.get(&id) {
            Some(&position) => self.entries[position].1 = vector,
            None => {
                self.positions.insert(id.clone(), self.entries.len());
                self.entries.push((id, vector));
            }
        }
    }

    /// Insert multiple vectors
    pub fn insert_batch(&mut self, items: Vec<(String, Vec<f32>)>) {
        for (id, vector) in items {
            self.insert(id, vector);
        }
    }

    /// Search for the `k` most similar vectors
    ///
    /// # Returns
    /// Results with positive similarity, sorted by score descending
    pub fn search(&self, query: &[f32], k: usize) -> Vec<SearchResult> {
        if query.is_empty() || k == 0 {
            return Vec::new();
        }

        let mut results: Vec<SearchResult> = self
            .entries
            .iter()
            .filter_map(|(id, vector)| {
                let score = cosine_similarity(query, vector);
                (score > 0.0).then(|| SearchResult {
                    id: id.clone(),
                    score,
                })
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(k);
        results
    }

    /// Get the number of vectors in the index
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if index is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Dimension fixed by the first inserted vector
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// Clear the index (remove all vectors)
    pub fn clear(&mut self) {
        self.entries.clear();
        self.positions.clear();
        self.dimension = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_creation() {
        let index = VectorIndex::new();
        assert_eq!(index.dimension(), None);
        assert_eq!(index.len(), 0);
        assert!(index.is_empty());
    }

    #[test]
    fn test_insert_and_search() {
        let mut index = VectorIndex::new();

        index.insert("1", vec![1.0, 0.0, 0.0]);
        index.insert("2", vec![0.0, 1.0, 0.0]);
        index.insert("3", vec![0.9, 0.1, 0.0]);
        index.insert("4", vec![-1.0, 0.0, 0.0]);

        assert_eq!(index.len(), 4);
        assert_eq!(index.dimension(), Some(3));

        let results = index.search(&[1.0, 0.0, 0.0], 10);
        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();

        // Orthogonal and opposite vectors are dropped
        assert_eq!(ids, vec!["1", "3"]);
        assert!((results[0].score - 1.0).abs() < 1e-6);

        let results = index.search(&[1.0, 0.0, 0.0], 1);
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_cosine_properties() {
        let a = [0.3, -1.2, 4.0];
        let b = [2.0, 0.5, 1.0];

        assert_eq!(cosine_similarity(&a, &b), cosine_similarity(&b, &a));
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&a, &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&a, &[0.0, 0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_dimension_mismatch_scores_zero() {
        let mut index = VectorIndex::new();
        index.insert("1", vec![1.0, 0.0]);
        index.insert("2", vec![1.0, 0.0, 0.0]);

        assert_eq!(index.dimension(), Some(2));

        let results = index.search(&[1.0, 0.0], 10);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "1");
    }

    #[test]
    fn test_empty_query() {
        let mut index = VectorIndex::new();
        index.insert("1", vec![1.0, 0.0]);
        assert!(index.search(&[], 10).is_empty());
    }

    #[test]
    fn test_reinsert_replaces() {
        let mut index = VectorIndex::new();
        index.insert("1", vec![1.0, 0.0]);
        index.insert("1", vec![0.0, 1.0]);

        assert_eq!(index.len(), 1);
        assert!(index.search(&[1.0, 0.0], 10).is_empty());

        // Replacing keeps insertion order for the other IDs
        index.insert("2", vec![1.0, 1.0]);
        index.insert("1", vec![1.0, 1.0]);
        assert_eq!(index.len(), 2);
        let ids: Vec<String> = index.search(&[1.0, 1.0], 10).into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["2", "1"]);
    }

    #[test]
    fn test_clear_resets_positions() {
        let mut index = VectorIndex::new();
        index.insert("1", vec![1.0, 0.0]);
        index.insert("2", vec![0.0, 1.0]);
        index.clear();
        assert!(index.is_empty());
        assert_eq!(index.dimension(), None);

        index.insert("2", vec![0.0, 1.0]);
        index.insert("2", vec![1.0, 0.0]);
        assert_eq!(index.len(), 1);
        assert_eq!(index.search(&[1.0, 0.0], 10)[0].id, "2");
    }
}
