/// Batch processor for embedding generation
use super::EmbeddingProvider;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Item to be embedded (text with associated element ID)
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub id: String,
    pub text: String,
}

/// Result of batch processing
#[derive(Debug, Default)]
pub struct BatchResult {
    /// Successfully embedded items
    pub vectors: Vec<(String, Vec<f32>)>,
    /// Items that produced no vector
    pub failed: usize,
    /// Errors from batches that failed as a whole
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

/// Splits items into fixed-size batches and embeds them, tolerating
/// per-item and per-batch failures
pub struct BatchProcessor<'a> {
    provider: &'a dyn EmbeddingProvider,
    batch_size: usize,
}

impl<'a> BatchProcessor<'a> {
    /// Create a new batch processor
    ///
    /// # Arguments
    /// * `provider` - Embedding provider
    /// * `batch_size` - Number of items to embed in one request (minimum 1)
    pub fn new(provider: &'a dyn EmbeddingProvider, batch_size: usize) -> Self {
        Self {
            provider,
            batch_size: batch_size.max(1),
        }
    }

    /// Embed every item. Never fails: failures are counted in the result.
    pub fn process(&self, items: &[BatchItem]) -> BatchResult {
        let start = Instant::now();
        let mut result = BatchResult::default();

        info!(
            "Embedding {} items with {} (batch size {})",
            items.len(),
            self.provider.model_name(),
            self.batch_size
        );

        for chunk in items.chunks(self.batch_size) {
            let texts: Vec<String> = chunk.iter().map(|item| item.text.clone()).collect();

            match self.provider.embed_batch(&texts) {
                Ok(embeddings) if embeddings.len() == chunk.len() => {
                    for (item, embedding) in chunk.iter().zip(embeddings) {
                        match embedding {
                            Some(vector) => result.vectors.push((item.id.clone(), vector)),
                            None => result.failed += 1,
                        }
                    }
                    debug!("Embedded chunk of {} items", chunk.len());
                }
                Ok(embeddings) => {
                    let message = format!(
                        "Embedding count mismatch: expected {}, got {}",
                        chunk.len(),
                        embeddings.len()
                    );
                    warn!("{}", message);
                    result.errors.push(message);
                    result.failed += chunk.len();
                }
                Err(e) => {
                    warn!("Failed to embed chunk: {}", e);
                    result.errors.push(e.to_string());
                    result.failed += chunk.len();
                }
            }
        }

        result.duration_ms = start.elapsed().as_millis() as u64;

        info!(
            "Embedding complete: {} embedded, {} failed, {}ms",
            result.vectors.len(),
            result.failed,
            result.duration_ms
        );

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EmbeddingError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails every second batch and refuses texts containing "bad"
    struct FlakyProvider {
        calls: AtomicUsize,
    }

    impl EmbeddingProvider for FlakyProvider {
        fn embed_batch(
            &self,
            texts: &[String],
        ) -> Result<Vec<Option<Vec<f32>>>, EmbeddingError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call % 2 == 1 {
                return Err(EmbeddingError::GenerationError("service down".to_string()));
            }
            Ok(texts
                .iter()
                .map(|t| (!t.contains("bad")).then(|| vec![1.0, 0.0]))
                .collect())
        }

        fn dimension(&self) -> usize {
            2
        }

        fn model_name(&self) -> &str {
            "flaky"
        }
    }

    fn items(texts: &[&str]) -> Vec<BatchItem> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| BatchItem {
                id: format!("e{}", i),
                text: t.to_string(),
            })
            .collect()
    }

    #[test]
    fn test_partial_failures_are_counted() {
        let provider = FlakyProvider {
            calls: AtomicUsize::new(0),
        };
        let processor = BatchProcessor::new(&provider, 2);

        // Batches: [ok, bad] -> 1 ok, 1 none; [x, y] -> whole batch fails; [z] -> ok
        let result = processor.process(&items(&["ok", "bad", "x", "y", "z"]));

        let ids: Vec<&str> = result.vectors.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["e0", "e4"]);
        assert_eq!(result.failed, 3);
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn test_empty_batch() {
        let provider = FlakyProvider {
            calls: AtomicUsize::new(0),
        };
        let processor = BatchProcessor::new(&provider, 0);

        let result = processor.process(&[]);
        assert!(result.vectors.is_empty());
        assert_eq!(result.failed, 0);
    }
}
