/// Embedding provider trait and implementations
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Model initialization failed: {0}")]
    InitializationError(String),

    #[error("Embedding generation failed: {0}")]
    GenerationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Embedding request failed: {0}")]
    RequestError(String),

    #[error("API key environment variable {0} is not set")]
    MissingApiKey(String),
}

/// Trait for embedding providers
///
/// Allows abstraction over different embedding backends (HTTP services,
/// local models, test doubles).
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embeddings for a batch of texts.
    ///
    /// The result has one entry per input text; `None` marks a text that
    /// could not be embedded without failing the whole batch.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Option<Vec<f32>>>, EmbeddingError>;

    /// Generate embedding for a single text
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput("Empty text".to_string()));
        }

        self.embed_batch(&[text.to_string()])?
            .into_iter()
            .next()
            .flatten()
            .ok_or_else(|| EmbeddingError::GenerationError("No embedding generated".to_string()))
    }

    /// Get the embedding dimension
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

/// Embedding provider for OpenAI-compatible `/embeddings` endpoints
pub struct HttpEmbeddingProvider {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: Option<String>,
    model_name: String,
    dimension: usize,
}

impl HttpEmbeddingProvider {
    /// Create a provider
    ///
    /// # Arguments
    /// * `base_url` - Service base URL (e.g. `https://api.openai.com/v1`)
    /// * `api_key` - Bearer token, if the service requires one
    /// * `model_name` - Embedding model identifier
    /// * `dimension` - Expected vector length; mismatched vectors are dropped
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        model_name: &str,
        dimension: usize,
        timeout: Duration,
    ) -> Result<Self, EmbeddingError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EmbeddingError::InitializationError(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            api_key,
            model_name: model_name.to_string(),
            dimension,
        })
    }
}

impl EmbeddingProvider for HttpEmbeddingProvider {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Option<Vec<f32>>>, EmbeddingError> {
        let mut results: Vec<Option<Vec<f32>>> = vec![None; texts.len()];

        // Empty texts are not sent; they stay `None`
        let positions: Vec<usize> = (0..texts.len())
            .filter(|&i| !texts[i].trim().is_empty())
            .collect();
        if positions.is_empty() {
            return Ok(results);
        }

        let request = EmbeddingRequest {
            model: &self.model_name,
            input: positions.iter().map(|&i| texts[i].as_str()).collect(),
        };

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .map_err(|e| EmbeddingError::RequestError(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(EmbeddingError::RequestError(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .map_err(|e| EmbeddingError::GenerationError(e.to_string()))?;

        for datum in parsed.data {
            let Some(&position) = positions.get(datum.index) else {
                tracing::warn!("Embedding response index {} out of range", datum.index);
                continue;
            };
            if datum.embedding.len() != self.dimension {
                tracing::warn!(
                    "Dropping embedding with dimension {} (expected {})",
                    datum.embedding.len(),
                    self.dimension
                );
                continue;
            }
            results[position] = Some(datum.embedding);
        }

        Ok(results)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(feature = "local-embeddings")]
pub use local::FastEmbedProvider;

#[cfg(feature = "local-embeddings")]
mod local {
    use super::{EmbeddingError, EmbeddingProvider};
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use std::sync::Arc;

    /// FastEmbed provider for local embedding generation
    ///
    /// Uses all-MiniLM-L6-v2 model (384 dimensions) by default.
    pub struct FastEmbedProvider {
        model: Arc<TextEmbedding>,
        model_name: String,
        dimension: usize,
    }

    impl FastEmbedProvider {
        /// Create a new FastEmbed provider with the specified model
        ///
        /// Models are downloaded to `~/.cache/huggingface/` on first use.
        pub fn new(model_name: &str) -> Result<Self, EmbeddingError> {
            let (embedding_model, dimension) = match model_name {
                "all-MiniLM-L6-v2" | "all-minilm-l6-v2" => (EmbeddingModel::AllMiniLML6V2, 384),
                "bge-small-en-v1.5" => (EmbeddingModel::BGESmallENV15, 384),
                "bge-base-en-v1.5" => (EmbeddingModel::BGEBaseENV15, 768),
                _ => {
                    return Err(EmbeddingError::InitializationError(format!(
                        "Unsupported model: {}. Supported: all-MiniLM-L6-v2, bge-small-en-v1.5, bge-base-en-v1.5",
                        model_name
                    )));
                }
            };

            tracing::info!("Initializing embedding model: {} ({}D)", model_name, dimension);

            let init_options = InitOptions::new(embedding_model).with_show_download_progress(true);
            let model = TextEmbedding::try_new(init_options)
                .map_err(|e| EmbeddingError::InitializationError(e.to_string()))?;

            Ok(Self {
                model: Arc::new(model),
                model_name: model_name.to_string(),
                dimension,
            })
        }
    }

    impl EmbeddingProvider for FastEmbedProvider {
        fn embed_batch(
            &self,
            texts: &[String],
        ) -> Result<Vec<Option<Vec<f32>>>, EmbeddingError> {
            let mut results: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
            let positions: Vec<usize> = (0..texts.len())
                .filter(|&i| !texts[i].trim().is_empty())
                .collect();
            if positions.is_empty() {
                return Ok(results);
            }

            let inputs: Vec<String> = positions.iter().map(|&i| texts[i].clone()).collect();
            let embeddings = self
                .model
                .embed(inputs, None)
                .map_err(|e| EmbeddingError::GenerationError(e.to_string()))?;

            for (position, embedding) in positions.into_iter().zip(embeddings) {
                if embedding.len() == self.dimension {
                    results[position] = Some(embedding);
                }
            }

            Ok(results)
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        fn model_name(&self) -> &str {
            &self.model_name
        }
    }

}
