use crate::config::{Config, SCHEMA_VERSION};
use crate::error::{HoundError, Result, ValidationError};

/// Known embedding provider names
const EMBEDDING_PROVIDERS: [&str; 3] = ["http", "local", "none"];

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration, collecting every problem
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_retrieval(config, &mut errors);
        Self::validate_tools(config, &mut errors);
        Self::validate_oracle(config, &mut errors);
        Self::validate_embedding(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(HoundError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != SCHEMA_VERSION {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_retrieval(config: &Config, errors: &mut Vec<ValidationError>) {
        let r = &config.retrieval;

        if r.max_iterations == 0 {
            errors.push(ValidationError::new(
                "retrieval.max_iterations",
                "Max iterations must be at least 1",
            ));
        }

        if r.confidence_threshold > 100 {
            errors.push(ValidationError::new(
                "retrieval.confidence_threshold",
                format!(
                    "Confidence threshold must be between 0 and 100, got {}",
                    r.confidence_threshold
                ),
            ));
        }

        if r.max_line_budget == 0 {
            errors.push(ValidationError::new(
                "retrieval.max_line_budget",
                "Line budget must be greater than 0",
            ));
        }

        if r.token_budget == 0 {
            errors.push(ValidationError::new(
                "retrieval.token_budget",
                "Token budget must be greater than 0",
            ));
        }

        if r.narrowing_min_files == 0 || r.narrowing_min_files > r.narrowing_max_files {
            errors.push(ValidationError::new(
                "retrieval.narrowing_min_files",
                format!(
                    "Narrowing bounds must satisfy 1 <= min <= max, got {}..{}",
                    r.narrowing_min_files, r.narrowing_max_files
                ),
            ));
        }

        if r.fallback_files == 0 {
            errors.push(ValidationError::new(
                "retrieval.fallback_files",
                "Fallback file count must be greater than 0",
            ));
        }

        let (kw, sem) = (r.keyword_weight, r.semantic_weight);
        if kw < 0.0 || sem < 0.0 || (kw == 0.0 && sem == 0.0) {
            errors.push(ValidationError::new(
                "retrieval.keyword_weight",
                format!(
                    "Fusion weights must be non-negative and not both zero, got {} and {}",
                    kw, sem
                ),
            ));
        }
    }

    fn validate_tools(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.tools.max_search_results == 0 {
            errors.push(ValidationError::new(
                "tools.max_search_results",
                "Max search results must be greater than 0",
            ));
        }

        if config.tools.max_file_bytes == 0 {
            errors.push(ValidationError::new(
                "tools.max_file_bytes",
                "Max file size must be greater than 0",
            ));
        }
    }

    fn validate_oracle(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.oracle.base_url.trim().is_empty() {
            errors.push(ValidationError::new(
                "oracle.base_url",
                "Base URL cannot be empty",
            ));
        }

        if config.oracle.model.trim().is_empty() {
            errors.push(ValidationError::new(
                "oracle.model",
                "Model name cannot be empty",
            ));
        }

        let temp = config.oracle.temperature;
        if !(0.0..=2.0).contains(&temp) {
            errors.push(ValidationError::new(
                "oracle.temperature",
                format!("Temperature must be between 0.0 and 2.0, got {}", temp),
            ));
        }

        if config.oracle.max_tokens == 0 {
            errors.push(ValidationError::new(
                "oracle.max_tokens",
                "Max tokens must be greater than 0",
            ));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        let provider = &config.embedding.provider;
        if !EMBEDDING_PROVIDERS.contains(&provider.as_str()) {
            errors.push(ValidationError::new(
                "embedding.provider",
                format!(
                    "Provider must be one of {:?}, got '{}'",
                    EMBEDDING_PROVIDERS, provider
                ),
            ));
        }

        if !config.embedding.enabled || provider == "none" {
            return;
        }

        if config.embedding.batch_size == 0 {
            errors.push(ValidationError::new(
                "embedding.batch_size",
                "Batch size must be greater than 0",
            ));
        }

        if config.embedding.model.is_empty() {
            errors.push(ValidationError::new(
                "embedding.model",
                "Model name cannot be empty",
            ));
        }

        if provider == "http" && config.embedding.dimension == 0 {
            errors.push(ValidationError::new(
                "embedding.dimension",
                "Embedding dimension must be greater than 0",
            ));
        }
    }
}
