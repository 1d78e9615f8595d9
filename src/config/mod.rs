//! Configuration management for codehound
//!
//! TOML configuration with named profiles and `CODEHOUND_SECTION__KEY`
//! environment overrides, validated before use.

use crate::controller::ControllerConfig;
use crate::error::{HoundError, Result};
use crate::retrieval::HybridConfig;
use crate::tools::{RepoFs, ToolConfig, DEFAULT_EXCLUDED_DIRS, DEFAULT_MAX_FILE_BYTES};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

mod validator;

pub use validator::ConfigValidator;

pub const SCHEMA_VERSION: &str = "1.0.0";

const ENV_PREFIX: &str = "CODEHOUND_";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub profiles: HashMap<String, ProfileOverrides>,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Retrieval loop and ranking settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub max_iterations: usize,
    pub confidence_threshold: u8,
    pub max_line_budget: usize,
    pub token_budget: u64,
    pub narrowing_min_files: usize,
    pub narrowing_max_files: usize,
    pub fallback_files: usize,
    pub baseline_top_k: usize,
    pub parallel_tools: bool,
    pub keyword_weight: f32,
    pub semantic_weight: f32,
    pub code_excerpt_chars: usize,
    pub min_candidates: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        let controller = ControllerConfig::default();
        let hybrid = HybridConfig::default();
        Self {
            max_iterations: controller.max_iterations,
            confidence_threshold: controller.confidence_threshold,
            max_line_budget: controller.max_line_budget,
            token_budget: controller.token_budget,
            narrowing_min_files: controller.narrowing_min_files,
            narrowing_max_files: controller.narrowing_max_files,
            fallback_files: controller.fallback_files,
            baseline_top_k: controller.baseline_top_k,
            parallel_tools: controller.parallel_tools,
            keyword_weight: hybrid.fusion.keyword_weight,
            semantic_weight: hybrid.fusion.semantic_weight,
            code_excerpt_chars: hybrid.code_excerpt_chars,
            min_candidates: hybrid.min_candidates,
        }
    }
}

/// Repository tool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub max_search_results: usize,
    pub query_top_k: usize,
    pub max_file_bytes: u64,
    pub excluded_dirs: Vec<String>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        let tools = ToolConfig::default();
        Self {
            max_search_results: tools.max_search_results,
            query_top_k: tools.query_top_k,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            excluded_dirs: DEFAULT_EXCLUDED_DIRS.iter().map(|d| d.to_string()).collect(),
        }
    }
}

/// Completion oracle settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// OpenAI-compatible base URL
    pub base_url: String,
    /// Environment variable holding the API key; empty for none
    pub api_key_env: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.0,
            max_tokens: 1024,
            timeout_secs: 60,
        }
    }
}

/// Embedding settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub enabled: bool,
    /// "http", "local", or "none"
    pub provider: String,
    pub base_url: String,
    pub api_key_env: String,
    pub model: String,
    pub dimension: usize,
    pub batch_size: usize,
    /// Characters of code included in embedding texts
    pub code_chars: usize,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: "http".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimension: 1536,
            batch_size: 32,
            code_chars: 1500,
            timeout_secs: 30,
        }
    }
}

/// Profile-specific configuration overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_threshold: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_line_budget: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oracle_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_enabled: Option<bool>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(HoundError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| HoundError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();
        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Load `path` when given, else the default file if it exists, else
    /// built-in defaults (with environment overrides)
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }

        let default_path = Self::default_path()?;
        if default_path.exists() {
            return Self::load(&default_path);
        }

        tracing::debug!("No config file at {:?}, using defaults", default_path);
        let mut config = Config::default();
        config.apply_env_overrides();
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| HoundError::Io {
                source: e,
                context: format!("Failed to create config directory: {:?}", parent),
            })?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| HoundError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Apply a profile's overrides and re-validate
    pub fn apply_profile(&mut self, profile: &str) -> Result<()> {
        let overrides = self
            .profiles
            .get(profile)
            .cloned()
            .ok_or_else(|| HoundError::Config(format!("Unknown profile: {}", profile)))?;

        if let Some(v) = overrides.max_iterations {
            self.retrieval.max_iterations = v;
        }
        if let Some(v) = overrides.confidence_threshold {
            self.retrieval.confidence_threshold = v;
        }
        if let Some(v) = overrides.max_line_budget {
            self.retrieval.max_line_budget = v;
        }
        if let Some(v) = overrides.oracle_model {
            self.oracle.model = v;
        }
        if let Some(v) = overrides.embedding_enabled {
            self.embedding.enabled = v;
        }

        ConfigValidator::validate(self)
    }

    /// Apply environment variable overrides
    /// Environment variables in format: CODEHOUND_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix(ENV_PREFIX) {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "RETRIEVAL__MAX_ITERATIONS" => self.retrieval.max_iterations = parse_env(path, value)?,
            "RETRIEVAL__CONFIDENCE_THRESHOLD" => {
                self.retrieval.confidence_threshold = parse_env(path, value)?
            }
            "RETRIEVAL__MAX_LINE_BUDGET" => {
                self.retrieval.max_line_budget = parse_env(path, value)?
            }
            "RETRIEVAL__TOKEN_BUDGET" => self.retrieval.token_budget = parse_env(path, value)?,
            "RETRIEVAL__PARALLEL_TOOLS" => {
                self.retrieval.parallel_tools = parse_env(path, value)?
            }
            "TOOLS__MAX_SEARCH_RESULTS" => {
                self.tools.max_search_results = parse_env(path, value)?
            }
            "ORACLE__BASE_URL" => self.oracle.base_url = value.to_string(),
            "ORACLE__API_KEY_ENV" => self.oracle.api_key_env = value.to_string(),
            "ORACLE__MODEL" => self.oracle.model = value.to_string(),
            "ORACLE__TIMEOUT_SECS" => self.oracle.timeout_secs = parse_env(path, value)?,
            "EMBEDDING__ENABLED" => self.embedding.enabled = parse_env(path, value)?,
            "EMBEDDING__PROVIDER" => self.embedding.provider = value.to_string(),
            "EMBEDDING__BASE_URL" => self.embedding.base_url = value.to_string(),
            "EMBEDDING__MODEL" => self.embedding.model = value.to_string(),
            "EMBEDDING__DIMENSION" => self.embedding.dimension = parse_env(path, value)?,
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| HoundError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("codehound").join("config.toml"))
    }

    pub fn controller_config(&self) -> ControllerConfig {
        let r = &self.retrieval;
        ControllerConfig {
            max_iterations: r.max_iterations,
            confidence_threshold: r.confidence_threshold,
            max_line_budget: r.max_line_budget,
            token_budget: r.token_budget,
            temperature: self.oracle.temperature,
            max_response_tokens: self.oracle.max_tokens,
            narrowing_min_files: r.narrowing_min_files,
            narrowing_max_files: r.narrowing_max_files,
            fallback_files: r.fallback_files,
            baseline_top_k: r.baseline_top_k,
            parallel_tools: r.parallel_tools,
        }
    }

    pub fn hybrid_config(&self) -> Result<HybridConfig> {
        let mut hybrid =
            HybridConfig::with_weights(self.retrieval.keyword_weight, self.retrieval.semantic_weight)?;
        hybrid.code_excerpt_chars = self.retrieval.code_excerpt_chars;
        hybrid.embedding_code_chars = self.embedding.code_chars;
        hybrid.batch_size = self.embedding.batch_size;
        hybrid.min_candidates = self.retrieval.min_candidates;
        Ok(hybrid)
    }

    pub fn tool_config(&self) -> ToolConfig {
        ToolConfig {
            max_search_results: self.tools.max_search_results,
            query_top_k: self.tools.query_top_k,
        }
    }

    /// Filesystem view of `root` with the configured exclusions
    pub fn repo_fs(&self, root: &Path) -> RepoFs {
        RepoFs::new(root)
            .with_excluded_dirs(self.tools.excluded_dirs.iter().cloned())
            .with_max_file_bytes(self.tools.max_file_bytes)
    }

    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_secs(self.oracle.timeout_secs)
    }

    pub fn embedding_timeout(&self) -> Duration {
        Duration::from_secs(self.embedding.timeout_secs)
    }
}

fn parse_env<T: FromStr>(path: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| HoundError::InvalidConfigValue {
            path: path.to_string(),
            message: format!("Cannot parse '{}'", value),
        })
}

impl Default for Config {
    fn default() -> Self {
        let mut profiles = HashMap::new();
        profiles.insert(
            "fast".to_string(),
            ProfileOverrides {
                max_iterations: Some(2),
                max_line_budget: Some(800),
                embedding_enabled: Some(false),
                ..Default::default()
            },
        );
        profiles.insert(
            "thorough".to_string(),
            ProfileOverrides {
                max_iterations: Some(8),
                confidence_threshold: Some(97),
                max_line_budget: Some(4000),
                ..Default::default()
            },
        );

        Self {
            meta: MetaConfig {
                schema_version: SCHEMA_VERSION.to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            retrieval: RetrievalConfig::default(),
            tools: ToolsConfig::default(),
            oracle: OracleConfig::default(),
            embedding: EmbeddingConfig::default(),
            profiles,
        }
    }
}
