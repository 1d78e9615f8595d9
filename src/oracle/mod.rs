//! Completion Oracle
//!
//! The external text-completion service the controller consults for
//! per-round assessments and candidate narrowing:
//! - CompletionOracle trait over role-tagged chat messages
//! - HttpOracle for OpenAI-compatible chat completion services
//! - Lenient response parsing into round results and file selections

mod client;
mod response;

pub use client::HttpOracle;
pub use response::{
    extract_json, fallback_round_result, parse_file_selection, parse_round_result, RoundResult,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("Oracle request failed: {0}")]
    Http(String),

    #[error("Oracle returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid oracle response: {0}")]
    InvalidResponse(String),

    #[error("API key environment variable {0} is not set")]
    MissingApiKey(String),

    #[error("Oracle client initialization failed: {0}")]
    Initialization(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// One completion request
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Token accounting reported by the service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }

    /// Rough estimate at four characters per token
    pub fn estimate(request: &CompletionRequest, response_text: &str) -> Self {
        let prompt_chars: usize = request.messages.iter().map(|m| m.content.len()).sum();
        Self {
            prompt_tokens: (prompt_chars / 4) as u64,
            completion_tokens: (response_text.len() / 4) as u64,
        }
    }
}

/// Completion text plus optional usage
#[derive(Debug, Clone, Default)]
pub struct Completion {
    pub text: String,
    pub usage: Option<TokenUsage>,
}

impl Completion {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: None,
        }
    }

    /// Reported usage, or an estimate when the service gave none
    pub fn usage_or_estimate(&self, request: &CompletionRequest) -> TokenUsage {
        self.usage
            .unwrap_or_else(|| TokenUsage::estimate(request, &self.text))
    }
}

/// Trait for completion backends
///
/// Implementations must be callable from several threads; the controller
/// holds one behind an `Arc`.
pub trait CompletionOracle: Send + Sync {
    fn complete(&self, request: &CompletionRequest) -> Result<Completion, OracleError>;

    /// Model identifier for logs and metadata
    fn model_name(&self) -> &str;
}
