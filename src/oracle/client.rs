//! HTTP oracle for OpenAI-compatible chat completion endpoints

use super::{ChatMessage, Completion, CompletionOracle, CompletionRequest, OracleError, TokenUsage};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

/// Completion oracle backed by a `/chat/completions` endpoint
pub struct HttpOracle {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
}

impl HttpOracle {
    /// Create an oracle client
    ///
    /// # Arguments
    /// * `base_url` - Service base URL (e.g. `https://api.openai.com/v1`)
    /// * `api_key` - Bearer token, if the service requires one
    /// * `model` - Chat model identifier
    /// * `timeout` - Per-request timeout
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, OracleError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OracleError::Initialization(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key,
            model: model.to_string(),
        })
    }

    /// Create an oracle whose API key is read from `api_key_env`
    ///
    /// An empty variable name means the service needs no key.
    pub fn from_env(
        base_url: &str,
        api_key_env: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, OracleError> {
        let api_key = if api_key_env.is_empty() {
            None
        } else {
            Some(
                std::env::var(api_key_env)
                    .map_err(|_| OracleError::MissingApiKey(api_key_env.to_string()))?,
            )
        };

        Self::new(base_url, api_key, model, timeout)
    }
}

impl CompletionOracle for HttpOracle {
    fn complete(&self, request: &CompletionRequest) -> Result<Completion, OracleError> {
        let body = ChatRequest {
            model: &self.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let mut builder = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .map_err(|e| OracleError::Http(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(OracleError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| OracleError::InvalidResponse(e.to_string()))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| OracleError::InvalidResponse("response has no choices".to_string()))?;

        let usage = parsed.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
        });
        debug!(
            "Oracle {} returned {} chars (usage reported: {})",
            self.model,
            text.len(),
            usage.is_some()
        );

        Ok(Completion { text, usage })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_construction() {
        let oracle =
            HttpOracle::new("http://localhost:8080/v1/", None, "test-model", Duration::from_secs(5))
                .unwrap();
        assert_eq!(oracle.endpoint, "http://localhost:8080/v1/chat/completions");
        assert_eq!(oracle.model_name(), "test-model");
    }

    #[test]
    fn test_missing_api_key_env() {
        let result = HttpOracle::from_env(
            "http://localhost:8080/v1",
            "CODEHOUND_TEST_KEY_THAT_IS_NEVER_SET",
            "m",
            Duration::from_secs(1),
        );
        assert!(matches!(result, Err(OracleError::MissingApiKey(_))));
    }

    #[test]
    fn test_response_parsing_without_usage() {
        let parsed: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant","content":"hi"}}]}"#)
                .unwrap();
        assert!(parsed.usage.is_none());
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("hi"));
    }
}
