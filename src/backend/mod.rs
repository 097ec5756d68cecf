//! Backend trait and normalized request/response types.
//!
//! The [`Backend`] trait abstracts over LLM providers, translating between
//! normalized [`LlmRequest`]/[`LlmResponse`] types and provider-specific
//! HTTP APIs. Built-in implementations: [`OpenAiBackend`],
//! [`AnthropicBackend`], and [`MockBackend`] for tests.
//!
//! ## Architecture
//!
//! ```text
//! LlmClient ──► Provider::for_model() ──► Backend::complete() ──► LlmResponse
//!                                               │
//!                                  ┌────────────┴────────────┐
//!                            OpenAiBackend            AnthropicBackend
//!                        /v1/chat/completions          /v1/messages
//! ```

pub mod anthropic;
pub mod mock;
pub mod openai;

pub use anthropic::AnthropicBackend;
pub use mock::MockBackend;
pub use openai::OpenAiBackend;

use crate::client::LlmConfig;
use crate::error::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

/// Provider families a model identifier can route to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// OpenAI and OpenAI-compatible chat completions.
    OpenAi,
    /// Anthropic Messages API.
    Anthropic,
}

impl Provider {
    /// Resolve the provider family from a model identifier.
    ///
    /// Substring match, case-insensitive: anything mentioning `claude` or
    /// `anthropic` goes to Anthropic, everything else to OpenAI.
    ///
    /// ```
    /// use prompt_engine::backend::Provider;
    ///
    /// assert_eq!(Provider::for_model("claude-3-haiku-20240307"), Provider::Anthropic);
    /// assert_eq!(Provider::for_model("gpt-4o-mini"), Provider::OpenAi);
    /// ```
    pub fn for_model(model: &str) -> Self {
        let lower = model.to_ascii_lowercase();
        if lower.contains("claude") || lower.contains("anthropic") {
            Provider::Anthropic
        } else {
            Provider::OpenAi
        }
    }

    /// Environment variable that carries this provider's credential.
    pub fn credential_var(self) -> &'static str {
        match self {
            Provider::OpenAi => "OPENAI_API_KEY",
            Provider::Anthropic => "ANTHROPIC_API_KEY",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::OpenAi => f.write_str("openai"),
            Provider::Anthropic => f.write_str("anthropic"),
        }
    }
}

/// A normalized LLM request, provider-agnostic.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// Model identifier (e.g. `"gpt-4o-mini"`, `"claude-3-haiku-20240307"`).
    pub model: String,

    /// System prompt. Empty means "no system message".
    pub system_prompt: String,

    /// The user prompt text.
    pub prompt: String,

    /// Sampling configuration (temperature, max_tokens).
    pub config: LlmConfig,
}

impl LlmRequest {
    pub fn new(
        model: impl Into<String>,
        system_prompt: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            system_prompt: system_prompt.into(),
            prompt: prompt.into(),
            config: LlmConfig::default(),
        }
    }

    pub fn with_config(mut self, config: LlmConfig) -> Self {
        self.config = config;
        self
    }
}

/// Token usage reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// A normalized LLM response.
#[derive(Debug)]
pub struct LlmResponse {
    /// The generated text content.
    pub text: String,

    /// HTTP status code (for diagnostics/logging).
    pub status: u16,

    /// Exact usage, when the provider reports it.
    pub usage: Option<Usage>,
}

/// Abstraction over LLM providers.
///
/// Implementors translate between the normalized [`LlmRequest`]/[`LlmResponse`]
/// and the provider's HTTP API. Failures are returned as `Err`; the
/// [`LlmClient`](crate::client::LlmClient) turns them into error-flagged
/// invocations.
///
/// # Object Safety
///
/// This trait is object-safe and designed to be used as `Arc<dyn Backend>`.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Execute a non-streaming completion.
    async fn complete(&self, client: &Client, request: &LlmRequest) -> Result<LlmResponse>;

    /// Human-readable name for logging and diagnostics.
    fn name(&self) -> &'static str;
}

/// Parse a `usage` object with the given field names into [`Usage`].
pub(crate) fn read_usage(
    body: &serde_json::Value,
    input_field: &str,
    output_field: &str,
) -> Option<Usage> {
    let usage = body.get("usage")?;
    Some(Usage {
        input_tokens: usage.get(input_field)?.as_u64()?,
        output_tokens: usage.get(output_field)?.as_u64()?,
    })
}

/// Strip a trailing slash and a redundant `/v1` suffix from a base URL.
///
/// Backends append their own `/v1/...` paths.
pub(crate) fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    for suffix in ["/v1/chat/completions", "/v1/messages", "/v1"] {
        if let Some(stripped) = trimmed.strip_suffix(suffix) {
            return stripped.to_string();
        }
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_provider_routing_is_case_insensitive() {
        assert_eq!(Provider::for_model("Claude-3-5-Sonnet"), Provider::Anthropic);
        assert_eq!(Provider::for_model("anthropic/whatever"), Provider::Anthropic);
        assert_eq!(Provider::for_model("gpt-4"), Provider::OpenAi);
        assert_eq!(Provider::for_model("llama3.2:3b"), Provider::OpenAi);
    }

    #[test]
    fn test_read_usage() {
        let body = json!({"usage": {"prompt_tokens": 12, "completion_tokens": 30}});
        assert_eq!(
            read_usage(&body, "prompt_tokens", "completion_tokens"),
            Some(Usage {
                input_tokens: 12,
                output_tokens: 30
            })
        );
        assert_eq!(read_usage(&body, "input_tokens", "output_tokens"), None);
        assert_eq!(read_usage(&json!({}), "a", "b"), None);
    }

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(normalize_base_url("https://api.openai.com/v1/"), "https://api.openai.com");
        assert_eq!(
            normalize_base_url("https://api.openai.com/v1/chat/completions"),
            "https://api.openai.com"
        );
        assert_eq!(normalize_base_url("http://localhost:8080"), "http://localhost:8080");
    }
}
