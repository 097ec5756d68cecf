//! The LLM client adapter.
//!
//! [`LlmClient`] routes each [`LlmRequest`] to the backend registered for the
//! model's [`Provider`], measures latency and prices the call. It never
//! returns `Err`: an unregistered provider yields a demo response, and a
//! backend failure yields an [`Invocation`] with `error` set.

use crate::backend::{AnthropicBackend, Backend, LlmRequest, OpenAiBackend, Provider};
use crate::config::Config;
use crate::error::Result;
use crate::pricing::{approximate_tokens, estimate_cost};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Prefix of every demo-mode output.
pub const DEMO_MARKER: &str = "[Demo Mode - No API key configured]";

/// Output tokens reported for a demo response.
pub const DEMO_OUTPUT_TOKENS: u64 = 50;

/// Default HTTP timeout for provider calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Sampling configuration for LLM requests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LlmConfig {
    /// Temperature (0.0 = deterministic, 1.0 = creative).
    pub temperature: f64,

    /// Maximum tokens to generate.
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: 1024,
        }
    }
}

impl LlmConfig {
    pub fn with_temperature(mut self, temp: f64) -> Self {
        self.temperature = temp;
        self
    }

    pub fn with_max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = tokens;
        self
    }
}

/// Where an [`Invocation`]'s output came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "provider")]
pub enum ResponseSource {
    /// A real provider call (successful or not).
    Provider(Provider),
    /// No credential was configured; the output is a placeholder.
    Demo,
}

/// Result of a single adapter call.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub output: String,
    pub tokens_input: u64,
    pub tokens_output: u64,
    pub cost_estimate: f64,
    pub latency_ms: u64,
    pub model: String,
    /// Provider failure message. `output` is empty when set.
    pub error: Option<String>,
    pub source: ResponseSource,
}

impl Invocation {
    pub fn is_demo(&self) -> bool {
        self.source == ResponseSource::Demo
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Routes requests to per-provider backends.
///
/// # Example
///
/// ```
/// use prompt_engine::client::LlmClient;
/// use prompt_engine::backend::{LlmRequest, Provider};
///
/// #[tokio::main]
/// async fn main() -> prompt_engine::Result<()> {
///     let client = LlmClient::builder().build()?;
///     assert!(!client.has_backend(Provider::OpenAi));
///
///     let inv = client.invoke(&LlmRequest::new("gpt-4o-mini", "Be brief.", "hello there")).await;
///     assert!(inv.is_demo());
///     assert_eq!(inv.cost_estimate, 0.0);
///     Ok(())
/// }
/// ```
pub struct LlmClient {
    http: reqwest::Client,
    backends: HashMap<Provider, Arc<dyn Backend>>,
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self
            .backends
            .iter()
            .map(|(p, b)| format!("{p}={}", b.name()))
            .collect();
        names.sort();
        f.debug_struct("LlmClient").field("backends", &names).finish()
    }
}

impl LlmClient {
    pub fn builder() -> LlmClientBuilder {
        LlmClientBuilder {
            backends: HashMap::new(),
            timeout: None,
        }
    }

    /// Build a client with a backend for every provider that has a key.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut builder = Self::builder().timeout(config.llm_timeout);
        if let Some(ref key) = config.openai_api_key {
            let mut backend = OpenAiBackend::new(key.clone());
            if let Some(ref url) = config.openai_base_url {
                backend = backend.with_base_url(url);
            }
            builder = builder.backend(Provider::OpenAi, Arc::new(backend));
        }
        if let Some(ref key) = config.anthropic_api_key {
            let mut backend = AnthropicBackend::new(key.clone());
            if let Some(ref url) = config.anthropic_base_url {
                backend = backend.with_base_url(url);
            }
            builder = builder.backend(Provider::Anthropic, Arc::new(backend));
        }
        builder.build()
    }

    pub fn has_backend(&self, provider: Provider) -> bool {
        self.backends.contains_key(&provider)
    }

    /// `true` when no provider has a backend, i.e. every call is a demo.
    pub fn is_demo_only(&self) -> bool {
        self.backends.is_empty()
    }

    /// Run one completion.
    pub async fn invoke(&self, request: &LlmRequest) -> Invocation {
        let start = Instant::now();
        let provider = Provider::for_model(&request.model);

        let Some(backend) = self.backends.get(&provider) else {
            warn!(model = %request.model, %provider, "no credential configured, returning demo response");
            return demo_invocation(request, elapsed_ms(start));
        };

        debug!(model = %request.model, backend = backend.name(), "invoking model");
        match backend.complete(&self.http, request).await {
            Ok(resp) => {
                let latency_ms = elapsed_ms(start);
                let (tokens_input, tokens_output) = match resp.usage {
                    Some(usage) => (usage.input_tokens, usage.output_tokens),
                    None => (
                        approximate_tokens(&request.prompt),
                        approximate_tokens(&resp.text),
                    ),
                };
                Invocation {
                    cost_estimate: estimate_cost(&request.model, tokens_input, tokens_output),
                    output: resp.text,
                    tokens_input,
                    tokens_output,
                    latency_ms,
                    model: request.model.clone(),
                    error: None,
                    source: ResponseSource::Provider(provider),
                }
            }
            Err(e) => {
                let latency_ms = elapsed_ms(start);
                error!(model = %request.model, backend = backend.name(), error = %e, "LLM execution failed");
                Invocation {
                    output: String::new(),
                    tokens_input: 0,
                    tokens_output: 0,
                    cost_estimate: 0.0,
                    latency_ms,
                    model: request.model.clone(),
                    error: Some(e.to_string()),
                    source: ResponseSource::Provider(provider),
                }
            }
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn demo_invocation(request: &LlmRequest, latency_ms: u64) -> Invocation {
    let system_prefix: String = request.system_prompt.chars().take(100).collect();
    let output = format!(
        "{DEMO_MARKER}\n\n\
         This is a simulated response for the given prompt. \
         Configure OPENAI_API_KEY or ANTHROPIC_API_KEY to get real AI responses.\n\n\
         System prompt: {system_prefix}...\n\
         User input length: {} chars",
        request.prompt.chars().count()
    );
    Invocation {
        output,
        tokens_input: approximate_tokens(&request.prompt),
        tokens_output: DEMO_OUTPUT_TOKENS,
        cost_estimate: 0.0,
        latency_ms,
        model: request.model.clone(),
        error: None,
        source: ResponseSource::Demo,
    }
}

/// Builder for [`LlmClient`].
pub struct LlmClientBuilder {
    backends: HashMap<Provider, Arc<dyn Backend>>,
    timeout: Option<Duration>,
}

impl LlmClientBuilder {
    /// Register the backend serving a provider family.
    pub fn backend(mut self, provider: Provider, backend: Arc<dyn Backend>) -> Self {
        self.backends.insert(provider, backend);
        self
    }

    /// Request timeout, [`DEFAULT_TIMEOUT`] when unset.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<LlmClient> {
        let http = reqwest::Client::builder()
            .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()?;
        Ok(LlmClient {
            http,
            backends: self.backends,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;

    fn client_with(provider: Provider, mock: Arc<MockBackend>) -> LlmClient {
        LlmClient::builder().backend(provider, mock).build().unwrap()
    }

    #[tokio::test]
    async fn test_demo_when_no_backend() {
        let client = LlmClient::builder().build().unwrap();
        let system = "s".repeat(150);
        let req = LlmRequest::new("gpt-4o", system, "three word prompt");
        let inv = client.invoke(&req).await;

        assert!(inv.is_demo());
        assert!(inv.output.starts_with(DEMO_MARKER));
        assert!(inv.output.contains(&format!("System prompt: {}...", "s".repeat(100))));
        assert!(inv.output.contains("User input length: 17 chars"));
        assert_eq!(inv.tokens_input, 3);
        assert_eq!(inv.tokens_output, DEMO_OUTPUT_TOKENS);
        assert_eq!(inv.cost_estimate, 0.0);
        assert!(inv.error.is_none());
    }

    #[tokio::test]
    async fn test_routes_by_model_family() {
        let mock = Arc::new(MockBackend::fixed("from claude"));
        let client = client_with(Provider::Anthropic, mock.clone());

        let claude = client
            .invoke(&LlmRequest::new("claude-3-haiku-20240307", "", "hi"))
            .await;
        assert_eq!(claude.output, "from claude");
        assert_eq!(claude.source, ResponseSource::Provider(Provider::Anthropic));

        let gpt = client.invoke(&LlmRequest::new("gpt-4o-mini", "", "hi")).await;
        assert!(gpt.is_demo());
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_word_count_fallback_and_cost() {
        let mock = Arc::new(MockBackend::fixed("one two three four"));
        let client = client_with(Provider::OpenAi, mock);
        let inv = client
            .invoke(&LlmRequest::new("gpt-4", "sys", "a b"))
            .await;

        assert_eq!(inv.tokens_input, 2);
        assert_eq!(inv.tokens_output, 4);
        assert_eq!(inv.cost_estimate, estimate_cost("gpt-4", 2, 4));
        assert!(!inv.is_demo());
        assert!(!inv.is_error());
    }

    #[tokio::test]
    async fn test_failure_is_captured() {
        let mock = Arc::new(MockBackend::failing(401, "bad key"));
        let client = client_with(Provider::OpenAi, mock);
        let inv = client.invoke(&LlmRequest::new("gpt-4o", "", "hello")).await;

        assert_eq!(inv.output, "");
        assert_eq!(inv.tokens_input, 0);
        assert_eq!(inv.tokens_output, 0);
        assert_eq!(inv.cost_estimate, 0.0);
        let message = inv.error.expect("error set");
        assert!(message.contains("401"));
        assert!(message.contains("bad key"));
    }

    #[test]
    fn test_from_config_registers_keyed_providers() {
        let config = Config::from_lookup(|key| match key {
            "ANTHROPIC_API_KEY" => Some("sk-ant".to_string()),
            "OPENAI_API_KEY" => Some("  ".to_string()),
            _ => None,
        })
        .unwrap();
        let client = LlmClient::from_config(&config).unwrap();
        assert!(client.has_backend(Provider::Anthropic));
        assert!(!client.has_backend(Provider::OpenAi));
        assert!(!client.is_demo_only());
    }
}
