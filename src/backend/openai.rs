//! Backend for OpenAI-compatible chat completion APIs.
//!
//! Endpoint: `{base_url}/v1/chat/completions`, non-streaming. Usage comes
//! from `usage.prompt_tokens` / `usage.completion_tokens` when present.

use super::{normalize_base_url, read_usage, Backend, LlmRequest, LlmResponse};
use crate::error::Result;
use crate::PipelineError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

/// Default public endpoint.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Backend for any OpenAI-compatible API.
///
/// # Example
///
/// ```
/// use prompt_engine::backend::OpenAiBackend;
///
/// let backend = OpenAiBackend::new("sk-...");
/// let local = OpenAiBackend::new("unused").with_base_url("http://localhost:8080/v1");
/// assert_eq!(local.base_url(), "http://localhost:8080");
/// # let _ = backend;
/// ```
#[derive(Clone)]
pub struct OpenAiBackend {
    api_key: String,
    base_url: String,
    organization: Option<String>,
}

impl std::fmt::Debug for OpenAiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiBackend")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("organization", &self.organization)
            .finish()
    }
}

/// Keep a short prefix of a credential for identification.
pub(crate) fn redact(key: &str) -> String {
    match key.get(..6) {
        Some(prefix) if key.len() > 6 => format!("{prefix}***"),
        _ => "***".to_string(),
    }
}

impl OpenAiBackend {
    /// Create a backend against the public OpenAI endpoint.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: OPENAI_BASE_URL.to_string(),
            organization: None,
        }
    }

    /// Point the backend at another OpenAI-compatible server.
    pub fn with_base_url(mut self, url: impl AsRef<str>) -> Self {
        self.base_url = normalize_base_url(url.as_ref());
        self
    }

    /// Set the organization ID header.
    pub fn with_organization(mut self, org: impl Into<String>) -> Self {
        self.organization = Some(org.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_body(request: &LlmRequest) -> Value {
        let mut messages = Vec::with_capacity(2);
        if !request.system_prompt.is_empty() {
            messages.push(json!({"role": "system", "content": request.system_prompt}));
        }
        messages.push(json!({"role": "user", "content": request.prompt}));

        json!({
            "model": request.model,
            "messages": messages,
            "temperature": request.config.temperature,
            "max_tokens": request.config.max_tokens,
        })
    }

    fn build_http_request(&self, client: &Client, url: &str, body: &Value) -> reqwest::RequestBuilder {
        let mut req = client
            .post(url)
            .json(body)
            .header("Authorization", format!("Bearer {}", self.api_key));
        if let Some(ref org) = self.organization {
            req = req.header("OpenAI-Organization", org.as_str());
        }
        req
    }
}

#[async_trait]
impl Backend for OpenAiBackend {
    async fn complete(&self, client: &Client, request: &LlmRequest) -> Result<LlmResponse> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = Self::build_body(request);

        let resp = self
            .build_http_request(client, &url, &body)
            .send()
            .await
            .map_err(|e| PipelineError::Other(format!("Failed to connect to LLM at {}: {}", url, e)))?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(PipelineError::HttpError { status, body: text });
        }

        let json_resp: Value = resp.json().await?;
        let text = json_resp
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();

        Ok(LlmResponse {
            text,
            status,
            usage: read_usage(&json_resp, "prompt_tokens", "completion_tokens"),
        })
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::LlmConfig;

    fn test_request() -> LlmRequest {
        LlmRequest::new("gpt-4o", "", "Why is the sky blue?")
    }

    #[test]
    fn test_chat_payload() {
        let mut request = test_request();
        request.system_prompt = "You are a helpful assistant.".into();
        request.config = LlmConfig::default().with_temperature(0.1).with_max_tokens(512);

        let body = OpenAiBackend::build_body(&request);

        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["temperature"], 0.1);
        assert_eq!(body["max_tokens"], 512);
        let messages = body["messages"].as_array().expect("messages");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(messages[1]["content"], "Why is the sky blue?");
    }

    #[test]
    fn test_empty_system_prompt_is_omitted() {
        let body = OpenAiBackend::build_body(&test_request());
        let messages = body["messages"].as_array().expect("messages");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
    }

    #[test]
    fn test_auth_headers() {
        let backend = OpenAiBackend::new("sk-test123").with_organization("org-abc");
        let req = backend
            .build_http_request(&Client::new(), "https://api.openai.com/v1/chat/completions", &json!({}))
            .build()
            .expect("build request");

        assert_eq!(req.headers().get("Authorization").expect("auth"), "Bearer sk-test123");
        assert_eq!(req.headers().get("OpenAI-Organization").expect("org"), "org-abc");
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let backend = OpenAiBackend::new("sk-1234567890abcdef");
        let debug_output = format!("{:?}", backend);
        assert!(!debug_output.contains("1234567890abcdef"));
        assert!(debug_output.contains("sk-123***"));
    }

    #[test]
    fn test_redact_short_key() {
        assert_eq!(redact("abc"), "***");
    }
}
