//! Mock backend for testing without a live LLM.
//!
//! [`MockBackend`] returns pre-configured responses in order, allowing
//! deterministic tests of every pipeline.
//!
//! # Example
//!
//! ```
//! use prompt_engine::backend::MockBackend;
//!
//! let mock = MockBackend::new(vec!["Hello, world!".to_string()]);
//! assert_eq!(mock.calls(), 0);
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::Client;

use super::{Backend, LlmRequest, LlmResponse};
use crate::error::Result;
use crate::PipelineError;

/// A test backend that returns canned responses in order.
///
/// Cycles back to the beginning when all responses have been consumed.
/// Every request is kept so tests can assert on the rendered prompts.
#[derive(Debug)]
pub struct MockBackend {
    responses: Vec<String>,
    index: AtomicUsize,
    requests: Mutex<Vec<LlmRequest>>,
    failure: Option<(u16, String)>,
    failing_calls: Vec<usize>,
}

impl MockBackend {
    /// Create a mock backend with the given canned responses.
    ///
    /// An empty list behaves like a single empty response.
    pub fn new(responses: Vec<String>) -> Self {
        let responses = if responses.is_empty() {
            vec![String::new()]
        } else {
            responses
        };
        Self {
            responses,
            index: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            failure: None,
            failing_calls: Vec::new(),
        }
    }

    /// Create a mock that always returns the same response.
    pub fn fixed(response: impl Into<String>) -> Self {
        Self::new(vec![response.into()])
    }

    /// Create a mock whose every call fails with the given HTTP status.
    pub fn failing(status: u16, body: impl Into<String>) -> Self {
        let mut mock = Self::new(Vec::new());
        mock.failure = Some((status, body.into()));
        mock
    }

    /// Make the given calls (1-based) fail with HTTP 500. Other calls
    /// still answer from the canned list.
    pub fn failing_on(mut self, calls: &[usize]) -> Self {
        self.failing_calls = calls.to_vec();
        self
    }

    /// Number of completions requested so far.
    pub fn calls(&self) -> usize {
        self.index.load(Ordering::Relaxed)
    }

    /// Snapshot of every request received, in order.
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Next canned response with its 1-based call number.
    fn next_response(&self) -> (usize, String) {
        let call = self.index.fetch_add(1, Ordering::Relaxed);
        (call + 1, self.responses[call % self.responses.len()].clone())
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn complete(&self, _client: &Client, request: &LlmRequest) -> Result<LlmResponse> {
        if let Ok(mut seen) = self.requests.lock() {
            seen.push(request.clone());
        }
        let (call, text) = self.next_response();
        if let Some((status, ref body)) = self.failure {
            return Err(PipelineError::HttpError {
                status,
                body: body.clone(),
            });
        }
        if self.failing_calls.contains(&call) {
            return Err(PipelineError::HttpError {
                status: 500,
                body: format!("call {call} failed"),
            });
        }
        Ok(LlmResponse {
            text,
            status: 200,
            usage: None,
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
