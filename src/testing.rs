//! Shared fixtures for unit tests.

use crate::backend::{MockBackend, Provider};
use crate::client::LlmClient;
use crate::exec_ctx::ExecCtx;
use std::sync::Arc;

/// Context whose OpenAI and Anthropic traffic both go to one cycling mock.
pub(crate) fn mock_ctx(responses: &[&str]) -> (ExecCtx, Arc<MockBackend>) {
    let mock = Arc::new(MockBackend::new(
        responses.iter().map(|r| r.to_string()).collect(),
    ));
    ctx_with(mock)
}

/// Context whose every call fails with HTTP 500.
pub(crate) fn failing_ctx() -> (ExecCtx, Arc<MockBackend>) {
    ctx_with(Arc::new(MockBackend::failing(500, "upstream exploded")))
}

/// Like [`mock_ctx`], but the listed calls (1-based) fail with HTTP 500.
pub(crate) fn flaky_ctx(responses: &[&str], failing: &[usize]) -> (ExecCtx, Arc<MockBackend>) {
    let mock = MockBackend::new(responses.iter().map(|r| r.to_string()).collect()).failing_on(failing);
    ctx_with(Arc::new(mock))
}

fn ctx_with(mock: Arc<MockBackend>) -> (ExecCtx, Arc<MockBackend>) {
    let client = LlmClient::builder()
        .backend(Provider::OpenAi, mock.clone())
        .backend(Provider::Anthropic, mock.clone())
        .build()
        .expect("client");
    let ctx = ExecCtx::builder()
        .client(Arc::new(client))
        .build()
        .expect("ctx");
    (ctx, mock)
}

/// Context with no backends, so every call is a demo response.
pub(crate) fn demo_ctx() -> ExecCtx {
    ExecCtx::builder().build().expect("ctx")
}
