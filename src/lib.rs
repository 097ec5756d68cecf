//! # Prompt Engine
//!
//! Templated LLM calls and short multi-step pipelines behind a REST API,
//! with lenient JSON recovery and execution history.
//!
//! Each endpoint runs an [`Operation`]: either one templated call or a
//! fixed sequence of awaited calls with simple branching (critique then
//! revise, plan then execute, rank then answer, validate then retry).
//!
//! ## Core Concepts
//!
//! - **[`LlmClient`]** routes a request to the OpenAI or Anthropic backend.
//!   With no credential it answers in demo mode, and provider failures are
//!   captured in the returned [`Invocation`] instead of aborting the run.
//! - **[`ExecCtx`]**: the client, the immutable [`TemplateRegistry`] and
//!   the default model, shared by every request.
//! - **[`LlmCall`]**: template key + variables + overrides, rendered and sent.
//! - **[`Operation`]**: object-safe trait every request type implements.
//!   Single-call features implement [`SingleCall`] instead.
//! - **[`Outcome`]**: summed metrics plus a typed [`Detail`] per pipeline.
//! - **[`recorder`]**: write-once execution records in SQLite.
//! - **[`server`]**: the axum router.
//!
//! ## Quick Start
//!
//! ```
//! use prompt_engine::operation::run;
//! use prompt_engine::pipeline::SelfCorrectRequest;
//! use prompt_engine::{Detail, ExecCtx};
//!
//! #[tokio::main]
//! async fn main() -> prompt_engine::Result<()> {
//!     // No backends: every call is answered in demo mode.
//!     let ctx = ExecCtx::builder().build()?;
//!
//!     let request = SelfCorrectRequest::new("Write a slogan", "a coffee shop");
//!     let outcome = run(&request, &ctx).await?;
//!
//!     assert!(outcome.demo);
//!     assert_eq!(outcome.cost_estimate, 0.0);
//!     if let Detail::SelfCorrect(report) = &outcome.detail {
//!         // demo critiques never pass, so every round runs
//!         assert_eq!(report.total_rounds, 3);
//!     }
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod client;
pub mod config;
pub mod error;
pub mod exec_ctx;
pub mod features;
pub mod llm_call;
pub mod operation;
pub mod output_parser;
pub mod pipeline;
pub mod pricing;
pub mod prompt;
pub mod recorder;
pub mod retry;
pub mod server;
pub mod stage;
pub mod templates;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{AnthropicBackend, MockBackend, OpenAiBackend, Provider};
pub use client::{Invocation, LlmClient, LlmConfig, ResponseSource};
pub use config::Config;
pub use error::{PipelineError, Result};
pub use exec_ctx::{ExecCtx, ExecCtxBuilder};
pub use llm_call::LlmCall;
pub use operation::{BoxFut, Operation, SingleCall};
pub use pipeline::PipelineRun;
pub use recorder::{ExecutionRecorder, SqliteRecorder};
pub use retry::RetryConfig;
pub use stage::{StageRecord, StageStatus};
pub use templates::{PromptTemplate, TemplateRegistry};
pub use types::{Detail, ExecutionStatus, Outcome};
