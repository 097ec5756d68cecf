//! Multi-call pipelines.
//!
//! Each pipeline is a short, fixed sequence of awaited adapter calls with
//! simple branching on parsed verdicts. [`PipelineRun`] holds the run's
//! ephemeral state: ordered stage records and summed metrics.
//!
//! | Category | Request | Shape |
//! |----------|---------|-------|
//! | `self_correcting` | [`SelfCorrectRequest`] | generate, then critique/revise rounds |
//! | `schema_enforcer` | [`SchemaRequest`] | validate, retry with the error |
//! | `quality_pipeline` | [`QualityGateRequest`] | generate, check, revise + re-check if needed |
//! | `decomposition` | [`DecompositionRequest`] | plan, sub-tasks, integrate |
//! | `batch_eval` | [`BatchRequest`] | one call per input |
//! | `consistency_check` | [`ConsistencyRequest`] | N runs, then analysis |
//! | `model_compare` | [`ModelCompareRequest`] | one call per model |
//! | `prompt_compare` | [`AbCompareRequest`] | A, B, judge |
//! | `expert_panel` | [`ExpertPanelRequest`] | one call per persona, then moderator |
//! | `rag_simulator` | [`RagRequest`] | rank, answer with and without context |
//! | `challenge` | [`ChallengeRequest`] | run, evaluate |
//! | `test_suite` | [`TestSuiteRequest`] | run + evaluate per case |
//! | `multi_agent` | [`AgentWorkflowRequest`] | router, primary, reviewer |

mod agents;
mod challenge;
mod compare;
mod decompose;
mod fanout;
mod panel;
mod quality_gate;
mod rag;
mod schema;
mod self_correct;
mod test_suite;

pub use agents::{AgentWorkflowReport, AgentWorkflowRequest};
pub use challenge::{ChallengeReport, ChallengeRequest};
pub use compare::{AbCompareRequest, AbReport};
pub use decompose::{DecompositionReport, DecompositionRequest};
pub use fanout::{
    BatchItem, BatchReport, BatchRequest, BatchSummary, ConsistencyReport, ConsistencyRequest,
    ConsistencyRun, ModelCompareReport, ModelCompareRequest, ModelResult,
};
pub use panel::{persona, ExpertPanelRequest, ExpertResponse, PanelReport, PERSONAS};
pub use quality_gate::{QualityGateReport, QualityGateRequest};
pub use rag::{RagReport, RagRequest, SelectedChunk};
pub use schema::{SchemaAttempt, SchemaReport, SchemaRequest};
pub use self_correct::{SelfCorrectReport, SelfCorrectRequest};
pub use test_suite::{TestCaseResult, TestCaseSpec, TestSuiteReport, TestSuiteRequest, TestSuiteSummary};

use crate::client::Invocation;
use crate::error::Result;
use crate::exec_ctx::ExecCtx;
use crate::llm_call::LlmCall;
use crate::pricing::round6;
use crate::stage::StageRecord;
use crate::types::{Detail, Outcome};
use tracing::debug;

/// Ephemeral state of one pipeline run.
///
/// Every invocation routed through [`call`](Self::call) is added to the
/// totals. The first provider error is kept, and any demo answer marks the
/// whole run as demo.
#[derive(Debug, Default)]
pub struct PipelineRun {
    stages: Vec<StageRecord>,
    tokens_input: u64,
    tokens_output: u64,
    cost: f64,
    latency_ms: u64,
    model: Option<String>,
    error: Option<String>,
    demo: bool,
}

impl PipelineRun {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invoke `call` and add its metrics.
    pub async fn call(&mut self, ctx: &ExecCtx, call: LlmCall) -> Result<Invocation> {
        let inv = call.invoke(ctx).await?;
        self.absorb(&inv);
        Ok(inv)
    }

    /// Add one invocation's metrics.
    pub fn absorb(&mut self, inv: &Invocation) {
        self.tokens_input += inv.tokens_input;
        self.tokens_output += inv.tokens_output;
        self.cost += inv.cost_estimate;
        self.latency_ms += inv.latency_ms;
        self.demo |= inv.is_demo();
        if self.model.is_none() {
            self.model = Some(inv.model.clone());
        }
        if self.error.is_none() {
            self.error = inv.error.clone();
        }
    }

    /// Append a stage record.
    pub fn push(&mut self, stage: StageRecord) {
        debug!(
            stage = %stage.label,
            round = stage.round,
            status = ?stage.status,
            output_chars = stage.output.chars().count(),
            "stage finished"
        );
        self.stages.push(stage);
    }

    pub fn stages(&self) -> &[StageRecord] {
        &self.stages
    }

    /// Report this label as the outcome's model instead of the first call's.
    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = Some(model.into());
    }

    pub fn tokens_input(&self) -> u64 {
        self.tokens_input
    }

    pub fn tokens_output(&self) -> u64 {
        self.tokens_output
    }

    pub fn cost(&self) -> f64 {
        round6(self.cost)
    }

    pub fn latency_ms(&self) -> u64 {
        self.latency_ms
    }

    /// Fold into an [`Outcome`]. `detail` receives the stage records.
    pub fn finish(
        self,
        output: impl Into<String>,
        detail: impl FnOnce(Vec<StageRecord>) -> Detail,
    ) -> Outcome {
        Outcome {
            output: output.into(),
            tokens_input: self.tokens_input,
            tokens_output: self.tokens_output,
            cost_estimate: round6(self.cost),
            latency_ms: self.latency_ms,
            model: self.model.unwrap_or_default(),
            error: self.error,
            demo: self.demo,
            detail: detail(self.stages),
        }
    }
}

/// `prompt + "\n\nInput: " + input`, or just the prompt when input is empty.
pub(crate) fn with_input(prompt: &str, input: &str) -> String {
    if input.is_empty() {
        prompt.to_string()
    } else {
        format!("{prompt}\n\nInput: {input}")
    }
}
