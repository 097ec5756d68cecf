use crate::client::Invocation;
use crate::pipeline::{
    AbReport, AgentWorkflowReport, BatchReport, ChallengeReport, ConsistencyReport,
    DecompositionReport, ModelCompareReport, PanelReport, QualityGateReport, RagReport,
    SchemaReport, SelfCorrectReport, TestSuiteReport,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of an execution record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Processing => "processing",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionStatus {
    type Err = crate::PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ExecutionStatus::Pending),
            "processing" => Ok(ExecutionStatus::Processing),
            "completed" => Ok(ExecutionStatus::Completed),
            "failed" => Ok(ExecutionStatus::Failed),
            other => Err(crate::PipelineError::invalid(format!(
                "unknown status '{other}'"
            ))),
        }
    }
}

/// Pipeline-specific part of an [`Outcome`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Detail {
    /// One adapter call; everything is in the common fields.
    Single,
    SelfCorrect(SelfCorrectReport),
    Schema(SchemaReport),
    QualityGate(QualityGateReport),
    Decomposition(DecompositionReport),
    Batch(BatchReport),
    Consistency(ConsistencyReport),
    ModelCompare(ModelCompareReport),
    AbCompare(AbReport),
    ExpertPanel(PanelReport),
    Rag(RagReport),
    Challenge(ChallengeReport),
    TestSuite(TestSuiteReport),
    AgentWorkflow(AgentWorkflowReport),
}

/// The result of running one operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    /// Headline text: the final answer or, for fan-out runs, the report JSON.
    pub output: String,
    pub tokens_input: u64,
    pub tokens_output: u64,
    pub cost_estimate: f64,
    pub latency_ms: u64,
    pub model: String,
    /// First provider failure seen during the run.
    pub error: Option<String>,
    /// `true` if any call was answered in demo mode.
    pub demo: bool,
    pub detail: Detail,
}

impl Outcome {
    /// Outcome of a single adapter call.
    pub fn from_invocation(inv: Invocation) -> Self {
        Self {
            demo: inv.is_demo(),
            output: inv.output,
            tokens_input: inv.tokens_input,
            tokens_output: inv.tokens_output,
            cost_estimate: inv.cost_estimate,
            latency_ms: inv.latency_ms,
            model: inv.model,
            error: inv.error,
            detail: Detail::Single,
        }
    }

    /// `Failed` iff a provider error was recorded.
    pub fn status(&self) -> ExecutionStatus {
        if self.error.is_some() {
            ExecutionStatus::Failed
        } else {
            ExecutionStatus::Completed
        }
    }

    /// Number of stages in the detail report, 1 for a single call.
    pub fn stage_count(&self) -> usize {
        match &self.detail {
            Detail::Single => 1,
            Detail::SelfCorrect(r) => r.rounds.len(),
            Detail::Schema(r) => r.attempts.len(),
            Detail::QualityGate(r) => r.stages.len(),
            Detail::Decomposition(r) => r.stages.len(),
            Detail::Batch(r) => r.results.len(),
            Detail::Consistency(r) => r.runs.len() + 1,
            Detail::ModelCompare(r) => r.model_results.len(),
            Detail::AbCompare(_) => 3,
            Detail::ExpertPanel(r) => r.expert_responses.len() + 1,
            Detail::Rag(_) => 3,
            Detail::Challenge(_) => 2,
            Detail::TestSuite(r) => r.call_count(),
            Detail::AgentWorkflow(r) => r.results.len(),
        }
    }
}
