//! Generate, check, and revise only when the check fails.

use super::PipelineRun;
use crate::error::Result;
use crate::exec_ctx::ExecCtx;
use crate::llm_call::LlmCall;
use crate::operation::{check_model, require_text, BoxFut, Operation};
use crate::output_parser::safety_passed;
use crate::stage::StageRecord;
use crate::types::{Detail, Outcome};
use serde::{Deserialize, Serialize};

const GENERATOR: &str = "Generator";
const SAFETY_CHECK: &str = "Safety & Quality Check";
const REVISER: &str = "Reviser";
const FINAL_VALIDATION: &str = "Final Validation";

/// Request body for `quality_pipeline`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityGateRequest {
    pub task_prompt: String,
    pub input_text: String,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityGateReport {
    pub final_content: String,
    /// Always four records; the last two are skipped when the check passes.
    pub stages: Vec<StageRecord>,
    /// Verdict of the first check.
    pub all_passed: bool,
}

impl Operation for QualityGateRequest {
    fn category(&self) -> &'static str {
        "quality_pipeline"
    }

    fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    fn validate(&self) -> Result<()> {
        require_text("task_prompt", &self.task_prompt)?;
        require_text("input_text", &self.input_text)?;
        check_model(self.model.as_deref())
    }

    fn execute<'a>(&'a self, ctx: &'a ExecCtx) -> BoxFut<'a, Result<Outcome>> {
        Box::pin(self.run(ctx))
    }
}

impl QualityGateRequest {
    fn safety_call(&self, content: &str) -> LlmCall {
        LlmCall::new("quality_gate_safety")
            .var("content", content)
            .var("task", &self.task_prompt)
            .with_model(self.model.as_deref())
    }

    async fn run(&self, ctx: &ExecCtx) -> Result<Outcome> {
        let mut run = PipelineRun::new();
        let model = self.model.as_deref();

        let generated = run
            .call(
                ctx,
                LlmCall::new("quality_gate_generate")
                    .var("system_prompt", &self.task_prompt)
                    .var("user_prompt", &self.input_text)
                    .with_model(model),
            )
            .await?;
        run.push(StageRecord::from_invocation(GENERATOR, &generated));
        let mut content = generated.output;

        let check = run.call(ctx, self.safety_call(&content)).await?;
        let passed = safety_passed(&check.output);
        run.push(StageRecord::from_invocation(SAFETY_CHECK, &check).with_verdict(passed));

        if passed {
            run.push(StageRecord::skipped(REVISER, "Not needed - all checks passed"));
            run.push(StageRecord::skipped(FINAL_VALIDATION, "Not needed"));
        } else {
            let revised = run
                .call(
                    ctx,
                    LlmCall::new("quality_gate_reviser")
                        .var("issues", &check.output)
                        .var("content", &content)
                        .with_model(model),
                )
                .await?;
            run.push(StageRecord::from_invocation(REVISER, &revised));
            content = revised.output;

            let recheck = run.call(ctx, self.safety_call(&content)).await?;
            run.push(StageRecord::from_invocation(FINAL_VALIDATION, &recheck));
        }

        let output = content.clone();
        Ok(run.finish(output, |stages| {
            Detail::QualityGate(QualityGateReport {
                final_content: content,
                stages,
                all_passed: passed,
            })
        }))
    }
}
