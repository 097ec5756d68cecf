//! Plan, execute sub-tasks in order, integrate.

use super::PipelineRun;
use crate::error::Result;
use crate::exec_ctx::ExecCtx;
use crate::llm_call::LlmCall;
use crate::operation::{check_model, require_text, BoxFut, Operation};
use crate::output_parser::plan_sub_tasks;
use crate::prompt::char_prefix;
use crate::stage::StageRecord;
use crate::types::{Detail, Outcome};
use serde::{Deserialize, Serialize};

/// Characters of the previous sub-task output passed forward as context.
pub const CONTEXT_CHARS: usize = 500;

/// Request body for `decomposition`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecompositionRequest {
    pub task_description: String,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecompositionReport {
    pub final_output: String,
    /// Planning, one record per sub-task, integration.
    pub stages: Vec<StageRecord>,
    pub sub_task_count: usize,
}

impl Operation for DecompositionRequest {
    fn category(&self) -> &'static str {
        "decomposition"
    }

    fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    fn validate(&self) -> Result<()> {
        require_text("task_description", &self.task_description)?;
        check_model(self.model.as_deref())
    }

    fn execute<'a>(&'a self, ctx: &'a ExecCtx) -> BoxFut<'a, Result<Outcome>> {
        Box::pin(self.run(ctx))
    }
}

impl DecompositionRequest {
    async fn run(&self, ctx: &ExecCtx) -> Result<Outcome> {
        let mut run = PipelineRun::new();
        let model = self.model.as_deref();

        let plan = run
            .call(
                ctx,
                LlmCall::new("decomposition_planner")
                    .var("task", &self.task_description)
                    .with_model(model),
            )
            .await?;
        run.push(StageRecord::from_invocation("Planning", &plan));
        let sub_tasks = plan_sub_tasks(&plan.output, &self.task_description);

        let mut results: Vec<(String, String)> = Vec::with_capacity(sub_tasks.len());
        for task in &sub_tasks {
            let context_block = match results.last() {
                Some((_, previous)) => format!(
                    "\n\nContext from previous steps:\n{}",
                    char_prefix(previous, CONTEXT_CHARS)
                ),
                None => String::new(),
            };
            let step = run
                .call(
                    ctx,
                    LlmCall::new("decomposition_step")
                        .var("instruction", &task.instruction)
                        .var("context_block", context_block)
                        .with_model(model),
                )
                .await?;
            run.push(StageRecord::from_invocation(
                format!("Step {}: {}", task.step, task.title),
                &step,
            ));
            results.push((task.title.clone(), step.output));
        }

        let combined = results
            .iter()
            .enumerate()
            .map(|(i, (title, out))| format!("Sub-task {}: {}\n{}", i + 1, title, out))
            .collect::<Vec<_>>()
            .join("\n\n---\n\n");
        let integrated = run
            .call(
                ctx,
                LlmCall::new("decomposition_integrator")
                    .var("task", &self.task_description)
                    .var("results", combined)
                    .with_model(model),
            )
            .await?;
        run.push(StageRecord::from_invocation("Integration", &integrated));

        let sub_task_count = sub_tasks.len();
        let final_output = integrated.output;
        Ok(run.finish(final_output.clone(), |stages| {
            Detail::Decomposition(DecompositionReport {
                final_output,
                stages,
                sub_task_count,
            })
        }))
    }
}
