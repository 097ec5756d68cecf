//! Three-agent workflow: a router reads the task, the primary agent does
//! the work under the category's system prompt, a reviewer grades it.

use super::PipelineRun;
use crate::error::Result;
use crate::exec_ctx::ExecCtx;
use crate::llm_call::LlmCall;
use crate::operation::{check_model, require_text, BoxFut, Operation};
use crate::prompt::{char_prefix, render, PromptVars};
use crate::stage::StageRecord;
use crate::types::{Detail, Outcome};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Characters of the input shown to the router agent.
pub const ROUTER_PREVIEW_CHARS: usize = 500;

/// Primary agent persona for categories without a fixed system prompt.
pub const GENERIC_AGENT_PROMPT: &str = "You are a helpful AI assistant.";

/// Request body for `multi_agent`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentWorkflowRequest {
    pub task: String,
    /// Feature category whose system prompt the primary agent adopts.
    pub category: String,
    pub input_data: String,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentWorkflowReport {
    pub workflow_id: Uuid,
    /// One stage per agent, labelled `router`, `primary`, `reviewer`.
    pub results: Vec<StageRecord>,
    pub total_agents: usize,
}

impl AgentWorkflowRequest {
    /// System prompt of the category's template, or the generic persona.
    /// Templates that pass the caller's system text through have no persona
    /// of their own.
    fn primary_system(&self, ctx: &ExecCtx) -> String {
        match ctx.templates.get(&self.category) {
            Ok(t) if !t.system.contains("{system_prompt}") => render(&t.system, &PromptVars::new()),
            _ => GENERIC_AGENT_PROMPT.to_string(),
        }
    }
}

impl Operation for AgentWorkflowRequest {
    fn category(&self) -> &'static str {
        "multi_agent"
    }

    fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    fn validate(&self) -> Result<()> {
        require_text("task", &self.task)?;
        require_text("category", &self.category)?;
        require_text("input_data", &self.input_data)?;
        check_model(self.model.as_deref())
    }

    fn execute<'a>(&'a self, ctx: &'a ExecCtx) -> BoxFut<'a, Result<Outcome>> {
        Box::pin(self.run(ctx))
    }
}

impl AgentWorkflowRequest {
    async fn run(&self, ctx: &ExecCtx) -> Result<Outcome> {
        let mut run = PipelineRun::new();
        let model = self.model.as_deref();
        let workflow_id = Uuid::new_v4();

        let routing = run
            .call(
                ctx,
                LlmCall::new("agent_router")
                    .var("task", &self.task)
                    .var("category", &self.category)
                    .var("preview", char_prefix(&self.input_data, ROUTER_PREVIEW_CHARS))
                    .with_model(model),
            )
            .await?;
        run.push(StageRecord::from_invocation("router", &routing));

        let primary = run
            .call(
                ctx,
                LlmCall::new("agent_primary")
                    .var("system_prompt", self.primary_system(ctx))
                    .var("user_prompt", &self.input_data)
                    .with_model(model),
            )
            .await?;
        run.push(StageRecord::from_invocation("primary", &primary));

        let review = run
            .call(
                ctx,
                LlmCall::new("agent_reviewer")
                    .var("task", &self.task)
                    .var("output", &primary.output)
                    .with_model(model),
            )
            .await?;
        run.push(StageRecord::from_invocation("reviewer", &review));

        Ok(run.finish(primary.output, |results| {
            Detail::AgentWorkflow(AgentWorkflowReport {
                workflow_id,
                total_agents: results.len(),
                results,
            })
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::run;
    use crate::testing::{failing_ctx, mock_ctx};

    fn request(category: &str, input: &str) -> AgentWorkflowRequest {
        AgentWorkflowRequest {
            task: "Summarise the call".to_string(),
            category: category.to_string(),
            input_data: input.to_string(),
            model: None,
        }
    }

    fn report(outcome: &Outcome) -> &AgentWorkflowReport {
        match &outcome.detail {
            Detail::AgentWorkflow(r) => r,
            other => panic!("unexpected detail {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_router_primary_reviewer_in_order() {
        let (ctx, mock) = mock_ctx(&[
            r#"{"analysis": "summary job", "recommended_agents": ["summarizer"]}"#,
            "## Decisions\n- ship friday",
            r#"{"quality_score": 8, "summary": "solid"}"#,
        ]);
        let outcome = run(&request("meeting_summarizer", "Alice: ship friday"), &ctx)
            .await
            .unwrap();
        let report = report(&outcome);

        assert_eq!(mock.calls(), 3);
        assert_eq!(report.total_agents, 3);
        let labels: Vec<&str> = report.results.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, ["router", "primary", "reviewer"]);
        assert_eq!(outcome.output, "## Decisions\n- ship friday");
        assert_eq!(outcome.stage_count(), 3);

        let sent = mock.requests();
        assert_eq!(
            sent[0].prompt,
            "Task: Summarise the call\nCategory: meeting_summarizer\nInput preview: Alice: ship friday"
        );
        let summarizer = ctx.templates.get("meeting_summarizer").unwrap();
        assert_eq!(sent[1].system_prompt, summarizer.system);
        assert_eq!(sent[1].prompt, "Alice: ship friday");
        assert_eq!(
            sent[2].prompt,
            "Original task: Summarise the call\n\nGenerated output:\n## Decisions\n- ship friday"
        );
    }

    #[tokio::test]
    async fn test_router_sees_only_a_preview() {
        let (ctx, mock) = mock_ctx(&["ok"]);
        let long = "x".repeat(ROUTER_PREVIEW_CHARS + 100);
        run(&request("custom", &long), &ctx).await.unwrap();
        let sent = mock.requests();
        assert!(sent[0].prompt.ends_with(&"x".repeat(ROUTER_PREVIEW_CHARS)));
        assert!(!sent[0].prompt.contains(&"x".repeat(ROUTER_PREVIEW_CHARS + 1)));
        assert_eq!(sent[1].prompt, long);
    }

    #[tokio::test]
    async fn test_unknown_or_passthrough_category_uses_generic_agent() {
        let (ctx, mock) = mock_ctx(&["ok"]);
        run(&request("poetry", "roses"), &ctx).await.unwrap();
        run(&request("custom", "roses"), &ctx).await.unwrap();
        let sent = mock.requests();
        assert_eq!(sent[1].system_prompt, GENERIC_AGENT_PROMPT);
        assert_eq!(sent[4].system_prompt, GENERIC_AGENT_PROMPT);
    }

    #[tokio::test]
    async fn test_failed_agents_still_reported() {
        let (ctx, mock) = failing_ctx();
        let outcome = run(&request("custom", "in"), &ctx).await.unwrap();
        assert_eq!(mock.calls(), 3);
        assert!(outcome.error.is_some());
        assert!(report(&outcome).results.iter().all(|s| s.error.is_some()));
    }

    #[test]
    fn test_validation() {
        assert!(request("custom", " ").validate().is_err());
        assert!(request("", "in").validate().is_err());
        assert!(request("custom", "in").validate().is_ok());
    }
}
