//! Run two prompts on one input, then ask a judge to pick.

use super::PipelineRun;
use crate::error::Result;
use crate::exec_ctx::ExecCtx;
use crate::llm_call::LlmCall;
use crate::operation::{check_model, require_text, BoxFut, Operation};
use crate::types::{Detail, Outcome};
use serde::{Deserialize, Serialize};

/// Request body for `prompt_compare`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbCompareRequest {
    pub prompt_a: String,
    pub prompt_b: String,
    pub test_input: String,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AbReport {
    pub output_a: String,
    pub output_b: String,
    /// Raw judge reply.
    pub judgement: String,
}

impl Operation for AbCompareRequest {
    fn category(&self) -> &'static str {
        "prompt_compare"
    }

    fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    fn validate(&self) -> Result<()> {
        require_text("prompt_a", &self.prompt_a)?;
        require_text("prompt_b", &self.prompt_b)?;
        require_text("test_input", &self.test_input)?;
        check_model(self.model.as_deref())
    }

    fn execute<'a>(&'a self, ctx: &'a ExecCtx) -> BoxFut<'a, Result<Outcome>> {
        Box::pin(self.run(ctx))
    }
}

impl AbCompareRequest {
    fn side(&self, prompt: &str) -> LlmCall {
        LlmCall::new("ab_run")
            .var("system_prompt", prompt)
            .var("user_prompt", &self.test_input)
            .with_model(self.model.as_deref())
    }

    async fn run(&self, ctx: &ExecCtx) -> Result<Outcome> {
        let mut run = PipelineRun::new();

        let a = run.call(ctx, self.side(&self.prompt_a)).await?;
        let b = run.call(ctx, self.side(&self.prompt_b)).await?;
        let judge = run
            .call(
                ctx,
                LlmCall::new("ab_judge")
                    .var("input", &self.test_input)
                    .var("output_a", &a.output)
                    .var("output_b", &b.output)
                    .with_model(self.model.as_deref()),
            )
            .await?;

        let report = AbReport {
            output_a: a.output,
            output_b: b.output,
            judgement: judge.output.clone(),
        };
        Ok(run.finish(judge.output, |_| Detail::AbCompare(report)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::run;
    use crate::testing::mock_ctx;

    fn request() -> AbCompareRequest {
        AbCompareRequest {
            prompt_a: "Answer formally.".to_string(),
            prompt_b: "Answer casually.".to_string(),
            test_input: "How do I reset my password?".to_string(),
            model: None,
        }
    }

    #[tokio::test]
    async fn test_two_runs_then_judge() {
        let verdict = r#"{"winner": "B", "scores": {"A": 6, "B": 8}}"#;
        let (ctx, mock) = mock_ctx(&["Dear user, ...", "Hey! Just click ...", verdict]);
        let outcome = run(&request(), &ctx).await.unwrap();
        let Detail::AbCompare(ref report) = outcome.detail else {
            panic!("expected ab detail");
        };

        assert_eq!(mock.calls(), 3);
        assert_eq!(report.output_a, "Dear user, ...");
        assert_eq!(report.output_b, "Hey! Just click ...");
        assert_eq!(outcome.output, verdict);
        assert_eq!(outcome.stage_count(), 3);

        let sent = mock.requests();
        assert_eq!(sent[0].system_prompt, "Answer formally.");
        assert_eq!(sent[1].system_prompt, "Answer casually.");
        assert_eq!(sent[1].prompt, "How do I reset my password?");
        assert_eq!(
            sent[2].prompt,
            "Task input:\nHow do I reset my password?\n\n--- Output A ---\nDear user, ...\n\n\
             --- Output B ---\nHey! Just click ..."
        );
    }

    #[test]
    fn test_requires_both_prompts() {
        let mut req = request();
        req.prompt_b = " ".to_string();
        assert!(req.validate().is_err());
    }
}
