//! Run a user's prompt against a challenge, then grade the output.

use super::PipelineRun;
use crate::error::Result;
use crate::exec_ctx::ExecCtx;
use crate::llm_call::LlmCall;
use crate::operation::{check_model, require_text, BoxFut, Operation};
use crate::output_parser::Evaluation;
use crate::types::{Detail, Outcome};
use serde::{Deserialize, Serialize};

/// User turn sent when the challenge has no test input.
pub const DEFAULT_CHALLENGE_INPUT: &str = "Execute this prompt.";

/// Request body for `challenge`. The challenge definition travels inline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeRequest {
    pub title: String,
    pub criteria: String,
    #[serde(default)]
    pub expected_behavior: String,
    #[serde(default)]
    pub test_input: String,
    /// The user's attempt, run as the system prompt.
    pub prompt_text: String,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChallengeReport {
    pub output: String,
    pub evaluation: Evaluation,
    pub raw_evaluation: String,
}

impl Operation for ChallengeRequest {
    fn category(&self) -> &'static str {
        "challenge"
    }

    fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    fn validate(&self) -> Result<()> {
        require_text("title", &self.title)?;
        require_text("criteria", &self.criteria)?;
        require_text("prompt_text", &self.prompt_text)?;
        check_model(self.model.as_deref())
    }

    fn execute<'a>(&'a self, ctx: &'a ExecCtx) -> BoxFut<'a, Result<Outcome>> {
        Box::pin(self.run(ctx))
    }
}

impl ChallengeRequest {
    async fn run(&self, ctx: &ExecCtx) -> Result<Outcome> {
        let mut run = PipelineRun::new();
        let model = self.model.as_deref();
        let user = if self.test_input.is_empty() {
            DEFAULT_CHALLENGE_INPUT
        } else {
            self.test_input.as_str()
        };

        let attempt = run
            .call(
                ctx,
                LlmCall::new("challenge_run")
                    .var("system_prompt", &self.prompt_text)
                    .var("user_prompt", user)
                    .with_model(model),
            )
            .await?;
        let graded = run
            .call(
                ctx,
                LlmCall::new("challenge_evaluator")
                    .var("title", &self.title)
                    .var("criteria", &self.criteria)
                    .var("expected_behavior", &self.expected_behavior)
                    .var("test_input", &self.test_input)
                    .var("prompt_text", &self.prompt_text)
                    .var("output", &attempt.output)
                    .with_model(model),
            )
            .await?;

        let report = ChallengeReport {
            output: attempt.output.clone(),
            evaluation: Evaluation::read(&graded.output),
            raw_evaluation: graded.output,
        };
        Ok(run.finish(attempt.output, |_| Detail::Challenge(report)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::run;
    use crate::output_parser::readers::FALLBACK_SCORE;
    use crate::testing::mock_ctx;

    fn request() -> ChallengeRequest {
        ChallengeRequest {
            title: "Haiku bot".to_string(),
            criteria: "Replies in 5-7-5".to_string(),
            expected_behavior: "Always a haiku".to_string(),
            test_input: String::new(),
            prompt_text: "Reply only in haiku.".to_string(),
            model: None,
        }
    }

    #[tokio::test]
    async fn test_run_then_evaluate() {
        let (ctx, mock) = mock_ctx(&[
            "Old pond, frog jumps in",
            r#"{"score": 85, "passed": true, "feedback": "Nice", "criteria_met": ["form"]}"#,
        ]);
        let outcome = run(&request(), &ctx).await.unwrap();
        let Detail::Challenge(ref report) = outcome.detail else {
            panic!("expected challenge detail");
        };

        assert_eq!(mock.calls(), 2);
        assert_eq!(outcome.output, "Old pond, frog jumps in");
        assert_eq!(report.evaluation.score, 85);
        assert!(report.evaluation.passed);
        assert_eq!(report.evaluation.criteria_met, vec!["form"]);

        let sent = mock.requests();
        assert_eq!(sent[0].system_prompt, "Reply only in haiku.");
        assert_eq!(sent[0].prompt, DEFAULT_CHALLENGE_INPUT);
        assert!(sent[1].prompt.contains("Actual output:\n---\nOld pond, frog jumps in\n---"));
    }

    #[tokio::test]
    async fn test_unreadable_evaluation_falls_back() {
        let (ctx, _) = mock_ctx(&["output", "It was fine I guess"]);
        let outcome = run(&request(), &ctx).await.unwrap();
        let Detail::Challenge(report) = outcome.detail else {
            panic!("expected challenge detail");
        };
        assert_eq!(report.evaluation.score, FALLBACK_SCORE);
        assert!(!report.evaluation.parsed);
        assert_eq!(report.raw_evaluation, "It was fine I guess");
    }
}
