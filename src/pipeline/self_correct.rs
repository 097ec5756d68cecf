//! Generate, then critique and revise until the critic is satisfied.

use super::PipelineRun;
use crate::error::Result;
use crate::exec_ctx::ExecCtx;
use crate::llm_call::LlmCall;
use crate::operation::{check_model, check_range, require_text, BoxFut, Operation};
use crate::output_parser::critique_passes;
use crate::stage::StageRecord;
use crate::types::{Detail, Outcome};
use serde::{Deserialize, Serialize};

fn default_max_rounds() -> u32 {
    3
}

fn default_threshold() -> u32 {
    7
}

/// Request body for `self_correcting`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelfCorrectRequest {
    /// Used as the generator's system prompt.
    pub prompt_text: String,
    pub input_text: String,
    /// Extra quality criteria handed to the critic.
    #[serde(default)]
    pub criteria: String,
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
    /// Critic score (1-10) that counts as passing.
    #[serde(default = "default_threshold")]
    pub threshold: u32,
    #[serde(default)]
    pub model: Option<String>,
}

impl SelfCorrectRequest {
    pub fn new(prompt_text: impl Into<String>, input_text: impl Into<String>) -> Self {
        Self {
            prompt_text: prompt_text.into(),
            input_text: input_text.into(),
            criteria: String::new(),
            max_rounds: default_max_rounds(),
            threshold: default_threshold(),
            model: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelfCorrectReport {
    pub final_output: String,
    /// Generation, then alternating critique/revision records.
    pub rounds: Vec<StageRecord>,
    /// Number of critiques performed.
    pub total_rounds: u32,
    /// Whether the last critique passed.
    pub passed: bool,
}

impl Operation for SelfCorrectRequest {
    fn category(&self) -> &'static str {
        "self_correcting"
    }

    fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    fn validate(&self) -> Result<()> {
        require_text("prompt_text", &self.prompt_text)?;
        require_text("input_text", &self.input_text)?;
        check_range("max_rounds", self.max_rounds, 1, 5)?;
        check_range("threshold", self.threshold, 1, 10)?;
        check_model(self.model.as_deref())
    }

    fn execute<'a>(&'a self, ctx: &'a ExecCtx) -> BoxFut<'a, Result<Outcome>> {
        Box::pin(self.run(ctx))
    }
}

impl SelfCorrectRequest {
    async fn run(&self, ctx: &ExecCtx) -> Result<Outcome> {
        let mut run = PipelineRun::new();
        let model = self.model.as_deref();
        let criteria_block = if self.criteria.is_empty() {
            String::new()
        } else {
            format!("\n\nAdditional quality criteria:\n{}", self.criteria)
        };

        let generated = run
            .call(
                ctx,
                LlmCall::new("self_correct_generate")
                    .var("system_prompt", &self.prompt_text)
                    .var("user_prompt", &self.input_text)
                    .with_model(model),
            )
            .await?;
        run.push(StageRecord::from_invocation("Generation", &generated).in_round(1));
        let mut current = generated.output;

        let mut critiques = 0;
        let mut passed = false;
        for round in 1..=self.max_rounds {
            let critique = run
                .call(
                    ctx,
                    LlmCall::new("self_correct_critic")
                        .var("threshold", self.threshold.to_string())
                        .var("prompt", &self.prompt_text)
                        .var("current", &current)
                        .var("criteria_block", &criteria_block)
                        .with_model(model),
                )
                .await?;
            critiques += 1;
            passed = critique_passes(&critique.output);
            run.push(
                StageRecord::from_invocation("Critique", &critique)
                    .in_round(round)
                    .with_verdict(passed),
            );
            if passed {
                break;
            }

            let revision = run
                .call(
                    ctx,
                    LlmCall::new("self_correct_reviser")
                        .var("prompt", &self.prompt_text)
                        .var("current", &current)
                        .var("feedback", &critique.output)
                        .with_model(model),
                )
                .await?;
            run.push(StageRecord::from_invocation("Revision", &revision).in_round(round));
            current = revision.output;
        }

        let output = current.clone();
        Ok(run.finish(output, |rounds| {
            Detail::SelfCorrect(SelfCorrectReport {
                final_output: current,
                rounds,
                total_rounds: critiques,
                passed,
            })
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::run;
    use crate::stage::StageStatus;
    use crate::testing::{failing_ctx, flaky_ctx, mock_ctx};
    use crate::PipelineError;

    fn report(outcome: &Outcome) -> &SelfCorrectReport {
        match &outcome.detail {
            Detail::SelfCorrect(r) => r,
            other => panic!("unexpected detail {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_never_passing_runs_all_rounds() {
        let (ctx, mock) = mock_ctx(&[
            "draft",
            r#"{"quality_score": 3, "passes_threshold": false}"#,
            "better draft",
        ]);
        let request = SelfCorrectRequest::new("Write a slogan", "coffee shop");
        let outcome = run(&request, &ctx).await.unwrap();
        let report = report(&outcome);

        // generate + 3 x (critique + revise)
        assert_eq!(mock.calls(), 7);
        assert_eq!(report.rounds.len(), 7);
        assert!(report.rounds.len() <= 1 + 2 * request.max_rounds as usize);
        assert_eq!(report.total_rounds, 3);
        assert!(!report.passed);
        assert_eq!(report.rounds[1].status, StageStatus::Failed);
    }

    #[tokio::test]
    async fn test_stops_on_first_pass() {
        let (ctx, mock) = mock_ctx(&[
            "draft",
            "```json\n{\"quality_score\": 9, \"passes_threshold\": TRUE,}\n```",
        ]);
        let outcome = run(&SelfCorrectRequest::new("Write a slogan", "coffee"), &ctx)
            .await
            .unwrap();
        let report = report(&outcome);
        assert_eq!(mock.calls(), 2);
        assert_eq!(report.total_rounds, 1);
        assert!(report.passed);
        assert_eq!(report.final_output, "draft");
        assert_eq!(outcome.output, "draft");
        assert_eq!(report.rounds[1].passed, Some(true));
    }

    #[tokio::test]
    async fn test_critic_prompt_carries_threshold_and_criteria() {
        let (ctx, mock) = mock_ctx(&["draft", r#"{"passes_threshold": true}"#]);
        let mut request = SelfCorrectRequest::new("Task text", "input");
        request.threshold = 9;
        request.criteria = "Under ten words".to_string();
        run(&request, &ctx).await.unwrap();

        let sent = mock.requests();
        assert_eq!(sent[0].system_prompt, "Task text");
        assert_eq!(sent[0].config.temperature, 0.5);
        assert!(sent[1].system_prompt.contains(">= 9"));
        assert!(sent[1]
            .prompt
            .ends_with("---\n\nAdditional quality criteria:\nUnder ten words"));
        assert_eq!(sent[1].config.temperature, 0.1);
    }

    #[tokio::test]
    async fn test_metrics_sum_over_stages() {
        let (ctx, _) = mock_ctx(&["one two", r#"{"passes_threshold": true}"#]);
        let outcome = run(&SelfCorrectRequest::new("p", "a b c"), &ctx).await.unwrap();
        // mock reports no usage, so word counts are used per call
        let critic_prompt_words = "Task: p\n\nResponse to evaluate:\n---\none two\n---"
            .split_whitespace()
            .count() as u64;
        assert_eq!(outcome.tokens_input, 3 + critic_prompt_words);
        assert_eq!(outcome.tokens_output, 2 + 2);
    }

    #[tokio::test]
    async fn test_provider_failure_keeps_going() {
        let (ctx, mock) = failing_ctx();
        let mut request = SelfCorrectRequest::new("p", "i");
        request.max_rounds = 2;
        let outcome = run(&request, &ctx).await.unwrap();
        assert_eq!(mock.calls(), 5);
        assert!(outcome.error.is_some());
        assert!(report(&outcome).rounds.iter().all(|s| s.error.is_some()));
    }

    #[tokio::test]
    async fn test_failed_revision_feeds_empty_draft_forward() {
        // call 3 is the first revision
        let (ctx, mock) = flaky_ctx(
            &["draft", r#"{"passes_threshold": false}"#],
            &[3],
        );
        let mut request = SelfCorrectRequest::new("p", "i");
        request.max_rounds = 2;
        let outcome = run(&request, &ctx).await.unwrap();
        let report = report(&outcome);

        assert_eq!(mock.calls(), 5);
        assert!(report.rounds[2].error.is_some());
        assert_eq!(report.rounds[2].output, "");
        let sent = mock.requests();
        assert!(sent[1].prompt.contains("---\ndraft\n---"));
        assert!(sent[3].prompt.contains("---\n\n---"));
        assert!(outcome.error.unwrap().contains("call 3 failed"));
    }

    #[tokio::test]
    async fn test_validation() {
        let (ctx, _) = mock_ctx(&[""]);
        let mut request = SelfCorrectRequest::new("p", "i");
        request.max_rounds = 0;
        assert!(matches!(
            run(&request, &ctx).await,
            Err(PipelineError::InvalidInput(_))
        ));
        request.max_rounds = 3;
        request.threshold = 11;
        assert!(run(&request, &ctx).await.is_err());
    }
}
