//! Run a prompt over a suite of test cases and grade each output.
//!
//! Cases with neither criteria nor an expected output are not sent to the
//! evaluator: they pass with a perfect score.

use super::{with_input, PipelineRun};
use crate::error::Result;
use crate::exec_ctx::ExecCtx;
use crate::llm_call::LlmCall;
use crate::operation::{check_model, check_range, require_text, BoxFut, Operation};
use crate::output_parser::Evaluation;
use crate::types::{Detail, Outcome};
use serde::{Deserialize, Serialize};

/// Score given to a case that has nothing to be graded against.
pub const AUTO_PASS_SCORE: u8 = 100;
pub const AUTO_PASS_NOTE: &str = "No criteria, auto-pass";

/// Most cases accepted in one suite.
pub const MAX_CASES: usize = 30;

/// One case of a suite, supplied inline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCaseSpec {
    pub name: String,
    pub input_text: String,
    #[serde(default)]
    pub expected_output: String,
    #[serde(default)]
    pub criteria: String,
}

impl TestCaseSpec {
    fn gradable(&self) -> bool {
        !self.criteria.trim().is_empty() || !self.expected_output.trim().is_empty()
    }
}

/// Request body for `test_suite`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSuiteRequest {
    pub prompt_text: String,
    #[serde(default)]
    pub system_prompt: String,
    pub cases: Vec<TestCaseSpec>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestCaseResult {
    pub name: String,
    pub actual_output: String,
    pub score: u8,
    pub passed: bool,
    pub evaluation: String,
    /// `true` when the case had nothing to grade against.
    pub auto_passed: bool,
    /// Tokens of the run call only.
    pub tokens: u64,
    pub latency_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestSuiteSummary {
    pub total_cases: usize,
    pub passed_cases: usize,
    /// Mean score, 2 decimals.
    pub avg_score: f64,
    /// Run and evaluator calls together.
    pub total_tokens: u64,
    pub total_cost: f64,
    pub total_latency_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestSuiteReport {
    pub results: Vec<TestCaseResult>,
    pub summary: TestSuiteSummary,
}

impl TestSuiteReport {
    /// Adapter calls made: one per case plus one per graded case.
    pub fn call_count(&self) -> usize {
        self.results.len() + self.results.iter().filter(|r| !r.auto_passed).count()
    }
}

fn mean_score(results: &[TestCaseResult]) -> f64 {
    let total: u64 = results.iter().map(|r| u64::from(r.score)).sum();
    let mean = total as f64 / results.len().max(1) as f64;
    (mean * 100.0).round() / 100.0
}

impl Operation for TestSuiteRequest {
    fn category(&self) -> &'static str {
        "test_suite"
    }

    fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    fn validate(&self) -> Result<()> {
        require_text("prompt_text", &self.prompt_text)?;
        check_range("cases", self.cases.len(), 1, MAX_CASES)?;
        for (i, case) in self.cases.iter().enumerate() {
            require_text(&format!("cases[{i}].name"), &case.name)?;
            require_text(&format!("cases[{i}].input_text"), &case.input_text)?;
        }
        check_model(self.model.as_deref())
    }

    fn execute<'a>(&'a self, ctx: &'a ExecCtx) -> BoxFut<'a, Result<Outcome>> {
        Box::pin(self.run(ctx))
    }
}

impl TestSuiteRequest {
    async fn run(&self, ctx: &ExecCtx) -> Result<Outcome> {
        let mut run = PipelineRun::new();
        let model = self.model.as_deref();
        let mut results = Vec::with_capacity(self.cases.len());

        for case in &self.cases {
            let attempt = run
                .call(
                    ctx,
                    LlmCall::new("test_case_run")
                        .var("system_prompt", &self.system_prompt)
                        .var("user_prompt", with_input(&self.prompt_text, &case.input_text))
                        .with_model(model),
                )
                .await?;

            let (evaluation, auto_passed) = if case.gradable() {
                let graded = run
                    .call(
                        ctx,
                        LlmCall::new("test_case_evaluator")
                            .var("expected_output", &case.expected_output)
                            .var("criteria", &case.criteria)
                            .var("output", &attempt.output)
                            .with_model(model),
                    )
                    .await?;
                (Evaluation::read(&graded.output), false)
            } else {
                let mut auto = Evaluation::fallback();
                auto.score = AUTO_PASS_SCORE;
                auto.passed = true;
                auto.feedback = AUTO_PASS_NOTE.to_string();
                (auto, true)
            };

            results.push(TestCaseResult {
                name: case.name.clone(),
                score: evaluation.score,
                passed: evaluation.passed,
                evaluation: evaluation.feedback,
                auto_passed,
                tokens: attempt.tokens_input + attempt.tokens_output,
                latency_ms: attempt.latency_ms,
                actual_output: attempt.output,
            });
        }

        let summary = TestSuiteSummary {
            total_cases: results.len(),
            passed_cases: results.iter().filter(|r| r.passed).count(),
            avg_score: mean_score(&results),
            total_tokens: run.tokens_input() + run.tokens_output(),
            total_cost: run.cost(),
            total_latency_ms: run.latency_ms(),
        };
        let report = TestSuiteReport { results, summary };
        let output = serde_json::to_string_pretty(&report)?;
        Ok(run.finish(output, |_| Detail::TestSuite(report)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::run;
    use crate::output_parser::readers::{FALLBACK_FEEDBACK, FALLBACK_SCORE};
    use crate::testing::mock_ctx;
    use crate::PipelineError;

    fn case(name: &str, input: &str, criteria: &str) -> TestCaseSpec {
        TestCaseSpec {
            name: name.to_string(),
            input_text: input.to_string(),
            expected_output: String::new(),
            criteria: criteria.to_string(),
        }
    }

    fn request(cases: Vec<TestCaseSpec>) -> TestSuiteRequest {
        TestSuiteRequest {
            prompt_text: "Translate to French".to_string(),
            system_prompt: "You are a translator.".to_string(),
            cases,
            model: None,
        }
    }

    fn report(outcome: &Outcome) -> &TestSuiteReport {
        match &outcome.detail {
            Detail::TestSuite(r) => r,
            other => panic!("unexpected detail {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_graded_case_runs_then_evaluates() {
        let (ctx, mock) = mock_ctx(&[
            "Bonjour",
            r#"{"score": 90, "passed": true, "evaluation": "Correct"}"#,
        ]);
        let outcome = run(&request(vec![case("greeting", "Hello", "Accurate")]), &ctx)
            .await
            .unwrap();
        let report = report(&outcome);

        assert_eq!(mock.calls(), 2);
        assert_eq!(report.results[0].actual_output, "Bonjour");
        assert_eq!(report.results[0].score, 90);
        assert!(report.results[0].passed);
        assert_eq!(report.results[0].evaluation, "Correct");
        assert_eq!(report.summary.passed_cases, 1);
        assert_eq!(report.call_count(), 2);

        let sent = mock.requests();
        assert_eq!(sent[0].system_prompt, "You are a translator.");
        assert_eq!(sent[0].prompt, "Translate to French\n\nInput: Hello");
        assert_eq!(sent[0].config.temperature, 0.2);
        assert!(sent[1].prompt.contains("Criteria: Accurate\nActual output:\nBonjour"));
        assert_eq!(sent[1].config.temperature, 0.1);
        assert_eq!(sent[1].config.max_tokens, 512);
    }

    #[tokio::test]
    async fn test_case_without_criteria_auto_passes() {
        let (ctx, mock) = mock_ctx(&["Salut"]);
        let outcome = run(&request(vec![case("free", "Hi", "")]), &ctx).await.unwrap();
        let report = report(&outcome);

        assert_eq!(mock.calls(), 1);
        let result = &report.results[0];
        assert!(result.auto_passed);
        assert!(result.passed);
        assert_eq!(result.score, AUTO_PASS_SCORE);
        assert_eq!(result.evaluation, AUTO_PASS_NOTE);
    }

    #[tokio::test]
    async fn test_unreadable_evaluation_scores_fifty() {
        let (ctx, _) = mock_ctx(&["Bonjour", "Looks right to me"]);
        let outcome = run(&request(vec![case("greeting", "Hello", "Accurate")]), &ctx)
            .await
            .unwrap();
        let result = &report(&outcome).results[0];
        assert_eq!(result.score, FALLBACK_SCORE);
        assert!(!result.passed);
        assert_eq!(result.evaluation, FALLBACK_FEEDBACK);
    }

    #[tokio::test]
    async fn test_summary_averages_and_totals() {
        // graded case: run + evaluation, then the free case: one run
        let (ctx, _) = mock_ctx(&[
            "one two",
            r#"{"score": 41, "passed": false}"#,
            "three",
        ]);
        let outcome = run(
            &request(vec![case("a", "x", "strict"), case("b", "y", "")]),
            &ctx,
        )
        .await
        .unwrap();
        let report = report(&outcome);

        assert_eq!(report.summary.total_cases, 2);
        assert_eq!(report.summary.passed_cases, 1);
        assert_eq!(report.summary.avg_score, 70.5);
        assert_eq!(
            report.summary.total_tokens,
            outcome.tokens_input + outcome.tokens_output
        );
        // "Translate to French\n\nInput: x" is five words
        assert_eq!(report.results[0].tokens, 5 + 2);
        assert_eq!(outcome.stage_count(), 3);
    }

    #[tokio::test]
    async fn test_validation() {
        let (ctx, mock) = mock_ctx(&["unused"]);
        let empty = request(Vec::new());
        assert!(matches!(
            run(&empty, &ctx).await,
            Err(PipelineError::InvalidInput(_))
        ));
        let blank_input = request(vec![case("a", " ", "")]);
        assert!(blank_input.validate().is_err());
        assert_eq!(mock.calls(), 0);
    }
}
