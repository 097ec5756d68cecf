//! Independent repeated calls: batch inputs, repeated runs, model sweep.
//!
//! Iterations do not depend on each other but still run one at a time.

use super::{with_input, PipelineRun};
use crate::error::Result;
use crate::exec_ctx::ExecCtx;
use crate::llm_call::LlmCall;
use crate::operation::{check_items, check_model, check_range, require_text, BoxFut, Operation};
use crate::pricing::round6;
use crate::prompt::char_prefix;
use crate::types::{Detail, Outcome};
use serde::{Deserialize, Serialize};

/// Characters of each batch input echoed back in the report.
pub const INPUT_ECHO_CHARS: usize = 200;

fn passthrough(template: &str, system: &str, user: String, model: Option<&str>) -> LlmCall {
    LlmCall::new(template)
        .var("system_prompt", system)
        .var("user_prompt", user)
        .with_model(model)
}

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

/// Request body for `batch_eval`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRequest {
    pub prompt_text: String,
    #[serde(default)]
    pub system_prompt: String,
    /// 1-50 inputs, each appended to the prompt.
    pub inputs: Vec<String>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchItem {
    /// 1-based.
    pub index: usize,
    pub input: String,
    pub output: String,
    pub tokens: u64,
    pub latency_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total_inputs: usize,
    pub total_tokens: u64,
    pub total_cost: f64,
    pub total_latency_ms: u64,
    /// Integer mean.
    pub avg_latency_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub results: Vec<BatchItem>,
    pub summary: BatchSummary,
}

impl Operation for BatchRequest {
    fn category(&self) -> &'static str {
        "batch_eval"
    }

    fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    fn validate(&self) -> Result<()> {
        require_text("prompt_text", &self.prompt_text)?;
        check_items("inputs", &self.inputs, 1, 50)?;
        check_model(self.model.as_deref())
    }

    fn execute<'a>(&'a self, ctx: &'a ExecCtx) -> BoxFut<'a, Result<Outcome>> {
        Box::pin(async move {
            let mut run = PipelineRun::new();
            let mut results = Vec::with_capacity(self.inputs.len());

            for (i, input) in self.inputs.iter().enumerate() {
                let inv = run
                    .call(
                        ctx,
                        passthrough(
                            "batch_eval",
                            &self.system_prompt,
                            with_input(&self.prompt_text, input),
                            self.model.as_deref(),
                        ),
                    )
                    .await?;
                results.push(BatchItem {
                    index: i + 1,
                    input: char_prefix(input, INPUT_ECHO_CHARS).to_string(),
                    tokens: inv.tokens_input + inv.tokens_output,
                    latency_ms: inv.latency_ms,
                    output: inv.output,
                });
            }

            let total_inputs = self.inputs.len();
            let summary = BatchSummary {
                total_inputs,
                total_tokens: run.tokens_input() + run.tokens_output(),
                total_cost: run.cost(),
                total_latency_ms: run.latency_ms(),
                avg_latency_ms: run.latency_ms() / total_inputs.max(1) as u64,
            };
            let report = BatchReport { results, summary };
            let output = serde_json::to_string_pretty(&report)?;
            Ok(run.finish(output, |_| Detail::Batch(report)))
        })
    }
}

// ---------------------------------------------------------------------------
// Consistency
// ---------------------------------------------------------------------------

fn default_num_runs() -> u32 {
    5
}

/// Request body for `consistency_check`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsistencyRequest {
    pub prompt_text: String,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub input_text: String,
    /// 2-10 runs.
    #[serde(default = "default_num_runs")]
    pub num_runs: u32,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsistencyRun {
    /// 1-based.
    pub run: u32,
    pub output: String,
    pub tokens: u64,
    pub latency_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsistencyReport {
    pub runs: Vec<ConsistencyRun>,
    /// Raw analysis reply.
    pub analysis: String,
    pub num_runs: u32,
}

impl Operation for ConsistencyRequest {
    fn category(&self) -> &'static str {
        "consistency_check"
    }

    fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    fn validate(&self) -> Result<()> {
        require_text("prompt_text", &self.prompt_text)?;
        check_range("num_runs", self.num_runs, 2, 10)?;
        check_model(self.model.as_deref())
    }

    fn execute<'a>(&'a self, ctx: &'a ExecCtx) -> BoxFut<'a, Result<Outcome>> {
        Box::pin(async move {
            let mut run = PipelineRun::new();
            let user = with_input(&self.prompt_text, &self.input_text);
            let mut runs = Vec::with_capacity(self.num_runs as usize);

            for n in 1..=self.num_runs {
                let inv = run
                    .call(
                        ctx,
                        passthrough(
                            "consistency_run",
                            &self.system_prompt,
                            user.clone(),
                            self.model.as_deref(),
                        ),
                    )
                    .await?;
                runs.push(ConsistencyRun {
                    run: n,
                    tokens: inv.tokens_input + inv.tokens_output,
                    latency_ms: inv.latency_ms,
                    output: inv.output,
                });
            }

            let transcript = runs
                .iter()
                .map(|r| format!("--- Run {} ---\n{}", r.run, r.output))
                .collect::<Vec<_>>()
                .join("\n\n");
            let analysis = run
                .call(
                    ctx,
                    LlmCall::new("consistency_analysis")
                        .var("runs", transcript)
                        .with_model(self.model.as_deref()),
                )
                .await?;

            let report = ConsistencyReport {
                runs,
                analysis: analysis.output.clone(),
                num_runs: self.num_runs,
            };
            Ok(run.finish(analysis.output, |_| Detail::Consistency(report)))
        })
    }
}

// ---------------------------------------------------------------------------
// Model comparison
// ---------------------------------------------------------------------------

/// Request body for `model_compare`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCompareRequest {
    pub prompt_text: String,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub input_text: String,
    /// 2-5 model identifiers, called in order.
    pub models: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelResult {
    pub model: String,
    pub output: String,
    pub tokens: u64,
    pub cost: f64,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelCompareReport {
    pub model_results: Vec<ModelResult>,
}

impl Operation for ModelCompareRequest {
    fn category(&self) -> &'static str {
        "model_compare"
    }

    fn model(&self) -> Option<&str> {
        None
    }

    fn validate(&self) -> Result<()> {
        require_text("prompt_text", &self.prompt_text)?;
        check_items("models", &self.models, 2, 5)
    }

    fn execute<'a>(&'a self, ctx: &'a ExecCtx) -> BoxFut<'a, Result<Outcome>> {
        Box::pin(async move {
            let mut run = PipelineRun::new();
            let user = with_input(&self.prompt_text, &self.input_text);
            let mut model_results = Vec::with_capacity(self.models.len());

            for model in &self.models {
                let inv = run
                    .call(
                        ctx,
                        passthrough("model_compare", &self.system_prompt, user.clone(), Some(model)),
                    )
                    .await?;
                model_results.push(ModelResult {
                    model: model.clone(),
                    tokens: inv.tokens_input + inv.tokens_output,
                    cost: round6(inv.cost_estimate),
                    latency_ms: inv.latency_ms,
                    output: inv.output,
                    error: inv.error,
                });
            }

            run.set_model(self.models.join(","));
            let report = ModelCompareReport { model_results };
            let output = serde_json::to_string_pretty(&report)?;
            Ok(run.finish(output, |_| Detail::ModelCompare(report)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::run;
    use crate::testing::{demo_ctx, mock_ctx};

    fn batch(inputs: &[&str]) -> BatchRequest {
        BatchRequest {
            prompt_text: "Classify sentiment".to_string(),
            system_prompt: "You are terse.".to_string(),
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            model: None,
        }
    }

    #[tokio::test]
    async fn test_batch_summary() {
        let (ctx, mock) = mock_ctx(&["positive"]);
        let outcome = run(&batch(&["love it", "hate it", "meh"]), &ctx).await.unwrap();
        let Detail::Batch(ref report) = outcome.detail else {
            panic!("expected batch detail");
        };

        assert_eq!(mock.calls(), 3);
        assert_eq!(report.summary.total_inputs, 3);
        assert_eq!(report.results.len(), 3);
        assert_eq!(report.results[2].index, 3);
        let total: u64 = report.results.iter().map(|r| r.latency_ms).sum();
        assert_eq!(report.summary.total_latency_ms, total);
        assert_eq!(report.summary.avg_latency_ms, total / 3);
        assert_eq!(
            report.summary.total_tokens,
            outcome.tokens_input + outcome.tokens_output
        );

        let sent = mock.requests();
        assert_eq!(sent[0].system_prompt, "You are terse.");
        assert_eq!(sent[0].prompt, "Classify sentiment\n\nInput: love it");
        assert_eq!(sent[0].config.temperature, 0.2);
        assert!(outcome.output.contains("\"total_inputs\": 3"));
    }

    #[tokio::test]
    async fn test_batch_echo_truncated() {
        let long = "é".repeat(300);
        let (ctx, _) = mock_ctx(&["ok"]);
        let outcome = run(&batch(&[long.as_str()]), &ctx).await.unwrap();
        let Detail::Batch(report) = outcome.detail else {
            panic!("expected batch detail");
        };
        assert_eq!(report.results[0].input.chars().count(), INPUT_ECHO_CHARS);
    }

    #[test]
    fn test_batch_validation() {
        assert!(batch(&[]).validate().is_err());
        let many: Vec<&str> = vec!["x"; 51];
        assert!(batch(&many).validate().is_err());
        assert!(batch(&["x"; 50]).validate().is_ok());
    }

    #[tokio::test]
    async fn test_consistency_runs_then_analysis() {
        let (ctx, mock) = mock_ctx(&["blue", "blue", "green", r#"{"consistency_score": 66}"#]);
        let request = ConsistencyRequest {
            prompt_text: "Pick a colour".to_string(),
            system_prompt: String::new(),
            input_text: String::new(),
            num_runs: 3,
            model: None,
        };
        let outcome = run(&request, &ctx).await.unwrap();
        let Detail::Consistency(ref report) = outcome.detail else {
            panic!("expected consistency detail");
        };

        assert_eq!(mock.calls(), 4);
        assert_eq!(report.runs.len(), 3);
        assert_eq!(report.num_runs, 3);
        assert_eq!(outcome.output, r#"{"consistency_score": 66}"#);

        let sent = mock.requests();
        assert_eq!(sent[0].prompt, "Pick a colour");
        assert_eq!(sent[0].config.temperature, 0.7);
        assert_eq!(
            sent[3].prompt,
            "--- Run 1 ---\nblue\n\n--- Run 2 ---\nblue\n\n--- Run 3 ---\ngreen"
        );
        assert_eq!(sent[3].config.temperature, 0.1);
    }

    #[test]
    fn test_consistency_defaults_and_range() {
        let request: ConsistencyRequest =
            serde_json::from_str(r#"{"prompt_text": "p"}"#).unwrap();
        assert_eq!(request.num_runs, 5);
        assert!(request.validate().is_ok());
        let request = ConsistencyRequest { num_runs: 1, ..request };
        assert!(request.validate().is_err());
    }

    #[tokio::test]
    async fn test_model_compare_routes_each_model() {
        let request = ModelCompareRequest {
            prompt_text: "Name a prime".to_string(),
            system_prompt: String::new(),
            input_text: "small".to_string(),
            models: vec!["gpt-4o".to_string(), "claude-3-haiku-20240307".to_string()],
        };
        let outcome = run(&request, &demo_ctx()).await.unwrap();
        let Detail::ModelCompare(ref report) = outcome.detail else {
            panic!("expected model compare detail");
        };
        assert_eq!(outcome.model, "gpt-4o,claude-3-haiku-20240307");
        assert_eq!(report.model_results.len(), 2);
        assert_eq!(report.model_results[1].model, "claude-3-haiku-20240307");
        assert!(outcome.demo);
    }

    #[tokio::test]
    async fn test_model_compare_needs_two_models() {
        let request = ModelCompareRequest {
            prompt_text: "p".to_string(),
            system_prompt: String::new(),
            input_text: String::new(),
            models: vec!["gpt-4o".to_string()],
        };
        assert!(run(&request, &demo_ctx()).await.is_err());
    }
}
