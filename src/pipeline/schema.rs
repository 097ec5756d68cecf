//! Structured output with validation-driven retry.

use super::PipelineRun;
use crate::error::Result;
use crate::exec_ctx::ExecCtx;
use crate::llm_call::LlmCall;
use crate::operation::{check_model, check_range, require_text, BoxFut, Operation};
use crate::retry::{RetryConfig, MAX_ATTEMPTS};
use crate::types::{Detail, Outcome};
use serde::{Deserialize, Serialize};
use tracing::debug;

fn default_max_retries() -> u32 {
    3
}

/// Request body for `schema_enforcer`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaRequest {
    pub prompt_text: String,
    /// JSON Schema text shown to the model.
    pub schema_text: String,
    pub input_text: String,
    /// Total attempts allowed (1-5).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Top-level keys that must be present and non-null.
    #[serde(default)]
    pub required_keys: Vec<String>,
    #[serde(default)]
    pub model: Option<String>,
}

impl SchemaRequest {
    pub fn new(
        prompt_text: impl Into<String>,
        schema_text: impl Into<String>,
        input_text: impl Into<String>,
    ) -> Self {
        Self {
            prompt_text: prompt_text.into(),
            schema_text: schema_text.into(),
            input_text: input_text.into(),
            max_retries: default_max_retries(),
            required_keys: Vec::new(),
            model: None,
        }
    }

    fn retry_config(&self) -> RetryConfig {
        RetryConfig::new(self.max_retries).requiring_keys(&self.required_keys)
    }
}

/// One attempt: either the accepted output or the reason it was rejected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaAttempt {
    pub attempt: u32,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaReport {
    /// Accepted output, or the last output when every attempt failed.
    pub result: String,
    pub attempts: Vec<SchemaAttempt>,
    pub total_attempts: u32,
    /// Validity of the last attempt.
    pub success: bool,
}

impl Operation for SchemaRequest {
    fn category(&self) -> &'static str {
        "schema_enforcer"
    }

    fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    fn validate(&self) -> Result<()> {
        require_text("prompt_text", &self.prompt_text)?;
        require_text("schema_text", &self.schema_text)?;
        require_text("input_text", &self.input_text)?;
        check_range("max_retries", self.max_retries, 1, MAX_ATTEMPTS)?;
        check_model(self.model.as_deref())
    }

    fn execute<'a>(&'a self, ctx: &'a ExecCtx) -> BoxFut<'a, Result<Outcome>> {
        Box::pin(self.run(ctx))
    }
}

impl SchemaRequest {
    async fn run(&self, ctx: &ExecCtx) -> Result<Outcome> {
        let config = self.retry_config();
        let mut run = PipelineRun::new();
        let mut attempts = Vec::new();
        let mut result = String::new();
        let mut last_error: Option<String> = None;

        for attempt in 1..=config.max_attempts {
            let correction = match last_error {
                Some(ref err) => format!(
                    "\n\nIMPORTANT: Your previous attempt was invalid. Errors:\n{err}\n\
                     Fix these errors and return ONLY valid JSON matching the schema."
                ),
                None => String::new(),
            };
            let inv = run
                .call(
                    ctx,
                    LlmCall::new("schema_enforcer")
                        .var("schema", &self.schema_text)
                        .var("prompt", &self.prompt_text)
                        .var("input", &self.input_text)
                        .var("correction", correction)
                        .with_model(self.model.as_deref()),
                )
                .await?;
            if let Some(err) = inv.error {
                debug!(attempt, %err, "schema attempt failed at the provider");
                attempts.push(SchemaAttempt {
                    attempt,
                    valid: false,
                    output: None,
                    error: Some(err),
                });
                result = inv.output;
                break;
            }
            result = inv.output;

            match config.check(&result) {
                Ok(_) => {
                    attempts.push(SchemaAttempt {
                        attempt,
                        valid: true,
                        output: Some(result.clone()),
                        error: None,
                    });
                    break;
                }
                Err(reason) => {
                    debug!(attempt, %reason, "schema attempt rejected");
                    attempts.push(SchemaAttempt {
                        attempt,
                        valid: false,
                        output: None,
                        error: Some(reason.clone()),
                    });
                    last_error = Some(reason);
                }
            }
        }

        let success = attempts.last().is_some_and(|a| a.valid);
        let total_attempts = attempts.len() as u32;
        let output = result.clone();
        Ok(run.finish(output, |_| {
            Detail::Schema(SchemaReport {
                result,
                attempts,
                total_attempts,
                success,
            })
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::run;
    use crate::testing::{failing_ctx, mock_ctx};

    fn report(outcome: &Outcome) -> &SchemaReport {
        match &outcome.detail {
            Detail::Schema(r) => r,
            other => panic!("unexpected detail {other:?}"),
        }
    }

    fn request() -> SchemaRequest {
        SchemaRequest::new(
            "Extract the contact",
            r#"{"type": "object", "required": ["name"]}"#,
            "Call Ada on 555-0100",
        )
    }

    #[tokio::test]
    async fn test_first_attempt_valid() {
        let (ctx, mock) = mock_ctx(&["```json\n{\"name\": \"Ada\", \"phone\": NULL}\n```"]);
        let outcome = run(&request(), &ctx).await.unwrap();
        let report = report(&outcome);
        assert_eq!(mock.calls(), 1);
        assert_eq!(report.total_attempts, 1);
        assert!(report.success);
        assert!(report.attempts[0].valid);
        assert_eq!(outcome.output, report.result);
    }

    #[tokio::test]
    async fn test_all_invalid_uses_every_attempt() {
        let (ctx, mock) = mock_ctx(&["Sorry, I can't produce JSON for that."]);
        let mut req = request();
        req.max_retries = 4;
        let outcome = run(&req, &ctx).await.unwrap();
        let report = report(&outcome);
        assert_eq!(mock.calls(), 4);
        assert_eq!(report.total_attempts, 4);
        assert!(!report.success);
        assert_eq!(report.result, "Sorry, I can't produce JSON for that.");
        assert!(report.attempts.iter().all(|a| !a.valid && a.error.is_some()));
        // no provider error: the run itself did not fail
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn test_retry_prompt_carries_previous_error() {
        let (ctx, mock) = mock_ctx(&["{\"name\": }", "{\"name\": \"Ada\"}"]);
        let outcome = run(&request(), &ctx).await.unwrap();
        assert!(report(&outcome).success);
        assert_eq!(report(&outcome).total_attempts, 2);

        let sent = mock.requests();
        assert!(sent[0].system_prompt.ends_with(
            "Required JSON Schema:\n{\"type\": \"object\", \"required\": [\"name\"]}"
        ));
        assert_eq!(sent[0].prompt, "Extract the contact\n\nInput:\nCall Ada on 555-0100");
        assert!(sent[1]
            .prompt
            .contains("IMPORTANT: Your previous attempt was invalid. Errors:\n"));
        assert_eq!(sent[1].config.temperature, 0.1);
    }

    #[tokio::test]
    async fn test_required_keys_drive_retry() {
        let (ctx, mock) = mock_ctx(&["{\"phone\": \"555\"}", "{\"name\": \"Ada\"}"]);
        let mut req = request();
        req.required_keys = vec!["name".to_string()];
        let outcome = run(&req, &ctx).await.unwrap();
        let report = report(&outcome);
        assert_eq!(mock.calls(), 2);
        assert_eq!(
            report.attempts[0].error.as_deref(),
            Some("missing required key: 'name'")
        );
        assert!(report.success);
    }

    #[tokio::test]
    async fn test_metrics_cover_all_attempts() {
        let (ctx, _) = mock_ctx(&["nope"]);
        let mut req = request();
        req.max_retries = 2;
        let outcome = run(&req, &ctx).await.unwrap();
        // "nope" is one word per attempt
        assert_eq!(outcome.tokens_output, 2);
    }

    #[tokio::test]
    async fn test_provider_failure_is_not_retried() {
        let (ctx, mock) = failing_ctx();
        let outcome = run(&SchemaRequest::new("p", "{}", "i"), &ctx).await.unwrap();
        let report = report(&outcome);
        assert_eq!(mock.calls(), 1);
        assert_eq!(report.total_attempts, 1);
        assert!(!report.success);
        assert!(report.attempts[0].error.as_deref().unwrap().contains("500"));
        assert!(outcome.error.is_some());
    }

    #[test]
    fn test_validation_range() {
        let mut req = request();
        req.max_retries = 6;
        assert!(req.validate().is_err());
        req.max_retries = 5;
        assert!(req.validate().is_ok());
    }
}
