//! Core operation trait.
//!
//! Every endpoint runs an [`Operation`]: a validated request that knows its
//! category and how to execute against an [`ExecCtx`]. Single-call features
//! implement the smaller [`SingleCall`] trait and get [`Operation`] for free.

use crate::error::Result;
use crate::exec_ctx::ExecCtx;
use crate::llm_call::LlmCall;
use crate::types::Outcome;
use crate::PipelineError;
use std::future::Future;
use std::pin::Pin;
use std::time::Instant;
use tracing::info;

/// A boxed, pinned, Send future -- the return type of [`Operation::execute`].
pub type BoxFut<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Object-safe trait for executable operations.
///
/// `execute` returns `Err` only for invalid input or a missing template.
/// Provider failures are carried in [`Outcome::error`].
pub trait Operation: Send + Sync {
    /// Category string recorded with the execution, e.g. `"self_correcting"`.
    fn category(&self) -> &'static str;

    /// Model requested by the caller, if any.
    fn model(&self) -> Option<&str>;

    /// Check field ranges and required text.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Run the operation.
    fn execute<'a>(&'a self, ctx: &'a ExecCtx) -> BoxFut<'a, Result<Outcome>>;
}

/// An operation that is exactly one templated call.
pub trait SingleCall: Send + Sync {
    const CATEGORY: &'static str;

    fn model(&self) -> Option<&str>;

    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// The call to make. Its template key is usually [`Self::CATEGORY`].
    fn call(&self) -> LlmCall;
}

impl<T: SingleCall> Operation for T {
    fn category(&self) -> &'static str {
        T::CATEGORY
    }

    fn model(&self) -> Option<&str> {
        SingleCall::model(self)
    }

    fn validate(&self) -> Result<()> {
        SingleCall::validate(self)
    }

    fn execute<'a>(&'a self, ctx: &'a ExecCtx) -> BoxFut<'a, Result<Outcome>> {
        Box::pin(async move {
            let call = self.call().with_model(SingleCall::model(self));
            Ok(Outcome::from_invocation(call.invoke(ctx).await?))
        })
    }
}

/// Validate, then execute, logging start and end.
pub async fn run(op: &dyn Operation, ctx: &ExecCtx) -> Result<Outcome> {
    op.validate()?;
    let start = Instant::now();
    info!(category = op.category(), model = op.model().unwrap_or(&ctx.default_model), "operation started");
    let outcome = op.execute(ctx).await?;
    info!(
        category = op.category(),
        status = %outcome.status(),
        demo = outcome.demo,
        tokens_in = outcome.tokens_input,
        tokens_out = outcome.tokens_output,
        wall_ms = start.elapsed().as_millis() as u64,
        "operation finished"
    );
    Ok(outcome)
}

// Field checks shared by request types.

/// Reject blank text.
pub fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(PipelineError::invalid(format!("{field} must not be empty")));
    }
    Ok(())
}

/// Reject integers outside `min..=max`.
pub fn check_range<N>(field: &str, value: N, min: N, max: N) -> Result<()>
where
    N: PartialOrd + std::fmt::Display + Copy,
{
    if value < min || value > max {
        return Err(PipelineError::invalid(format!(
            "{field} must be between {min} and {max}, got {value}"
        )));
    }
    Ok(())
}

/// Temperature must be finite and in 0-2.
pub fn check_temperature(value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(PipelineError::invalid("temperature must be a number"));
    }
    check_range("temperature", value, 0.0, 2.0)
}

/// Reject lists whose length is outside `min..=max`, or that contain blank items.
pub fn check_items(field: &str, items: &[String], min: usize, max: usize) -> Result<()> {
    if items.len() < min || items.len() > max {
        return Err(PipelineError::invalid(format!(
            "{field} must contain between {min} and {max} items, got {}",
            items.len()
        )));
    }
    if let Some(pos) = items.iter().position(|i| i.trim().is_empty()) {
        return Err(PipelineError::invalid(format!(
            "{field}[{pos}] must not be empty"
        )));
    }
    Ok(())
}

/// Optional model names must not be blank.
pub fn check_model(model: Option<&str>) -> Result<()> {
    match model {
        Some(m) if m.trim().is_empty() => Err(PipelineError::invalid("model must not be empty")),
        _ => Ok(()),
    }
}
