//! A single templated adapter call.
//!
//! [`LlmCall`] names a template, supplies its variables and optionally
//! overrides the model and sampling settings. Rendering happens at invoke
//! time against the registry in [`ExecCtx`].

use crate::{
    backend::LlmRequest,
    client::{Invocation, LlmConfig},
    error::Result,
    exec_ctx::ExecCtx,
    prompt::{render, PromptVars},
};
use tracing::debug;

/// One templated LLM call.
///
/// # Example
///
/// ```
/// use prompt_engine::{ExecCtx, LlmCall};
///
/// let ctx = ExecCtx::builder().build().unwrap();
/// let call = LlmCall::new("tone_transformer")
///     .var("target_tone", "formal")
///     .var("text", "hey, the build's broken again")
///     .with_temperature(0.0);
///
/// let request = call.request(&ctx).unwrap();
/// assert!(request.prompt.starts_with("Target tone: formal"));
/// assert_eq!(request.config.temperature, 0.0);
/// assert_eq!(request.config.max_tokens, 2048);
/// ```
#[derive(Debug, Clone)]
pub struct LlmCall {
    template: String,
    vars: PromptVars,
    model: Option<String>,
    temperature: Option<f64>,
    max_tokens: Option<u32>,
}

impl LlmCall {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            vars: PromptVars::new(),
            model: None,
            temperature: None,
            max_tokens: None,
        }
    }

    /// Template key.
    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn vars(&self) -> &PromptVars {
        &self.vars
    }

    /// Insert a template variable.
    pub fn var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.set(key, value);
        self
    }

    /// Override the model. `None` keeps the template or context default.
    pub fn with_model(mut self, model: Option<impl Into<String>>) -> Self {
        self.model = model.map(Into::into);
        self
    }

    pub fn with_temperature(mut self, temp: f64) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn with_max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = Some(tokens);
        self
    }

    /// Render the request without sending it.
    ///
    /// Model resolution: override, then the template's model, then
    /// [`ExecCtx::default_model`].
    pub fn request(&self, ctx: &ExecCtx) -> Result<LlmRequest> {
        let template = ctx.templates.get(&self.template)?;
        let model = self
            .model
            .clone()
            .or_else(|| template.model.clone())
            .unwrap_or_else(|| ctx.default_model.clone());
        let config = LlmConfig::default()
            .with_temperature(self.temperature.unwrap_or(template.temperature))
            .with_max_tokens(self.max_tokens.unwrap_or(template.max_tokens));

        Ok(LlmRequest::new(
            model,
            render(&template.system, &self.vars),
            render(&template.user, &self.vars),
        )
        .with_config(config))
    }

    /// Render and send. Errors only when the template is missing; provider
    /// failures land in [`Invocation::error`].
    pub async fn invoke(&self, ctx: &ExecCtx) -> Result<Invocation> {
        let request = self.request(ctx)?;
        debug!(
            template = %self.template,
            model = %request.model,
            temperature = request.config.temperature,
            "rendering call"
        );
        Ok(ctx.client.invoke(&request).await)
    }
}
