//! Execution context shared across operations.
//!
//! [`ExecCtx`] carries the LLM client, the template registry and the model
//! used when neither the request nor the template names one. It is built
//! once at startup and shared by every request.

use crate::client::LlmClient;
use crate::config::{Config, DEFAULT_MODEL};
use crate::error::Result;
use crate::templates::TemplateRegistry;
use std::sync::Arc;

/// Shared, read-only context for operation execution.
///
/// # Example
///
/// ```
/// use prompt_engine::ExecCtx;
///
/// let ctx = ExecCtx::builder().default_model("gpt-4o").build().unwrap();
/// assert_eq!(ctx.default_model, "gpt-4o");
/// assert!(ctx.templates.contains("schema_enforcer"));
/// ```
#[derive(Clone)]
pub struct ExecCtx {
    pub client: Arc<LlmClient>,
    pub templates: Arc<TemplateRegistry>,
    /// Fallback model identifier.
    pub default_model: String,
}

impl ExecCtx {
    pub fn builder() -> ExecCtxBuilder {
        ExecCtxBuilder {
            client: None,
            templates: None,
            default_model: None,
        }
    }

    /// Client with a backend per configured key, plus built-in templates
    /// (overlaid from `templates_path` when the `yaml` feature is on).
    pub fn from_config(config: &Config) -> Result<Self> {
        #[allow(unused_mut)]
        let mut templates = TemplateRegistry::builtin();
        #[cfg(feature = "yaml")]
        if let Some(ref path) = config.templates_path {
            templates = templates.with_overlay_file(path)?;
        }
        Self::builder()
            .client(Arc::new(LlmClient::from_config(config)?))
            .templates(Arc::new(templates))
            .default_model(config.default_model.clone())
            .build()
    }
}

impl std::fmt::Debug for ExecCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecCtx")
            .field("client", &self.client)
            .field("templates_count", &self.templates.len())
            .field("default_model", &self.default_model)
            .finish()
    }
}

/// Builder for [`ExecCtx`].
pub struct ExecCtxBuilder {
    client: Option<Arc<LlmClient>>,
    templates: Option<Arc<TemplateRegistry>>,
    default_model: Option<String>,
}

impl ExecCtxBuilder {
    /// Set the LLM client. Default: a client with no backends (demo only).
    pub fn client(mut self, client: Arc<LlmClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the template registry. Default: [`TemplateRegistry::builtin`].
    pub fn templates(mut self, templates: Arc<TemplateRegistry>) -> Self {
        self.templates = Some(templates);
        self
    }

    /// Set the fallback model. Default: `gpt-4o-mini`.
    pub fn default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    /// Build the execution context.
    pub fn build(self) -> Result<ExecCtx> {
        let client = match self.client {
            Some(client) => client,
            None => Arc::new(LlmClient::builder().build()?),
        };
        Ok(ExecCtx {
            client,
            templates: self
                .templates
                .unwrap_or_else(|| Arc::new(TemplateRegistry::builtin())),
            default_model: self
                .default_model
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }
}
