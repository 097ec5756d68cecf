use thiserror::Error;

/// Errors produced by the engine and its components.
///
/// Provider failures are *not* represented here: the adapter folds them into
/// [`Invocation::error`](crate::client::Invocation) so a pipeline can keep
/// going. What remains are the conditions that must stop a request before or
/// after the model is involved.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Low-level HTTP transport failure (connection refused, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// JSON (de)serialization failed at the serde level.
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Database access failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// HTTP error with status code and response body.
    ///
    /// Returned by [`Backend`](crate::backend::Backend) implementations when
    /// the provider answers with a non-success status code.
    #[error("HTTP {status}: {body}")]
    HttpError {
        /// HTTP status code (e.g. 401, 429, 500).
        status: u16,
        /// Response body text.
        body: String,
    },

    /// The caller supplied arguments that failed validation.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Invalid configuration detected at startup.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// No prompt template is registered under the requested category.
    #[error("unknown prompt template '{0}'")]
    UnknownTemplate(String),

    /// A persisted entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Catch-all for other errors.
    #[error("{0}")]
    Other(String),
}

impl PipelineError {
    /// Shorthand for [`PipelineError::InvalidInput`].
    pub fn invalid(message: impl Into<String>) -> Self {
        PipelineError::InvalidInput(message.into())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
