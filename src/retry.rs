//! Validation-driven retry for structured output.
//!
//! [`RetryConfig`] decides whether a model reply is acceptable structured
//! output and how many attempts the schema enforcer may spend getting one.
//! Each failed check produces a reason that is fed back to the model on the
//! next attempt.

use crate::output_parser::{json_span, sanitize, ParseError};
use serde_json::Value;
use std::sync::Arc;

/// Type alias for the semantic validator function used in [`RetryConfig`].
pub type ValidatorFn = Arc<dyn Fn(&str, &Value) -> Result<(), String> + Send + Sync>;

/// Upper bound on attempts.
pub const MAX_ATTEMPTS: u32 = 5;

/// Attempt budget plus acceptance rules for structured output.
///
/// # Example
///
/// ```
/// use prompt_engine::retry::RetryConfig;
///
/// let config = RetryConfig::new(3).requiring_keys(&["name", "email"]);
///
/// assert!(config.check("```json\n{\"name\": \"Ada\", \"email\": \"a@b.c\",}\n```").is_ok());
/// assert_eq!(
///     config.check("{\"name\": \"Ada\"}").unwrap_err(),
///     "missing required key: 'email'"
/// );
/// ```
#[derive(Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first. Range: 1-5.
    pub max_attempts: u32,

    /// Optional check that runs after the reply parses as JSON.
    ///
    /// The function receives `(raw_text, parsed_value)` and returns
    /// `Ok(())` on success or `Err(reason)` on failure.
    pub validator: Option<ValidatorFn>,
}

impl RetryConfig {
    /// Allow up to `max_attempts` calls, clamped to 1-5.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.clamp(1, MAX_ATTEMPTS),
            validator: None,
        }
    }

    /// Add a semantic validator.
    pub fn with_validator(
        mut self,
        f: impl Fn(&str, &Value) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.validator = Some(Arc::new(f));
        self
    }

    /// Shorthand: validate that specific JSON keys exist and are non-null.
    pub fn requiring_keys<S: AsRef<str>>(self, keys: &[S]) -> Self {
        let keys: Vec<String> = keys.iter().map(|k| k.as_ref().to_string()).collect();
        if keys.is_empty() {
            return self;
        }
        self.with_validator(move |_raw, value| {
            for key in &keys {
                match value.get(key.as_str()) {
                    None => return Err(format!("missing required key: '{}'", key)),
                    Some(v) if v.is_null() => {
                        return Err(format!("required key '{}' is null", key))
                    }
                    _ => {}
                }
            }
            Ok(())
        })
    }

    /// Accept or reject one reply.
    ///
    /// The reply is sanitized, its bracket span parsed, and the validator
    /// (if any) applied. The error string is what the next attempt sees.
    pub fn check(&self, raw: &str) -> Result<Value, String> {
        let cleaned = sanitize(raw);
        let span = json_span(&cleaned).ok_or_else(|| ParseError::NoJson.to_string())?;
        let value: Value = serde_json::from_str(span).map_err(|e| e.to_string())?;
        if let Some(ref validator) = self.validator {
            validator(raw, &value)?;
        }
        Ok(value)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

impl std::fmt::Debug for RetryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryConfig")
            .field("max_attempts", &self.max_attempts)
            .field("has_validator", &self.validator.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_config_new() {
        let config = RetryConfig::new(3);
        assert_eq!(config.max_attempts, 3);
        assert!(config.validator.is_none());
    }

    #[test]
    fn test_attempts_clamped() {
        assert_eq!(RetryConfig::new(10).max_attempts, 5);
        assert_eq!(RetryConfig::new(0).max_attempts, 1);
    }

    #[test]
    fn test_check_accepts_span_with_prose() {
        let value = RetryConfig::default()
            .check("Here is the record: {\"id\": 7, \"ok\": TRUE} thanks")
            .unwrap();
        assert_eq!(value["ok"], true);
    }

    #[test]
    fn test_check_rejects_missing_span() {
        let err = RetryConfig::default().check("I cannot do that").unwrap_err();
        assert_eq!(err, "no JSON object or array found");
    }

    #[test]
    fn test_check_rejects_malformed() {
        let err = RetryConfig::default().check("{\"id\": 7, \"name\": }").unwrap_err();
        assert!(!err.is_empty());
    }

    #[test]
    fn test_requiring_keys_null() {
        let config = RetryConfig::new(2).requiring_keys(&["title"]);
        assert_eq!(
            config.check("{\"title\": null}").unwrap_err(),
            "required key 'title' is null"
        );
    }

    #[test]
    fn test_requiring_no_keys_adds_no_validator() {
        let config = RetryConfig::new(2).requiring_keys::<&str>(&[]);
        assert!(config.validator.is_none());
    }

    #[test]
    fn test_custom_validator() {
        let config = RetryConfig::new(2).with_validator(|_raw, value| {
            let score = value
                .get("score")
                .and_then(|v| v.as_f64())
                .ok_or("missing score")?;
            if !(0.0..=1.0).contains(&score) {
                return Err(format!("score {} outside 0.0-1.0", score));
            }
            Ok(())
        });

        assert!(config.check("{\"score\": 0.5}").is_ok());
        assert_eq!(
            config.check("{\"score\": 1.5}").unwrap_err(),
            "score 1.5 outside 0.0-1.0"
        );
    }
}
