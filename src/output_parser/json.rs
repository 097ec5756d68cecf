//! Lenient JSON extraction from LLM responses.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::output_parser::error::{truncate, ParseError};
use crate::output_parser::extract::{array_span, json_span};
use crate::output_parser::sanitize::sanitize;

/// Parse an LLM response into an untyped JSON value.
///
/// Strategies (in order), all on the [`sanitize`]d text:
/// 1. Parse the whole text
/// 2. Parse the object span from [`json_span`]
/// 3. Parse the array span
///
/// The error of the first span that failed is reported.
///
/// # Examples
///
/// ```
/// use prompt_engine::output_parser::parse_json_value;
///
/// let value = parse_json_value("Here you go:\n```json\n{\"passed\": FALSE,}\n```").unwrap();
/// assert_eq!(value["passed"], false);
/// ```
pub fn parse_json_value(response: &str) -> Result<Value, ParseError> {
    if response.trim().is_empty() {
        return Err(ParseError::EmptyResponse);
    }
    let cleaned = sanitize(response);
    if cleaned.is_empty() {
        return Err(ParseError::EmptyResponse);
    }

    if let Ok(value) = serde_json::from_str::<Value>(&cleaned) {
        return Ok(value);
    }

    let mut first_error: Option<ParseError> = None;
    for candidate in [json_span(&cleaned), array_span(&cleaned)].into_iter().flatten() {
        match serde_json::from_str::<Value>(candidate) {
            Ok(value) => return Ok(value),
            Err(e) => {
                first_error.get_or_insert(ParseError::Invalid {
                    reason: e.to_string(),
                    raw: truncate(candidate, 200),
                });
            }
        }
    }

    Err(first_error.unwrap_or(ParseError::NoJson))
}

/// Parse an LLM response into a typed struct.
///
/// ```
/// use serde::Deserialize;
/// use prompt_engine::output_parser::parse_json;
///
/// #[derive(Deserialize)]
/// struct Critique { passes_threshold: bool }
///
/// let c: Critique = parse_json("{\"passes_threshold\": TRUE}").unwrap();
/// assert!(c.passes_threshold);
/// ```
pub fn parse_json<T: DeserializeOwned>(response: &str) -> Result<T, ParseError> {
    let value = parse_json_value(response)?;
    let raw = truncate(&value.to_string(), 200);
    serde_json::from_value(value).map_err(|e| ParseError::Invalid {
        reason: e.to_string(),
        raw,
    })
}
