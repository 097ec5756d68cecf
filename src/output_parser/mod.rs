//! # LLM Output Parser
//!
//! Best-effort recovery of JSON from model replies, without another model
//! call. Parsing never aborts a pipeline: callers fall back to a default
//! verdict when it fails.
//!
//! | Function | Purpose |
//! |----------|---------|
//! | [`sanitize`] | Strip fences, fix literal casing, drop trailing commas |
//! | [`json_span`] | First `{` to last `}`, else first `[` to last `]` |
//! | [`parse_json_value`] | Sanitize, then parse the whole text or a span |
//! | [`parse_json`] | Typed variant of [`parse_json_value`] |
//! | [`critique_passes`], [`safety_passed`], [`Evaluation::read`] | Verdicts with fallbacks |

pub mod error;
pub mod extract;
pub mod json;
pub mod readers;
pub mod sanitize;

pub use error::ParseError;
pub use extract::json_span;
pub use json::{parse_json, parse_json_value};
pub use readers::{
    critique_passes, plan_sub_tasks, ranked_chunk_indices, safety_passed, Evaluation, SubTask,
};
pub use sanitize::sanitize;
