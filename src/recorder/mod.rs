//! Execution history.
//!
//! Every finished operation becomes one write-once [`ExecutionRecord`].
//! Afterwards only the rating and feedback may change. Records are never
//! deleted.

mod schema;
mod sqlite;

pub use schema::{run_migrations, EXECUTIONS_TABLE, TEMPLATE_USAGE_TABLE};
pub use sqlite::{SqliteRecorder, SqliteRecorderBuilder};

use crate::error::Result;
use crate::operation::check_range;
use crate::types::{Detail, ExecutionStatus, Outcome};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

/// Rows returned by [`ExecutionRecorder::list`] when no limit is given.
pub const DEFAULT_LIST_LIMIT: u32 = 50;
pub const MAX_LIST_LIMIT: u32 = 200;

/// An execution about to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewExecution {
    pub category: String,
    pub input_payload: Value,
    pub output_payload: Value,
    pub status: ExecutionStatus,
    pub model: String,
    pub tokens_input: u64,
    pub tokens_output: u64,
    pub cost_estimate: f64,
    pub latency_ms: u64,
    pub error_message: Option<String>,
    pub metadata: Value,
}

impl NewExecution {
    /// Build the record for `outcome`.
    ///
    /// Single calls store the output text, pipelines store their detail
    /// report. Metadata always carries `demo` and `stage_count`.
    pub fn from_outcome(category: &str, input_payload: Value, outcome: &Outcome) -> Result<Self> {
        let output_payload = match outcome.detail {
            Detail::Single => Value::String(outcome.output.clone()),
            ref detail => serde_json::to_value(detail)?,
        };
        Ok(Self {
            category: category.to_string(),
            input_payload,
            output_payload,
            status: outcome.status(),
            model: outcome.model.clone(),
            tokens_input: outcome.tokens_input,
            tokens_output: outcome.tokens_output,
            cost_estimate: outcome.cost_estimate,
            latency_ms: outcome.latency_ms,
            error_message: outcome.error.clone(),
            metadata: json!({
                "demo": outcome.demo,
                "stage_count": outcome.stage_count(),
            }),
        })
    }
}

/// A stored execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionRecord {
    pub id: Uuid,
    pub category: String,
    pub input_payload: Value,
    pub output_payload: Value,
    pub status: ExecutionStatus,
    pub model: String,
    pub tokens_input: u64,
    pub tokens_output: u64,
    pub cost_estimate: f64,
    pub latency_ms: u64,
    pub rating: Option<u8>,
    pub feedback: String,
    pub error_message: Option<String>,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

/// Filters for [`ExecutionRecorder::list`]. Doubles as the query string of
/// `GET /api/executions`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecutionFilter {
    pub category: Option<String>,
    pub status: Option<ExecutionStatus>,
    pub model: Option<String>,
    pub limit: Option<u32>,
}

impl ExecutionFilter {
    pub fn limit(&self) -> u32 {
        self.limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryStats {
    pub category: String,
    pub count: u64,
    pub cost: f64,
}

/// Aggregates over executions created at or after `since`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionStats {
    pub since: DateTime<Utc>,
    pub total: u64,
    pub completed: u64,
    pub failed: u64,
    /// Percentage of `completed` among all records, 0 when there are none.
    pub success_rate: f64,
    pub total_tokens: u64,
    pub total_cost: f64,
    pub avg_latency_ms: f64,
    pub avg_rating: Option<f64>,
    pub by_category: Vec<CategoryStats>,
}

/// `completed / total` as a percentage with two decimals.
pub fn success_rate(completed: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (completed as f64 / total as f64 * 10_000.0).round() / 100.0
}

/// Ratings are whole stars from 1 to 5.
pub fn check_rating(rating: u8) -> Result<()> {
    check_range("rating", rating, 1, 5)
}

/// Storage for execution records.
#[async_trait]
pub trait ExecutionRecorder: Send + Sync {
    /// Insert a record and bump its category's usage counter.
    async fn record(&self, execution: NewExecution) -> Result<Uuid>;

    /// Set rating and feedback. `NotFound` if the id is unknown.
    async fn rate(&self, id: Uuid, rating: u8, feedback: &str) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<ExecutionRecord>;

    /// Newest first.
    async fn list(&self, filter: &ExecutionFilter) -> Result<Vec<ExecutionRecord>>;

    /// Executions recorded for `category` so far.
    async fn usage_count(&self, category: &str) -> Result<u64>;

    async fn stats(&self, since: DateTime<Utc>) -> Result<ExecutionStats>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{AbReport, PipelineRun};

    fn outcome(detail: Detail) -> Outcome {
        Outcome {
            output: "answer".to_string(),
            tokens_input: 3,
            tokens_output: 4,
            cost_estimate: 0.25,
            latency_ms: 9,
            model: "gpt-4o".to_string(),
            error: None,
            demo: true,
            detail,
        }
    }

    #[test]
    fn test_single_call_stores_text() {
        let new = NewExecution::from_outcome("custom", json!({"user_prompt": "hi"}), &outcome(Detail::Single))
            .unwrap();
        assert_eq!(new.output_payload, json!("answer"));
        assert_eq!(new.metadata, json!({"demo": true, "stage_count": 1}));
        assert_eq!(new.status, ExecutionStatus::Completed);
    }

    #[test]
    fn test_pipeline_stores_detail() {
        let detail = Detail::AbCompare(AbReport {
            output_a: "a".to_string(),
            output_b: "b".to_string(),
            judgement: "{}".to_string(),
        });
        let new = NewExecution::from_outcome("prompt_compare", json!({}), &outcome(detail)).unwrap();
        assert_eq!(new.output_payload["kind"], "ab_compare");
        assert_eq!(new.output_payload["output_b"], "b");
        assert_eq!(new.metadata["stage_count"], 3);
    }

    #[test]
    fn test_failed_outcome_status() {
        let failed = PipelineRun::new().finish("", |_| Detail::Single);
        let failed = Outcome {
            error: Some("HTTP 500".to_string()),
            ..failed
        };
        let new = NewExecution::from_outcome("custom", json!({}), &failed).unwrap();
        assert_eq!(new.status, ExecutionStatus::Failed);
        assert_eq!(new.error_message.as_deref(), Some("HTTP 500"));
    }

    #[test]
    fn test_success_rate() {
        assert_eq!(success_rate(0, 0), 0.0);
        assert_eq!(success_rate(2, 3), 66.67);
        assert_eq!(success_rate(4, 4), 100.0);
    }

    #[test]
    fn test_filter_limit_clamped() {
        assert_eq!(ExecutionFilter::default().limit(), DEFAULT_LIST_LIMIT);
        let filter = ExecutionFilter {
            limit: Some(10_000),
            ..Default::default()
        };
        assert_eq!(filter.limit(), MAX_LIST_LIMIT);
    }
}
