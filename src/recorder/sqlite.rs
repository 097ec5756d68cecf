//! SQLite-backed [`ExecutionRecorder`].

use super::schema::run_migrations;
use super::{
    check_rating, success_rate, CategoryStats, ExecutionFilter, ExecutionRecord,
    ExecutionRecorder, ExecutionStats, NewExecution,
};
use crate::error::Result;
use crate::PipelineError;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SqliteRecorder {
    pool: SqlitePool,
}

#[derive(Debug, Clone)]
pub struct SqliteRecorderBuilder {
    database_url: String,
    max_connections: u32,
}

impl SqliteRecorder {
    /// `sqlite::memory:` databases need `max_connections(1)`: each
    /// connection would otherwise see its own empty database.
    pub fn builder(database_url: impl Into<String>) -> SqliteRecorderBuilder {
        SqliteRecorderBuilder {
            database_url: database_url.into(),
            max_connections: 5,
        }
    }

    /// Wrap an existing pool, running migrations first.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl SqliteRecorderBuilder {
    pub fn max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub async fn build(self) -> Result<SqliteRecorder> {
        let pool = SqlitePoolOptions::new()
            .max_connections(self.max_connections)
            .connect(&self.database_url)
            .await?;
        SqliteRecorder::from_pool(pool).await
    }
}

/// Fixed-width UTC timestamps so text order matches time order.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn corrupt(field: &str, err: impl std::fmt::Display) -> PipelineError {
    PipelineError::Other(format!("corrupt execution row ({field}): {err}"))
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn to_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn read_record(row: &SqliteRow) -> Result<ExecutionRecord> {
    let id: String = row.try_get("id")?;
    let status: String = row.try_get("status")?;
    let input: String = row.try_get("input_payload")?;
    let output: String = row.try_get("output_payload")?;
    let metadata: String = row.try_get("metadata")?;
    let created_at: String = row.try_get("created_at")?;
    let rating: Option<i64> = row.try_get("rating")?;

    Ok(ExecutionRecord {
        id: Uuid::parse_str(&id).map_err(|e| corrupt("id", e))?,
        category: row.try_get("category")?,
        input_payload: serde_json::from_str(&input).map_err(|e| corrupt("input_payload", e))?,
        output_payload: serde_json::from_str(&output).map_err(|e| corrupt("output_payload", e))?,
        status: status.parse()?,
        model: row.try_get("model")?,
        tokens_input: to_u64(row.try_get("tokens_input")?),
        tokens_output: to_u64(row.try_get("tokens_output")?),
        cost_estimate: row.try_get("cost_estimate")?,
        latency_ms: to_u64(row.try_get("latency_ms")?),
        rating: rating.and_then(|r| u8::try_from(r).ok()),
        feedback: row.try_get("feedback")?,
        error_message: row.try_get("error_message")?,
        metadata: serde_json::from_str(&metadata).map_err(|e| corrupt("metadata", e))?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| corrupt("created_at", e))?
            .with_timezone(&Utc),
    })
}

#[async_trait]
impl ExecutionRecorder for SqliteRecorder {
    async fn record(&self, execution: NewExecution) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO executions (id, category, input_payload, output_payload, status, model, \
             tokens_input, tokens_output, cost_estimate, latency_ms, error_message, metadata, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(&execution.category)
        .bind(execution.input_payload.to_string())
        .bind(execution.output_payload.to_string())
        .bind(execution.status.as_str())
        .bind(&execution.model)
        .bind(to_i64(execution.tokens_input))
        .bind(to_i64(execution.tokens_output))
        .bind(execution.cost_estimate)
        .bind(to_i64(execution.latency_ms))
        .bind(execution.error_message.as_deref())
        .bind(execution.metadata.to_string())
        .bind(timestamp(Utc::now()))
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO template_usage (category, usage_count) VALUES (?, 1) \
             ON CONFLICT(category) DO UPDATE SET usage_count = usage_count + 1",
        )
        .bind(&execution.category)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(%id, category = %execution.category, status = %execution.status, "execution recorded");
        Ok(id)
    }

    async fn rate(&self, id: Uuid, rating: u8, feedback: &str) -> Result<()> {
        check_rating(rating)?;
        let result = sqlx::query("UPDATE executions SET rating = ?, feedback = ? WHERE id = ?")
            .bind(i64::from(rating))
            .bind(feedback)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(PipelineError::NotFound(format!("execution {id}")));
        }
        debug!(%id, rating, "execution rated");
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<ExecutionRecord> {
        let row = sqlx::query("SELECT * FROM executions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("execution {id}")))?;
        read_record(&row)
    }

    async fn list(&self, filter: &ExecutionFilter) -> Result<Vec<ExecutionRecord>> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM executions WHERE 1 = 1");
        if let Some(category) = &filter.category {
            query.push(" AND category = ").push_bind(category.clone());
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(model) = &filter.model {
            query.push(" AND model = ").push_bind(model.clone());
        }
        query
            .push(" ORDER BY created_at DESC, rowid DESC LIMIT ")
            .push_bind(i64::from(filter.limit()));

        let rows = query.build().fetch_all(&self.pool).await?;
        rows.iter().map(read_record).collect()
    }

    async fn usage_count(&self, category: &str) -> Result<u64> {
        let count: Option<i64> =
            sqlx::query_scalar("SELECT usage_count FROM template_usage WHERE category = ?")
                .bind(category)
                .fetch_optional(&self.pool)
                .await?;
        Ok(count.map(to_u64).unwrap_or(0))
    }

    async fn stats(&self, since: DateTime<Utc>) -> Result<ExecutionStats> {
        let since_text = timestamp(since);
        let row = sqlx::query(
            "SELECT COUNT(*) AS total, \
             COALESCE(SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END), 0) AS completed, \
             COALESCE(SUM(CASE WHEN status = 'failed' THEN 1 ELSE 0 END), 0) AS failed, \
             COALESCE(SUM(tokens_input + tokens_output), 0) AS total_tokens, \
             COALESCE(SUM(cost_estimate), 0.0) AS total_cost, \
             COALESCE(AVG(latency_ms), 0.0) AS avg_latency_ms, \
             AVG(rating) AS avg_rating \
             FROM executions WHERE created_at >= ?",
        )
        .bind(&since_text)
        .fetch_one(&self.pool)
        .await?;

        let by_category = sqlx::query(
            "SELECT category, COUNT(*) AS count, COALESCE(SUM(cost_estimate), 0.0) AS cost \
             FROM executions WHERE created_at >= ? \
             GROUP BY category ORDER BY count DESC, category",
        )
        .bind(&since_text)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(|r| {
            Ok(CategoryStats {
                category: r.try_get("category")?,
                count: to_u64(r.try_get("count")?),
                cost: r.try_get("cost")?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

        let total = to_u64(row.try_get("total")?);
        let completed = to_u64(row.try_get("completed")?);
        Ok(ExecutionStats {
            since,
            total,
            completed,
            failed: to_u64(row.try_get("failed")?),
            success_rate: success_rate(completed, total),
            total_tokens: to_u64(row.try_get("total_tokens")?),
            total_cost: crate::pricing::round6(row.try_get("total_cost")?),
            avg_latency_ms: row.try_get("avg_latency_ms")?,
            avg_rating: row.try_get("avg_rating")?,
            by_category,
        })
    }
}
