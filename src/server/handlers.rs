//! Route handlers.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use super::error::ApiError;
use super::AppState;
use crate::operation::{self, Operation};
use crate::recorder::{ExecutionFilter, ExecutionRecord, ExecutionStats, NewExecution};
use crate::types::Outcome;

pub const DEFAULT_STATS_DAYS: u32 = 30;
pub const MAX_STATS_DAYS: u32 = 365;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub demo_mode: bool,
}

/// `GET /api/health`
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        demo_mode: state.ctx.client.is_demo_only(),
    })
}

/// Body of every execute response.
#[derive(Debug, Serialize)]
pub struct ExecuteResponse {
    /// `None` when the execution could not be recorded.
    pub execution_id: Option<Uuid>,
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// `POST /api/execute/<slug>` for request type `T`.
///
/// 200 on success, 500 when a provider call failed (the body still carries
/// the partial outcome), 400 for bodies that do not parse or validate.
pub async fn execute<T>(
    State(state): State<AppState>,
    payload: Result<Json<T>, JsonRejection>,
) -> Result<Response, ApiError>
where
    T: Operation + Serialize + DeserializeOwned + 'static,
{
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let outcome = operation::run(&request, &state.ctx).await?;
    let execution_id = record(&state, &request, &outcome).await;

    let status = if outcome.error.is_some() {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    };
    Ok((status, Json(ExecuteResponse { execution_id, outcome })).into_response())
}

/// Store the execution. Failures are logged and never reach the caller.
async fn record<T>(state: &AppState, request: &T, outcome: &Outcome) -> Option<Uuid>
where
    T: Operation + Serialize,
{
    let category = request.category();
    let new = serde_json::to_value(request)
        .map_err(crate::PipelineError::from)
        .and_then(|input| NewExecution::from_outcome(category, input, outcome));
    let result = match new {
        Ok(new) => state.recorder.record(new).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(id) => Some(id),
        Err(e) => {
            warn!(category, error = %e, "failed to record execution");
            None
        }
    }
}

/// `GET /api/executions`
pub async fn list_executions(
    State(state): State<AppState>,
    filter: Result<Query<ExecutionFilter>, QueryRejection>,
) -> Result<Json<Vec<ExecutionRecord>>, ApiError> {
    let Query(filter) = filter.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    Ok(Json(state.recorder.list(&filter).await?))
}

/// `GET /api/executions/:id`
pub async fn get_execution(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<ExecutionRecord>, ApiError> {
    let Path(id) = id.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    Ok(Json(state.recorder.get(id).await?))
}

#[derive(Debug, Deserialize)]
pub struct RateRequest {
    pub rating: u8,
    #[serde(default)]
    pub feedback: String,
}

/// `POST /api/executions/:id/rate`
pub async fn rate_execution(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<RateRequest>, JsonRejection>,
) -> Result<Json<ExecutionRecord>, ApiError> {
    let Path(id) = id.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let Json(body) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    state.recorder.rate(id, body.rating, &body.feedback).await?;
    Ok(Json(state.recorder.get(id).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct StatsQuery {
    pub days: Option<u32>,
}

/// `GET /api/analytics/stats?days=N`
pub async fn stats(
    State(state): State<AppState>,
    query: Result<Query<StatsQuery>, QueryRejection>,
) -> Result<Json<ExecutionStats>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let days = query.days.unwrap_or(DEFAULT_STATS_DAYS).clamp(1, MAX_STATS_DAYS);
    let since = Utc::now() - Duration::days(i64::from(days));
    Ok(Json(state.recorder.stats(since).await?))
}

#[derive(Debug, Serialize)]
pub struct TemplateInfo {
    pub category: String,
    pub model: Option<String>,
    pub temperature: f64,
    pub max_tokens: u32,
    pub usage_count: u64,
}

/// `GET /api/templates`
pub async fn templates(State(state): State<AppState>) -> Json<Vec<TemplateInfo>> {
    let mut infos = Vec::with_capacity(state.ctx.templates.len());
    for (key, template) in state.ctx.templates.iter() {
        let usage_count = match state.recorder.usage_count(key).await {
            Ok(n) => n,
            Err(e) => {
                warn!(category = key, error = %e, "usage count unavailable");
                0
            }
        };
        infos.push(TemplateInfo {
            category: key.to_string(),
            model: template.model.clone(),
            temperature: template.temperature,
            max_tokens: template.max_tokens,
            usage_count,
        });
    }
    Json(infos)
}
