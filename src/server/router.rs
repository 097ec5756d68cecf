//! Route table.
//!
//! Every operation is served at `POST /api/execute/<slug>`, where the slug
//! is the kebab-case form of its category.

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use super::handlers::{self, execute};
use super::AppState;
use crate::features::*;
use crate::pipeline::{
    AbCompareRequest, AgentWorkflowRequest, BatchRequest, ChallengeRequest, ConsistencyRequest,
    DecompositionRequest, ExpertPanelRequest, ModelCompareRequest, QualityGateRequest, RagRequest,
    SchemaRequest, SelfCorrectRequest, TestSuiteRequest,
};

/// Build the API router.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(handlers::health))
        .nest("/execute", execute_routes())
        .route("/executions", get(handlers::list_executions))
        .route("/executions/:id", get(handlers::get_execution))
        .route("/executions/:id/rate", post(handlers::rate_execution))
        .route("/analytics/stats", get(handlers::stats))
        .route("/templates", get(handlers::templates))
        .with_state(state);

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
}

fn execute_routes() -> Router<AppState> {
    Router::new()
        // single calls
        .route("/feedback-analysis", post(execute::<FeedbackRequest>))
        .route("/meeting-summarizer", post(execute::<MeetingRequest>))
        .route("/quiz-generator", post(execute::<QuizRequest>))
        .route("/slide-script", post(execute::<SlideScriptRequest>))
        .route("/complaint-response", post(execute::<ComplaintRequest>))
        .route("/custom", post(execute::<CustomRequest>))
        .route("/prompt-grader", post(execute::<GraderRequest>))
        .route("/prompt-optimizer", post(execute::<OptimizerRequest>))
        .route("/injection-tester", post(execute::<InjectionRequest>))
        .route("/fewshot-builder", post(execute::<FewShotRequest>))
        .route("/document-qa", post(execute::<DocumentQaRequest>))
        .route("/compliance-checker", post(execute::<ComplianceRequest>))
        .route("/tone-transformer", post(execute::<ToneRequest>))
        .route("/misconception-detector", post(execute::<MisconceptionRequest>))
        .route("/cot-visualizer", post(execute::<CotRequest>))
        .route("/scenario-simulator", post(execute::<ScenarioRequest>))
        .route("/localizer", post(execute::<LocalizerRequest>))
        .route("/cost-optimizer", post(execute::<CostOptimizerRequest>))
        // pipelines
        .route("/self-correcting", post(execute::<SelfCorrectRequest>))
        .route("/schema-enforcer", post(execute::<SchemaRequest>))
        .route("/quality-pipeline", post(execute::<QualityGateRequest>))
        .route("/decomposition", post(execute::<DecompositionRequest>))
        .route("/batch-eval", post(execute::<BatchRequest>))
        .route("/consistency-check", post(execute::<ConsistencyRequest>))
        .route("/model-compare", post(execute::<ModelCompareRequest>))
        .route("/prompt-compare", post(execute::<AbCompareRequest>))
        .route("/expert-panel", post(execute::<ExpertPanelRequest>))
        .route("/rag-simulator", post(execute::<RagRequest>))
        .route("/challenge", post(execute::<ChallengeRequest>))
        .route("/test-suite", post(execute::<TestSuiteRequest>))
        .route("/multi-agent", post(execute::<AgentWorkflowRequest>))
}
