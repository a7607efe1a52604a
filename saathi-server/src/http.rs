//! Saathi HTTP REST API
//!
//! Axum-based server exposing the content agents and worksheet evaluation.
//!
//! Architecture: each endpoint has a thin axum handler that delegates to an
//! inner function taking plain arguments. The inner functions are directly
//! testable without axum dispatch machinery.
//!
//! Endpoints:
//! - GET  /health: generation client and DB status
//! - GET  /version: server version info
//! - GET  /api/activities?limit=N: recent activity records
//! - POST /api/agents/teaching-aids/generate
//! - POST /api/agents/lesson-plan/generate
//! - POST /api/agents/assessment/generate
//! - POST /api/agents/multilingual/generate
//! - POST /api/agents/storyteller/generate
//! - POST /api/agents/image-analysis/analyze
//! - POST /api/agents/evaluation/analyze: subprocess, 408 on timeout
//!
//! Agent routes always answer 200 once the body validates. When the content
//! came from the fallback templates the response carries an
//! `x-saathi-degraded` header naming the reason.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use saathi_core::agents::Validate;
use saathi_core::config::HttpConfig;
use saathi_core::evaluation::EvaluationRequest;
use saathi_core::{
    record_best_effort, Agent, AgentKind, ActivitySink, Assessments, Generator, ImageAnalyst,
    LessonPlans, NewActivity, Storyteller, TeachingAids, Translator, WorksheetEvaluator,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

pub const DEGRADED_HEADER: &str = "x-saathi-degraded";

/// Worksheet photos arrive base64-encoded in the JSON body.
const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

/// Upper bound on the audit insert so a stalled database cannot hold a response.
const ACTIVITY_WRITE_BUDGET: Duration = Duration::from_secs(3);

const DEFAULT_ACTIVITY_LIMIT: u32 = 20;
const MAX_ACTIVITY_LIMIT: u32 = 100;

/// Shared state for all HTTP handlers
pub struct HttpState {
    pub generator: Generator,
    pub activities: Arc<dyn ActivitySink>,
    pub evaluator: WorksheetEvaluator,
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/api/activities", get(activities_handler))
        .route("/api/agents/teaching-aids/generate", post(generate_handler::<TeachingAids>))
        .route("/api/agents/lesson-plan/generate", post(generate_handler::<LessonPlans>))
        .route("/api/agents/assessment/generate", post(generate_handler::<Assessments>))
        .route("/api/agents/multilingual/generate", post(generate_handler::<Translator>))
        .route("/api/agents/storyteller/generate", post(generate_handler::<Storyteller>))
        .route("/api/agents/image-analysis/analyze", post(generate_handler::<ImageAnalyst>))
        .route("/api/agents/evaluation/analyze", post(evaluation_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    state: Arc<HttpState>,
    config: &HttpConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Saathi HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request / Response DTOs
// ============================================================================

#[derive(Debug, Deserialize, Default)]
pub struct ActivitiesQuery {
    pub limit: Option<u32>,
}

/// Result of an agent route: status, JSON body and, for fallback content, the
/// degradation reason.
#[derive(Debug)]
pub struct AgentReply {
    pub status: StatusCode,
    pub body: Value,
    pub degraded: Option<&'static str>,
}

impl AgentReply {
    fn error(status: StatusCode, body: Value) -> Self {
        Self {
            status,
            body,
            degraded: None,
        }
    }
}

impl IntoResponse for AgentReply {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.body)).into_response();
        if let Some(reason) = self.degraded {
            response.headers_mut().insert(
                HeaderName::from_static(DEGRADED_HEADER),
                HeaderValue::from_static(reason),
            );
        }
        response
    }
}

/// Standard error body: `{ error, details? }`.
pub fn error_body(error: &str, details: Option<String>) -> Value {
    match details {
        Some(details) => json!({ "error": error, "details": details }),
        None => json!({ "error": error }),
    }
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

/// Inner health: the service stays usable without Postgres or Gemini, so this
/// always answers 200 and reports each dependency separately.
pub async fn health_inner(generator: &Generator, activities: &dyn ActivitySink) -> (StatusCode, Value) {
    let (status, database) = match activities.health().await {
        Ok(version) => ("healthy", json!({ "status": "connected", "version": version })),
        Err(e) => ("degraded", json!({ "status": "unavailable", "error": e.to_string() })),
    };

    let mut agents: Vec<&str> = AgentKind::ALL.iter().map(|k| k.slug()).collect();
    agents.push("evaluation");

    (
        StatusCode::OK,
        json!({
            "status": status,
            "version": env!("CARGO_PKG_VERSION"),
            "gemini_configured": generator.is_configured(),
            "database": database,
            "agents": agents,
        }),
    )
}

/// Inner version: returns version info (pure, no IO).
pub fn version_inner() -> Value {
    json!({
        "version": env!("CARGO_PKG_VERSION"),
        "service": "saathi",
    })
}

/// Inner activities: newest first, limit clamped to 1..=100.
pub async fn activities_inner(activities: &dyn ActivitySink, query: ActivitiesQuery) -> (StatusCode, Value) {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_ACTIVITY_LIMIT)
        .clamp(1, MAX_ACTIVITY_LIMIT);

    match activities.recent(limit).await {
        Ok(records) => (
            StatusCode::OK,
            json!({ "activities": records, "count": records.len() }),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to list activities");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_body("Failed to load activities", Some(e.to_string())),
            )
        }
    }
}

/// Inner generate: validate, run the agent, record the activity, respond.
pub async fn generate_inner<A: Agent>(
    generator: &Generator,
    activities: &dyn ActivitySink,
    agent: &A,
    request: A::Request,
) -> AgentReply {
    let slug = A::KIND.slug();

    if let Err(e) = request.validate() {
        tracing::debug!(agent = slug, error = %e, "Rejected invalid request");
        return AgentReply::error(
            StatusCode::BAD_REQUEST,
            error_body("Invalid request", Some(e.to_string())),
        );
    }

    let generation = generator.run_agent(agent, &request).await;
    let degraded = generation.degraded.as_ref().map(|e| e.kind());

    let mut activity = agent.activity(&request);
    if degraded.is_some() {
        activity.description = format!("{} (demo content)", activity.description);
    }
    record_activity(activities, activity).await;

    match serde_json::to_value(&generation.content) {
        Ok(body) => AgentReply {
            status: StatusCode::OK,
            body,
            degraded,
        },
        Err(e) => {
            tracing::error!(agent = slug, error = %e, "Failed to serialize agent output");
            AgentReply::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                error_body("Failed to generate content", None),
            )
        }
    }
}

/// Inner evaluation: no fallback; subprocess timeout maps to 408.
pub async fn evaluation_inner(
    evaluator: &WorksheetEvaluator,
    activities: &dyn ActivitySink,
    mut request: EvaluationRequest,
) -> (StatusCode, Value) {
    if let Err(e) = request.validate() {
        return (
            StatusCode::BAD_REQUEST,
            error_body("Invalid request", Some(e.to_string())),
        );
    }

    if request.timestamp.trim().is_empty() {
        request.timestamp = chrono::Utc::now().to_rfc3339();
    }

    match evaluator.evaluate(&request).await {
        Ok(result) => {
            record_activity(
                activities,
                NewActivity {
                    activity_type: "evaluation".to_string(),
                    title: format!("Worksheet evaluation: {}", request.topic),
                    description: format!(
                        "{} - {} grade {}",
                        request.student_name, request.subject, request.grade
                    ),
                    agent_type: "evaluation".to_string(),
                },
            )
            .await;
            (StatusCode::OK, result)
        }
        Err(e) if e.is_timeout() => {
            tracing::warn!(error = %e, "Worksheet evaluation timed out");
            (
                StatusCode::REQUEST_TIMEOUT,
                error_body(
                    "Evaluation timed out",
                    e.diagnostics().map(str::to_string),
                ),
            )
        }
        Err(e) => {
            tracing::error!(error = %e, "Worksheet evaluation failed");
            let details = match e.diagnostics() {
                Some(d) => format!("{}: {}", e, d),
                None => e.to_string(),
            };
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_body("Evaluation failed", Some(details)),
            )
        }
    }
}

async fn record_activity(activities: &dyn ActivitySink, activity: NewActivity) {
    if tokio::time::timeout(ACTIVITY_WRITE_BUDGET, record_best_effort(activities, activity))
        .await
        .is_err()
    {
        tracing::warn!("Activity write exceeded its budget and was abandoned");
    }
}

fn rejection_reply(rejection: JsonRejection) -> (StatusCode, Value) {
    (
        StatusCode::BAD_REQUEST,
        error_body("Invalid request body", Some(rejection.body_text())),
    )
}

// ============================================================================
// Axum handler wrappers (thin, delegate to inner functions)
// ============================================================================

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state.generator, state.activities.as_ref()).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn activities_handler(
    State(state): State<Arc<HttpState>>,
    query: Option<Query<ActivitiesQuery>>,
) -> impl IntoResponse {
    let query = query.map(|Query(q)| q).unwrap_or_default();
    let (status, body) = activities_inner(state.activities.as_ref(), query).await;
    (status, Json(body))
}

pub async fn generate_handler<A: Agent + Default>(
    State(state): State<Arc<HttpState>>,
    body: Result<Json<A::Request>, JsonRejection>,
) -> Response {
    match body {
        Ok(Json(request)) => {
            generate_inner(&state.generator, state.activities.as_ref(), &A::default(), request)
                .await
                .into_response()
        }
        Err(rejection) => {
            let (status, body) = rejection_reply(rejection);
            (status, Json(body)).into_response()
        }
    }
}

pub async fn evaluation_handler(
    State(state): State<Arc<HttpState>>,
    body: Result<Json<EvaluationRequest>, JsonRejection>,
) -> impl IntoResponse {
    let (status, body) = match body {
        Ok(Json(request)) => evaluation_inner(&state.evaluator, state.activities.as_ref(), request).await,
        Err(rejection) => rejection_reply(rejection),
    };
    (status, Json(body))
}

// ============================================================================
// Unit Tests: call inner functions directly
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use saathi_core::agents::assessment::AssessmentRequest;
    use saathi_core::agents::translation::TranslationRequest;
    use saathi_core::{ActivityError, ActivityRecord, MemoryActivityLog};

    struct BrokenSink;

    #[async_trait::async_trait]
    impl ActivitySink for BrokenSink {
        async fn record(&self, _activity: NewActivity) -> Result<ActivityRecord, ActivityError> {
            Err(ActivityError::Unavailable("connection refused".to_string()))
        }

        async fn recent(&self, _limit: u32) -> Result<Vec<ActivityRecord>, ActivityError> {
            Err(ActivityError::Unavailable("connection refused".to_string()))
        }

        async fn health(&self) -> Result<String, ActivityError> {
            Err(ActivityError::Unavailable("connection refused".to_string()))
        }
    }

    fn fractions() -> AssessmentRequest {
        AssessmentRequest {
            subject: "Mathematics".to_string(),
            grade: 5,
            topic: "Fractions".to_string(),
            language: "english".to_string(),
            question_count: 5,
        }
    }

    // ========================================================================
    // version_inner is pure
    // ========================================================================
    #[test]
    fn test_version_inner_pure() {
        let v = version_inner();
        assert_eq!(v["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(v["service"], "saathi");
    }

    #[test]
    fn test_error_body_shape() {
        assert_eq!(error_body("Nope", None), json!({ "error": "Nope" }));
        assert_eq!(
            error_body("Nope", Some("why".to_string())),
            json!({ "error": "Nope", "details": "why" })
        );
    }

    // ========================================================================
    // generate_inner: demo content, activity recorded, degraded flag set
    // ========================================================================
    #[tokio::test]
    async fn test_generate_inner_offline_assessment() {
        let log = MemoryActivityLog::new();
        let reply = generate_inner(&Generator::offline(), &log, &Assessments, fractions()).await;

        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.degraded, Some("missing-credential"));
        assert_eq!(reply.body["questions"].as_array().unwrap().len(), 5);
        assert!(reply.body["note"].as_str().unwrap().contains("Demo content"));

        let recorded = log.recent(10).await.unwrap();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].activity_type, "assessment");
        assert!(recorded[0].description.ends_with("(demo content)"));
    }

    #[tokio::test]
    async fn test_generate_inner_validation_skips_agent() {
        let log = MemoryActivityLog::new();
        let mut request = fractions();
        request.question_count = 0;

        let reply = generate_inner(&Generator::offline(), &log, &Assessments, request).await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        assert_eq!(reply.body["error"], "Invalid request");
        assert!(reply.body["details"].as_str().unwrap().contains("questionCount"));
        assert!(log.is_empty(), "no activity for rejected requests");
    }

    #[tokio::test]
    async fn test_generate_inner_survives_broken_activity_log() {
        let request = TranslationRequest {
            text: "Wash your hands".to_string(),
            from_language: "english".to_string(),
            to_language: "tamil".to_string(),
        };
        let reply = generate_inner(&Generator::offline(), &BrokenSink, &Translator, request).await;

        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body["originalText"], "Wash your hands");
    }

    #[test]
    fn test_degraded_header_set_only_when_degraded() {
        let degraded = AgentReply {
            status: StatusCode::OK,
            body: json!({}),
            degraded: Some("timeout"),
        }
        .into_response();
        assert_eq!(degraded.headers()[DEGRADED_HEADER], "timeout");

        let live = AgentReply {
            status: StatusCode::OK,
            body: json!({}),
            degraded: None,
        }
        .into_response();
        assert!(live.headers().get(DEGRADED_HEADER).is_none());
    }

    // ========================================================================
    // health / activities
    // ========================================================================
    #[tokio::test]
    async fn test_health_inner_reports_unavailable_database() {
        let (status, body) = health_inner(&Generator::offline(), &BrokenSink).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["gemini_configured"], false);
        assert_eq!(body["database"]["status"], "unavailable");
        assert_eq!(body["agents"].as_array().unwrap().len(), AgentKind::ALL.len() + 1);
    }

    #[tokio::test]
    async fn test_activities_inner_clamps_limit() {
        let log = MemoryActivityLog::new();
        for _ in 0..3 {
            generate_inner(&Generator::offline(), &log, &Assessments, fractions()).await;
        }

        let (status, body) = activities_inner(&log, ActivitiesQuery { limit: Some(0) }).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);

        let (_, body) = activities_inner(&log, ActivitiesQuery::default()).await;
        assert_eq!(body["count"], 3);
        assert_eq!(body["activities"][0]["agentType"], "assessment");
    }

    #[tokio::test]
    async fn test_activities_inner_db_error_is_500() {
        let (status, body) = activities_inner(&BrokenSink, ActivitiesQuery::default()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].is_string());
    }

    // ========================================================================
    // evaluation_inner
    // ========================================================================
    fn worksheet() -> EvaluationRequest {
        serde_json::from_value(json!({
            "imageData": "iVBORw0KGgo=",
            "subject": "Mathematics",
            "grade": 3,
            "topic": "Addition",
            "studentName": "Ravi"
        }))
        .unwrap()
    }

    fn sh(script: &str, timeout: Duration) -> WorksheetEvaluator {
        WorksheetEvaluator::new(
            "sh",
            vec!["-c".to_string(), script.to_string(), "sh".to_string()],
            timeout,
        )
    }

    #[tokio::test]
    async fn test_evaluation_inner_relays_stdout() {
        let log = MemoryActivityLog::new();
        let evaluator = sh(r#"echo '{"overall_score": 90, "grade_level": "Excellent"}'"#, Duration::from_secs(5));

        let (status, body) = evaluation_inner(&evaluator, &log, worksheet()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["overall_score"], 90);
        assert_eq!(log.recent(1).await.unwrap()[0].agent_type, "evaluation");
    }

    #[tokio::test]
    async fn test_evaluation_inner_fills_timestamp() {
        let log = MemoryActivityLog::new();
        // Echo the payload back so the timestamp the child received is visible.
        let evaluator = sh(r#"printf '%s' "$1""#, Duration::from_secs(5));

        let (_, body) = evaluation_inner(&evaluator, &log, worksheet()).await;
        let ts = body["timestamp"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok(), "got {}", ts);
    }

    #[tokio::test]
    async fn test_evaluation_inner_timeout_is_408() {
        let log = MemoryActivityLog::new();
        let evaluator = sh("exec sleep 30", Duration::from_millis(100));

        let (status, body) = evaluation_inner(&evaluator, &log, worksheet()).await;
        assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
        assert_eq!(body["error"], "Evaluation timed out");
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn test_evaluation_inner_failure_is_500() {
        let log = MemoryActivityLog::new();
        let evaluator = sh("echo 'Traceback: boom' >&2; exit 1", Duration::from_secs(5));

        let (status, body) = evaluation_inner(&evaluator, &log, worksheet()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["details"].as_str().unwrap().contains("Traceback: boom"));
    }

    #[tokio::test]
    async fn test_evaluation_inner_requires_image() {
        let log = MemoryActivityLog::new();
        let evaluator = sh("exit 0", Duration::from_secs(5));
        let mut request = worksheet();
        request.image_data.clear();

        let (status, body) = evaluation_inner(&evaluator, &log, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["details"].as_str().unwrap().contains("imageData"));
    }
}
