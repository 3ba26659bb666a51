use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use ripple_core::{EventPayload, InferenceCompleted, SessionId};

use crate::server::AppState;

const DEFAULT_RECENT_LIMIT: u32 = 50;
const DEFAULT_SESSION_LIMIT: u32 = 100;
const MAX_LIMIT: u32 = 500;

/// Generic ingestion body: envelope routing fields plus a typed payload.
#[derive(Deserialize)]
pub struct ProduceRequest {
    pub user_id: String,
    pub session_id: String,
    #[serde(flatten)]
    pub payload: EventPayload,
}

/// Flat inference ingestion body, kept for callers of the original route.
#[derive(Deserialize)]
pub struct InferenceRequest {
    pub prompt: String,
    pub response: String,
    pub model: String,
    pub prompt_tokens: u32,
    pub response_tokens: u32,
    pub latency_ms: u64,
    pub success: bool,
    #[serde(default)]
    pub error_message: Option<String>,
    pub intent: String,
    pub confidence: f64,
    pub user_id: String,
    pub session_id: String,
}

#[derive(Deserialize)]
pub struct LimitParams {
    pub limit: Option<u32>,
}

/// POST /api/events — fire-and-forget: the caller learns "accepted", never
/// the broker outcome.
pub async fn produce_event(
    State(state): State<AppState>,
    Json(req): Json<ProduceRequest>,
) -> impl IntoResponse {
    if let Err(e) = req.payload.validate() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"error": e.to_string()})),
        );
    }

    let event_id = state.producer.produce(
        req.payload,
        req.user_id,
        SessionId::from_raw(req.session_id),
    );
    (
        StatusCode::ACCEPTED,
        Json(json!({"event_id": event_id.as_str(), "status": "accepted"})),
    )
}

/// POST /api/events/llm-inference
pub async fn produce_inference(
    State(state): State<AppState>,
    Json(req): Json<InferenceRequest>,
) -> impl IntoResponse {
    let payload = EventPayload::InferenceCompleted(InferenceCompleted {
        prompt: req.prompt,
        response: req.response,
        model: req.model,
        prompt_tokens: req.prompt_tokens,
        response_tokens: req.response_tokens,
        latency_ms: req.latency_ms,
        success: req.success,
        error_message: req.error_message.filter(|m| !m.is_empty()),
        intent: req.intent,
        confidence: req.confidence,
    });
    if let Err(e) = payload.validate() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"error": e.to_string()})),
        );
    }

    let event_id =
        state
            .producer
            .produce(payload, req.user_id, SessionId::from_raw(req.session_id));
    (
        StatusCode::ACCEPTED,
        Json(json!({"event_id": event_id.as_str(), "status": "accepted"})),
    )
}

/// GET /api/events?limit=50 — most-recent-first, bypassing the stream path.
pub async fn recent_events(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> impl IntoResponse {
    let limit = params.limit.unwrap_or(DEFAULT_RECENT_LIMIT).min(MAX_LIMIT);
    match state.store.recent(limit) {
        Ok(events) => (StatusCode::OK, Json(json!(events))),
        Err(e) => {
            tracing::error!(error = %e, "recent events query failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": e.to_string()})),
            )
        }
    }
}

/// GET /api/sessions/{session_id}/events?limit=100
pub async fn session_events(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(params): Query<LimitParams>,
) -> impl IntoResponse {
    let limit = params.limit.unwrap_or(DEFAULT_SESSION_LIMIT).min(MAX_LIMIT);
    let session = SessionId::from_raw(session_id.clone());
    match state.store.for_session(&session, limit) {
        Ok(events) => (
            StatusCode::OK,
            Json(json!({
                "session_id": session_id,
                "count": events.len(),
                "events": events,
            })),
        ),
        Err(e) => {
            tracing::error!(session_id = %session_id, error = %e, "session events query failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": e.to_string()})),
            )
        }
    }
}

/// GET /ping
pub async fn ping() -> impl IntoResponse {
    Json(json!({
        "message": "pong",
        "timestamp_ms": Utc::now().timestamp_millis(),
    }))
}

/// GET /health — always structured, 503 when degraded.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let report = state.health.check().await;
    let status = if report.status == "healthy" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}
