use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use ripple_pipeline::{Producer, SessionRegistry};
use ripple_store::EventStore;

use crate::health::HealthReporter;
use crate::routes;
use crate::ws;

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8081 }
    }
}

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub producer: Arc<Producer>,
    pub store: Arc<EventStore>,
    pub registry: Arc<SessionRegistry>,
    pub health: Arc<HealthReporter>,
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ping", get(routes::ping))
        .route("/health", get(routes::health))
        .route(
            "/api/events",
            post(routes::produce_event).get(routes::recent_events),
        )
        .route("/api/events/llm-inference", post(routes::produce_inference))
        .route("/api/events/stream", get(ws::ws_handler))
        .route("/api/sessions/{session_id}/events", get(routes::session_events))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Bind and serve. Returns a handle holding the actual port and the server
/// task.
pub async fn start(config: ServerConfig, state: AppState) -> Result<ServerHandle, std::io::Error> {
    let router = build_router(state);
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(port = local_addr.port(), "ripple server started");

    let server = tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        _server: server,
    })
}

/// Handle returned by `start()` — keeps the accept loop alive.
pub struct ServerHandle {
    pub port: u16,
    _server: tokio::task::JoinHandle<()>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use ripple_log::MemoryLog;
    use ripple_pipeline::{Pipeline, PipelineConfig};
    use ripple_store::Database;

    struct TestStack {
        pipeline: Pipeline,
        _handle: ServerHandle,
        base: String,
    }

    async fn start_stack() -> TestStack {
        let log = Arc::new(MemoryLog::new(4));
        let db = Database::in_memory().unwrap();
        let store = Arc::new(EventStore::new(db.clone()));
        let registry = Arc::new(SessionRegistry::new(32));

        let pipeline = Pipeline::new(
            log.clone(),
            store.clone(),
            registry.clone(),
            PipelineConfig {
                poll_wait: Duration::from_millis(200),
                ..Default::default()
            },
        );
        pipeline.start().await.unwrap();

        let state = AppState {
            producer: Arc::new(pipeline.producer()),
            store,
            registry,
            health: Arc::new(HealthReporter::new(log, db, None)),
        };

        let handle = start(ServerConfig { port: 0 }, state).await.unwrap();
        let base = format!("http://127.0.0.1:{}", handle.port);
        TestStack {
            pipeline,
            _handle: handle,
            base,
        }
    }

    #[tokio::test]
    async fn health_endpoint_reports_healthy() {
        let stack = start_stack().await;

        let resp = reqwest::get(format!("{}/health", stack.base)).await.unwrap();
        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["components"]["store"], "healthy");

        stack.pipeline.stop().await;
    }

    #[tokio::test]
    async fn ping_answers_pong() {
        let stack = start_stack().await;

        let resp = reqwest::get(format!("{}/ping", stack.base)).await.unwrap();
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["message"], "pong");
        assert!(body["timestamp_ms"].as_i64().unwrap() > 0);

        stack.pipeline.stop().await;
    }

    #[tokio::test]
    async fn produce_then_query_roundtrip() {
        let stack = start_stack().await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{}/api/events/llm-inference", stack.base))
            .json(&serde_json::json!({
                "prompt": "hello",
                "response": "world",
                "model": "llama3",
                "prompt_tokens": 1,
                "response_tokens": 1,
                "latency_ms": 42,
                "success": true,
                "intent": "greeting",
                "confidence": 0.85,
                "user_id": "user-1",
                "session_id": "sess_test",
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 202);
        let accepted: serde_json::Value = resp.json().await.unwrap();
        let event_id = accepted["event_id"].as_str().unwrap().to_owned();
        assert_eq!(accepted["status"], "accepted");

        // Ingestion is fire-and-forget; poll the query API until the
        // pipeline has persisted the event.
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        let events: Vec<serde_json::Value> = loop {
            let events: Vec<serde_json::Value> = client
                .get(format!("{}/api/events?limit=10", stack.base))
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            if !events.is_empty() {
                break events;
            }
            assert!(
                std::time::Instant::now() < deadline,
                "event never became queryable"
            );
            tokio::time::sleep(Duration::from_millis(50)).await;
        };

        assert_eq!(events[0]["event_id"], event_id);
        assert_eq!(events[0]["payload"]["confidence"], 0.85);

        // The per-session side door sees it too.
        let body: serde_json::Value = client
            .get(format!("{}/api/sessions/sess_test/events", stack.base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["count"], 1);

        stack.pipeline.stop().await;
    }

    #[tokio::test]
    async fn generic_produce_accepts_typed_payload() {
        let stack = start_stack().await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{}/api/events", stack.base))
            .json(&serde_json::json!({
                "user_id": "user-1",
                "session_id": "sess_x",
                "event_type": "system.state_change",
                "payload": {
                    "entity_type": "doc",
                    "entity_id": "d1",
                    "change_type": "created",
                    "field_changes": {},
                },
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 202);

        stack.pipeline.stop().await;
    }

    #[tokio::test]
    async fn out_of_range_confidence_is_rejected() {
        let stack = start_stack().await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{}/api/events/llm-inference", stack.base))
            .json(&serde_json::json!({
                "prompt": "p",
                "response": "r",
                "model": "m",
                "prompt_tokens": 1,
                "response_tokens": 1,
                "latency_ms": 1,
                "success": true,
                "intent": "i",
                "confidence": 1.5,
                "user_id": "u",
                "session_id": "s",
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 422);

        stack.pipeline.stop().await;
    }

    #[test]
    fn build_router_creates_routes() {
        let log = Arc::new(MemoryLog::new(2));
        let db = Database::in_memory().unwrap();
        let store = Arc::new(EventStore::new(db.clone()));
        let registry = Arc::new(SessionRegistry::new(8));
        let pipeline = Pipeline::new(
            log.clone(),
            store.clone(),
            registry.clone(),
            PipelineConfig::default(),
        );

        let state = AppState {
            producer: Arc::new(pipeline.producer()),
            store,
            registry,
            health: Arc::new(HealthReporter::new(log, db, None)),
        };

        let _router = build_router(state);
    }
}
