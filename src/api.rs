//! REST API server for the finance chat service
//!
//! Exposes chat turns and thread history over HTTP

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::error::OrchestrationError;
use crate::service::{parse_or_stable_uuid, ChatService};

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChatRequest {
    pub thread_id: Option<String>,
    pub message: String,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<ChatService>,
}

fn error_status(error: &OrchestrationError) -> StatusCode {
    match error {
        OrchestrationError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Chat Endpoint
/// =============================

async fn chat_handler(
    State(state): State<ApiState>,
    payload: std::result::Result<Json<ChatRequest>, JsonRejection>,
) -> (StatusCode, Json<ApiResponse>) {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "Malformed chat request");
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::error(format!(
                    "Invalid request body: {}",
                    rejection.body_text()
                ))),
            );
        }
    };

    let thread_id = parse_or_stable_uuid(req.thread_id.as_deref());

    info!(thread_id = %thread_id, "Received chat request");

    match state.service.handle_turn(thread_id, &req.message).await {
        Ok(response) => (StatusCode::OK, Json(ApiResponse::success(response))),
        Err(e) => {
            warn!(thread_id = %thread_id, error = %e, "Chat turn rejected");
            (error_status(&e), Json(ApiResponse::error(e.to_string())))
        }
    }
}

/// =============================
/// Thread Endpoints
/// =============================

async fn get_thread(
    State(state): State<ApiState>,
    Path(thread_id): Path<String>,
) -> (StatusCode, Json<ApiResponse>) {
    let thread_id = parse_or_stable_uuid(Some(&thread_id));

    match state.service.history(thread_id).await {
        Ok(Some(messages)) => (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({
                "thread_id": thread_id,
                "messages": messages,
            }))),
        ),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(format!("Thread {} not found", thread_id))),
        ),
        Err(e) => (error_status(&e), Json(ApiResponse::error(e.to_string()))),
    }
}

async fn delete_thread(
    State(state): State<ApiState>,
    Path(thread_id): Path<String>,
) -> (StatusCode, Json<ApiResponse>) {
    let thread_id = parse_or_stable_uuid(Some(&thread_id));

    match state.service.reset(thread_id).await {
        Ok(true) => (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({ "thread_id": thread_id }))),
        ),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(format!("Thread {} not found", thread_id))),
        ),
        Err(e) => (error_status(&e), Json(ApiResponse::error(e.to_string()))),
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(service: Arc<ChatService>) -> Router {
    let state = ApiState { service };

    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat_handler))
        .route("/api/threads/:thread_id", get(get_thread).delete(delete_thread))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    service: Arc<ChatService>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(service);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::sample_context;
    use crate::dispatch::Dispatcher;
    use crate::planner::KeywordToolPlanner;
    use crate::router::KeywordRouter;
    use crate::session::InMemorySessionStore;
    use crate::worker::create_default_workers;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    fn app() -> Router {
        let dispatcher = Dispatcher::new(
            Arc::new(KeywordRouter::new()),
            create_default_workers(
                Arc::new(sample_context()),
                Arc::new(KeywordToolPlanner::new()),
            ),
            6,
        )
        .unwrap();

        create_router(Arc::new(ChatService::new(
            dispatcher,
            Arc::new(InMemorySessionStore::new()),
            20,
        )))
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn chat(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "healthy");
    }

    #[tokio::test]
    async fn test_chat_then_fetch_thread() {
        let app = app();

        let response = app
            .clone()
            .oneshot(chat(serde_json::json!({
                "thread_id": "customer-1",
                "message": "What is my balance for account A1"
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["workers"], serde_json::json!(["account"]));
        assert_eq!(body["data"]["termination"], "finished");
        assert!(body["data"]["answer"].as_str().unwrap().contains("15250.75"));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/threads/customer-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(body["data"]["messages"].as_array().unwrap().len() >= 3);
    }

    #[tokio::test]
    async fn test_empty_message_is_bad_request() {
        let response = app()
            .oneshot(chat(serde_json::json!({ "message": "" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_malformed_body_uses_envelope() {
        let app = app();

        for body in [r#"{"thread_id": "t1"}"#, "not json"] {
            let response = app
                .clone()
                .oneshot(
                    Request::builder()
                        .method("POST")
                        .uri("/api/chat")
                        .header("content-type", "application/json")
                        .body(Body::from(body))
                        .unwrap(),
                )
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let body = body_json(response).await;
            assert_eq!(body["success"], false);
            assert!(body["error"]
                .as_str()
                .unwrap()
                .starts_with("Invalid request body"));
        }
    }

    #[tokio::test]
    async fn test_unknown_thread_not_found() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/api/threads/nobody")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
