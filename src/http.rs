//! HTTP API built on axum.
//!
//! Routes:
//! - `POST /api/chat`, `GET /api/chat`
//! - `GET /api/assistants`, `GET /api/models`
//! - `GET /api/workflows`, `POST /api/workflows/{workflow_id}/execute`
//! - `POST /api/template-import`, `GET /api/template-import`
//! - `GET|DELETE /api/template-import/{session_id}`
//!
//! Errors render as `{"error": "..."}` with a status derived from the
//! error kind. The template import routes allow any origin.

use crate::error::ChatGateError;
use crate::models::{
    Assistant, ChatTurnRequest, ChatTurnResponse, Message, ProviderTag, TemplateImportRequest,
    TemplateImportResponse,
};
use crate::server::ChatGateway;
use crate::session::Session;
use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Header carrying a JSON message array as prior history for `openai-chat`.
pub const HISTORY_HEADER: &str = "x-conversation-history";

type AppState = Arc<ChatGateway>;

/// An error ready to be sent to the client.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<ChatGateError> for ApiError {
    fn from(err: ChatGateError) -> Self {
        let status = match &err {
            ChatGateError::Validation(_) => StatusCode::BAD_REQUEST,
            ChatGateError::Provider { .. } | ChatGateError::UnsupportedAction { .. } => {
                StatusCode::BAD_GATEWAY
            }
            ChatGateError::RunTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            ChatGateError::Config(_)
            | ChatGateError::Store(_)
            | ChatGateError::Reqwest(_)
            | ChatGateError::Serialization(_)
            | ChatGateError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if err.is_client_error() {
            warn!(error = %err, "rejected request");
        } else {
            error!(error = %err, "request failed");
        }
        Self::new(status, err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(StatusCode::BAD_REQUEST, rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

#[derive(Debug, Serialize)]
struct AssistantsResponse {
    assistants: Vec<Assistant>,
}

#[derive(Debug, Serialize)]
struct ModelsResponse {
    models: Vec<String>,
}

#[derive(Debug, Serialize)]
struct WorkflowsResponse {
    workflows: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct DeleteResponse {
    success: bool,
    message: &'static str,
}

/// Builds the application router.
pub fn router(gateway: Arc<ChatGateway>) -> Router {
    let import_routes = Router::new()
        .route(
            "/api/template-import",
            post(create_import_session).get(import_status),
        )
        .route(
            "/api/template-import/{session_id}",
            get(get_import_session).delete(delete_import_session),
        )
        .layer(CorsLayer::permissive());

    Router::new()
        .route("/api/chat", post(post_chat).get(chat_status))
        .route("/api/assistants", get(list_assistants))
        .route("/api/models", get(list_models))
        .route("/api/workflows", get(list_workflows))
        .route("/api/workflows/{workflow_id}/execute", post(execute_workflow))
        .merge(import_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(gateway)
}

/// Binds the configured address and serves until the process stops.
pub async fn serve(gateway: Arc<ChatGateway>) -> Result<(), ChatGateError> {
    let addr = gateway.config().bind_addr().to_string();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("chatgate listening on http://{}", addr);
    axum::serve(listener, router(gateway)).await?;
    Ok(())
}

/// Reads prior history from the history header; unparsable history is empty.
fn history_from_headers(headers: &HeaderMap) -> Vec<Message> {
    let Some(raw) = headers.get(HISTORY_HEADER) else {
        return Vec::new();
    };
    match raw
        .to_str()
        .map_err(|e| e.to_string())
        .and_then(|s| serde_json::from_str(s).map_err(|e| e.to_string()))
    {
        Ok(history) => history,
        Err(e) => {
            warn!(error = %e, "ignoring unparsable conversation history header");
            Vec::new()
        }
    }
}

/// POST /api/chat
async fn post_chat(
    State(gateway): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<ChatTurnRequest>, JsonRejection>,
) -> Result<Json<ChatTurnResponse>, ApiError> {
    let Json(mut turn) = payload?;
    if turn.history.is_empty() && turn.provider == ProviderTag::OpenAIChat {
        turn.history = history_from_headers(&headers);
    }
    Ok(Json(gateway.send_chat_turn(&turn).await?))
}

/// GET /api/chat
async fn chat_status() -> Json<serde_json::Value> {
    let providers: Vec<&str> = ProviderTag::ALL.iter().map(ProviderTag::as_str).collect();
    Json(json!({
        "providers": providers,
        "status": "Chat API is running"
    }))
}

/// GET /api/assistants
async fn list_assistants(State(gateway): State<AppState>) -> Result<Json<AssistantsResponse>, ApiError> {
    let assistants = gateway.list_assistants().await?;
    Ok(Json(AssistantsResponse { assistants }))
}

/// GET /api/models
async fn list_models(State(gateway): State<AppState>) -> Result<Json<ModelsResponse>, ApiError> {
    let models = gateway.list_models().await?;
    Ok(Json(ModelsResponse { models }))
}

/// GET /api/workflows
async fn list_workflows(State(gateway): State<AppState>) -> Result<Json<WorkflowsResponse>, ApiError> {
    let workflows = gateway.list_workflows().await?;
    Ok(Json(WorkflowsResponse { workflows }))
}

/// POST /api/workflows/{workflow_id}/execute
async fn execute_workflow(
    State(gateway): State<AppState>,
    Path(workflow_id): Path<String>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(data) = payload?;
    Ok(Json(gateway.execute_workflow(&workflow_id, &data).await?))
}

/// POST /api/template-import
async fn create_import_session(
    State(gateway): State<AppState>,
    payload: Result<Json<TemplateImportRequest>, JsonRejection>,
) -> Result<Json<TemplateImportResponse>, ApiError> {
    let Json(request) = payload?;
    Ok(Json(gateway.create_import_session(request).await?))
}

/// GET /api/template-import
async fn import_status() -> Json<serde_json::Value> {
    Json(json!({
        "status": "Template Import API is running",
        "endpoint": "/api/template-import",
        "method": "POST"
    }))
}

/// GET /api/template-import/{session_id}
async fn get_import_session(
    State(gateway): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Session>, ApiError> {
    gateway
        .get_import_session(&session_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "Session not found or expired"))
}

/// DELETE /api/template-import/{session_id}
async fn delete_import_session(
    State(gateway): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let success = gateway.delete_import_session(&session_id).await?;
    Ok(Json(DeleteResponse {
        success,
        message: if success {
            "Session deleted"
        } else {
            "Session not found"
        },
    }))
}
