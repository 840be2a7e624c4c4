//! REST API server for the chain assistant
//!
//! Exposes sessions, chat listings, chat (SSE or JSON), gate resolution,
//! the tool-loop audit trail and the stateless persona and title helpers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post, put},
    Json, Router,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use uuid::Uuid;

use crate::agent::{Assistant, PersonaQuery, Reply, ResponseMode};
use crate::error::AssistantError;
use crate::session::ConfirmInput;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    pub wallet_address: Option<String>,
    pub auth_token: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WalletRequest {
    pub wallet_address: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChatListQuery {
    pub wallet: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub session_id: Uuid,
    pub message: String,
    #[serde(default = "default_stream")]
    pub stream: bool,
}

fn default_stream() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct TitleRequest {
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

type ApiResult = (StatusCode, Json<ApiResponse>);

fn status_for(err: &AssistantError) -> StatusCode {
    match err {
        e if e.is_conflict() => StatusCode::CONFLICT,
        AssistantError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        AssistantError::InvalidRequest(_) | AssistantError::Uuid(_) => StatusCode::BAD_REQUEST,
        AssistantError::CompletionEngine(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reply<T: Serialize>(result: crate::Result<T>) -> ApiResult {
    match result {
        Ok(data) => (StatusCode::OK, Json(ApiResponse::success(data))),
        Err(e) => {
            let status = status_for(&e);
            if status.is_server_error() {
                error!(error = %e, "Request failed");
            }
            (status, Json(ApiResponse::error(e.to_string())))
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub assistant: Arc<Assistant>,
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
/// Session Endpoints
/// =============================

async fn create_session(
    State(state): State<ApiState>,
    Json(req): Json<CreateSessionRequest>,
) -> ApiResult {
    reply(
        state
            .assistant
            .create_session(req.wallet_address, req.auth_token, req.title)
            .await,
    )
}

async fn connect_wallet(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(req): Json<WalletRequest>,
) -> ApiResult {
    let result = state.assistant.connect_wallet(id, req.wallet_address).await;
    reply(result.map(|_| serde_json::json!({ "session_id": id })))
}

async fn session_messages(State(state): State<ApiState>, Path(id): Path<Uuid>) -> ApiResult {
    reply(state.assistant.history(id).await)
}

async fn list_chats(State(state): State<ApiState>, Query(query): Query<ChatListQuery>) -> ApiResult {
    reply(state.assistant.list_chats(query.wallet.as_deref()).await)
}

async fn session_audit(State(state): State<ApiState>, Path(id): Path<Uuid>) -> ApiResult {
    reply(state.assistant.audit_trail(id).await)
}

async fn confirm_action(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(input): Json<ConfirmInput>,
) -> ApiResult {
    reply(state.assistant.confirm(id, input).await)
}

async fn exit_action(State(state): State<ApiState>, Path(id): Path<Uuid>) -> ApiResult {
    reply(state.assistant.exit(id).await)
}

/// =============================
/// Chat Endpoint
/// =============================

async fn chat_handler(State(state): State<ApiState>, Json(req): Json<ChatRequest>) -> Response {
    info!(session_id = %req.session_id, stream = req.stream, "Chat request received");

    let mode = if req.stream {
        ResponseMode::Streaming
    } else {
        ResponseMode::Complete
    };

    match state.assistant.submit(req.session_id, &req.message, mode).await {
        Ok(Reply::Stream(rx)) => {
            let stream = ReceiverStream::new(rx)
                .map(|event| event.to_sse_data().map(|data| Event::default().data(data)));
            Sse::new(stream)
                .keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("keep-alive"))
                .into_response()
        }
        Ok(Reply::Messages(messages)) => reply(Ok(messages)).into_response(),
        Err(e) => reply::<()>(Err(e)).into_response(),
    }
}

/// =============================
/// Stateless Endpoints
/// =============================

async fn persona_handler(State(state): State<ApiState>, Json(query): Json<PersonaQuery>) -> ApiResult {
    if query.message.trim().is_empty() {
        return reply::<()>(Err(AssistantError::InvalidRequest(
            "message must not be empty".to_string(),
        )));
    }
    let response = state.assistant.ask_persona(query).await;
    let status = if response.success {
        StatusCode::OK
    } else {
        StatusCode::BAD_GATEWAY
    };
    (status, Json(ApiResponse::success(response)))
}

async fn title_handler(State(state): State<ApiState>, Json(req): Json<TitleRequest>) -> ApiResult {
    let title = state.assistant.title(&req.message).await;
    reply(Ok(serde_json::json!({ "title": title })))
}

/// =============================
/// Router
/// =============================

pub fn create_router(assistant: Arc<Assistant>) -> Router {
    let state = ApiState { assistant };

    Router::new()
        .route("/health", get(health))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id/wallet", put(connect_wallet))
        .route("/api/chats", get(list_chats))
        .route("/api/sessions/:id/messages", get(session_messages))
        .route("/api/sessions/:id/audit", get(session_audit))
        .route("/api/sessions/:id/confirm", post(confirm_action))
        .route("/api/sessions/:id/exit", post(exit_action))
        .route("/api/chat", post(chat_handler))
        .route("/api/persona", post(persona_handler))
        .route("/api/title", post(title_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    assistant: Arc<Assistant>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(assistant);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
