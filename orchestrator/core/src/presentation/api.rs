// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! HTTP adapter: session creation, agent connections, the tool bridge and the
//! debug event stream.
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | GET | `/health` | liveness |
//! | POST | `/sessions` | create a session (optionally spawning an agent graph) |
//! | GET | `/sessions` | list live sessions |
//! | GET | `[/devmode]/{app}/{key}/{session}/sse?agentId=` | agent connection stream |
//! | GET | `[/devmode]/{app}/{key}/{session}/tools` | tool declarations |
//! | POST | `[/devmode]/{app}/{key}/{session}/tools/{tool}?agentId=` | invoke a tool |
//! | GET | `/debug/{app}/{key}/{session}/events?timeout=` | session event stream |
//!
//! `/devmode` paths skip credential checks, create sessions on demand and
//! accept `waitForAgents=N`. They answer 403 unless the server runs in dev mode.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::application::session_manager::{SessionManager, SessionManagerError};
use crate::domain::app_config::AppConfig;
use crate::domain::events::SessionEvent;
use crate::domain::graph::AgentGraphRequest;
use crate::domain::session::CoralAgentGraphSession;
use crate::presentation::tools::{tool_declarations, ToolBridge, ToolResult};

const DEFAULT_DEBUG_WAIT_MS: u64 = 1_000;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<SessionManagerError> for ApiError {
    fn from(err: SessionManagerError) -> Self {
        match err {
            SessionManagerError::SessionExists(_) | SessionManagerError::Graph(_) => {
                ApiError::BadRequest(err.to_string())
            }
            SessionManagerError::Spawn { .. } => ApiError::Internal(err.to_string()),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub session_manager: Arc<SessionManager>,
    pub config: Arc<AppConfig>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(session_manager: Arc<SessionManager>, config: Arc<AppConfig>) -> Self {
        Self {
            session_manager,
            config,
            start_time: Instant::now(),
        }
    }

    fn dev_mode(&self) -> bool {
        self.session_manager.dev_mode()
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/sessions", post(create_session_handler).get(list_sessions_handler))
        .route("/{app}/{key}/{session}/sse", get(connect_handler))
        .route("/{app}/{key}/{session}/tools", get(list_tools_handler))
        .route("/{app}/{key}/{session}/tools/{tool}", post(invoke_tool_handler))
        .route("/devmode/{app}/{key}/{session}/sse", get(dev_connect_handler))
        .route("/devmode/{app}/{key}/{session}/tools", get(dev_list_tools_handler))
        .route("/devmode/{app}/{key}/{session}/tools/{tool}", post(dev_invoke_tool_handler))
        .route("/debug/{app}/{key}/{session}/events", get(debug_events_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---- request / response shapes --------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub application_id: String,
    pub privacy_key: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub agent_graph: Option<AgentGraphRequest>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub application_id: String,
    pub privacy_key: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentQuery {
    pub agent_id: Option<String>,
    pub wait_for_agents: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DebugQuery {
    pub timeout: Option<u64>,
}

type SessionPath = (String, String, String);
type ToolPath = (String, String, String, String);

// ---- session lookup -------------------------------------------------------

fn existing_session(state: &AppState, (app, key, id): &SessionPath) -> Result<Arc<CoralAgentGraphSession>, ApiError> {
    let session = state
        .session_manager
        .get_session(id)
        .ok_or_else(|| ApiError::NotFound("Session not found".to_string()))?;
    if &session.application_id != app || &session.privacy_key != key {
        return Err(ApiError::Forbidden(
            "Invalid application ID or privacy key for this session".to_string(),
        ));
    }
    Ok(session)
}

fn dev_session(
    state: &AppState,
    (app, key, id): &SessionPath,
    query: &AgentQuery,
) -> Result<Arc<CoralAgentGraphSession>, ApiError> {
    if !state.dev_mode() {
        return Err(ApiError::Forbidden("Dev mode is disabled".to_string()));
    }
    let session = state.session_manager.get_or_create_session(id, app, key);
    if let Some(count) = query.wait_for_agents.filter(|n| *n > 0) {
        session.set_dev_required_agent_start_count(count);
        info!(session_id = %id, wait_for_agents = count, "DevMode: required agent start count set");
    }
    Ok(session)
}

fn require_agent_id(query: &AgentQuery) -> Result<String, ApiError> {
    query
        .agent_id
        .clone()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing agentId parameter".to_string()))
}

// ---- handlers -------------------------------------------------------------

async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "uptime_seconds": state.start_time.elapsed().as_secs(),
        "sessions": state.session_manager.sessions().len(),
        "dev_mode": state.dev_mode(),
    }))
}

async fn create_session_handler(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<Json<CreateSessionResponse>, ApiError> {
    if !state.dev_mode() && !state.config.is_valid_application(&request.application_id, &request.privacy_key) {
        warn!(application_id = %request.application_id, "Rejected session request with invalid credentials");
        return Err(ApiError::BadRequest("Invalid application ID or privacy key".to_string()));
    }

    let session = state
        .session_manager
        .create_session_from_request(
            &request.application_id,
            &request.privacy_key,
            request.session_id,
            request.agent_graph,
        )
        .await?;

    Ok(Json(CreateSessionResponse {
        session_id: session.id.clone(),
        application_id: session.application_id.clone(),
        privacy_key: session.privacy_key.clone(),
    }))
}

async fn list_sessions_handler(State(state): State<AppState>) -> Json<Value> {
    let sessions: Vec<Value> = state
        .session_manager
        .sessions()
        .iter()
        .map(|s| {
            json!({
                "sessionId": s.id,
                "applicationId": s.application_id,
                "registeredAgents": s.registered_agents_count(),
                "blockingGroups": s.blocking_groups(),
            })
        })
        .collect();
    Json(Value::Array(sessions))
}

fn event_stream(
    session: &CoralAgentGraphSession,
) -> impl Stream<Item = Result<Event, axum::Error>> + Send + 'static {
    session
        .events()
        .into_stream()
        .map(|event: SessionEvent| Event::default().event(event.event_type()).json_data(&event))
}

/// Announce the tool endpoint, then forward session events.
fn connection_stream(
    session: &CoralAgentGraphSession,
    path: &SessionPath,
    dev_mode: bool,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>> + Send + 'static> {
    let prefix = if dev_mode { "/devmode" } else { "" };
    let endpoint = format!("{}/{}/{}/{}/tools", prefix, path.0, path.1, path.2);
    let first = stream::once(async move { Ok(Event::default().event("endpoint").data(endpoint)) });
    Sse::new(first.chain(event_stream(session))).keep_alive(KeepAlive::default())
}

async fn connect_handler(
    State(state): State<AppState>,
    Path(path): Path<SessionPath>,
    Query(query): Query<AgentQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let agent_id = require_agent_id(&query)?;
    let session = existing_session(&state, &path)?;
    info!(session_id = %session.id, agent_id = %agent_id, "Agent connected");
    Ok(connection_stream(&session, &path, false))
}

async fn dev_connect_handler(
    State(state): State<AppState>,
    Path(path): Path<SessionPath>,
    Query(query): Query<AgentQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let agent_id = require_agent_id(&query)?;
    let session = dev_session(&state, &path, &query)?;
    info!(
        session_id = %session.id,
        agent_id = %agent_id,
        wait_for_agents = session.dev_required_agent_start_count(),
        "DevMode: agent connected"
    );
    Ok(connection_stream(&session, &path, true))
}

async fn list_tools_handler(
    State(state): State<AppState>,
    Path(path): Path<SessionPath>,
) -> Result<Json<Value>, ApiError> {
    existing_session(&state, &path)?;
    Ok(Json(json!({ "tools": tool_declarations() })))
}

async fn dev_list_tools_handler(
    State(state): State<AppState>,
    Path(path): Path<SessionPath>,
    Query(query): Query<AgentQuery>,
) -> Result<Json<Value>, ApiError> {
    dev_session(&state, &path, &query)?;
    Ok(Json(json!({ "tools": tool_declarations() })))
}

async fn invoke_tool_handler(
    State(state): State<AppState>,
    Path((app, key, id, tool)): Path<ToolPath>,
    Query(query): Query<AgentQuery>,
    Json(arguments): Json<Value>,
) -> Result<Json<ToolResult>, ApiError> {
    let agent_id = require_agent_id(&query)?;
    let session = existing_session(&state, &(app, key, id))?;
    Ok(Json(ToolBridge::new(session, agent_id).invoke(&tool, arguments).await))
}

async fn dev_invoke_tool_handler(
    State(state): State<AppState>,
    Path((app, key, id, tool)): Path<ToolPath>,
    Query(query): Query<AgentQuery>,
    Json(arguments): Json<Value>,
) -> Result<Json<ToolResult>, ApiError> {
    let agent_id = require_agent_id(&query)?;
    let session = dev_session(&state, &(app, key, id), &query)?;
    Ok(Json(ToolBridge::new(session, agent_id).invoke(&tool, arguments).await))
}

async fn debug_events_handler(
    State(state): State<AppState>,
    Path((app, key, id)): Path<SessionPath>,
    Query(query): Query<DebugQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let timeout = Duration::from_millis(query.timeout.unwrap_or(DEFAULT_DEBUG_WAIT_MS));
    let session = state
        .session_manager
        .wait_for_session(&id, timeout)
        .await
        .ok_or_else(|| ApiError::NotFound("Session not found".to_string()))?;
    if session.application_id != app || session.privacy_key != key {
        return Err(ApiError::Forbidden(
            "Invalid application ID or privacy key for this session".to_string(),
        ));
    }

    Ok(Sse::new(event_stream(&session)).keep_alive(KeepAlive::default()))
}
