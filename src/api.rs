//! REST API for the wallet session
//!
//! Endpoints:
//! - GET /api/health - Health check (no auth required)
//! - GET /api/connection - Base node connection and sync state
//! - GET /api/base-nodes - Current, known and custom base nodes
//! - POST /api/base-nodes - Add a custom base node
//! - PUT /api/base-nodes/current - Select a base node and sync against it
//! - DELETE /api/base-nodes/:public_key - Remove a custom base node
//! - GET /api/security - Security settings and prompt cooldown
//! - PUT /api/security - Update security settings

use crate::base_node::{BaseNode, RegistryError};
use crate::session::{ConnectionSnapshot, WalletSession};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub session: Arc<WalletSession>,
    pub api_token: String,
}

type ApiError = (StatusCode, String);

fn internal(e: impl std::fmt::Display) -> ApiError {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

/// Create the API router
pub fn create_router(state: ApiState) -> Router {
    let api_token = state.api_token.clone();

    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/connection", get(get_connection))
        .route("/api/base-nodes", get(get_base_nodes).post(add_base_node))
        .route("/api/base-nodes/current", put(select_base_node))
        .route("/api/base-nodes/:public_key", delete(delete_base_node))
        .route("/api/security", get(get_security).put(update_security))
        .layer(middleware::from_fn(move |req: Request<Body>, next: Next| {
            let token = api_token.clone();
            async move { require_auth(token, req, next).await }
        }))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Authentication middleware
async fn require_auth(api_token: String, request: Request<Body>, next: Next) -> Response {
    // Skip auth if token is not configured
    if api_token.is_empty() {
        return next.run(request).await;
    }

    // Allow health check without auth
    if request.uri().path() == "/api/health" {
        return next.run(request).await;
    }

    let authorized = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|token| token == api_token)
        .unwrap_or(false);

    if authorized {
        return next.run(request).await;
    }

    (StatusCode::UNAUTHORIZED, "Invalid or missing API token").into_response()
}

/// Health check endpoint
async fn health_check(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "wallet-session-monitor",
        "session": state.session.id(),
    }))
}

async fn get_connection(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<ConnectionSnapshot>, ApiError> {
    let snapshot = state.session.connection_snapshot().await.map_err(internal)?;
    Ok(Json(snapshot))
}

#[derive(Serialize)]
struct BaseNodesResponse {
    current: Option<BaseNode>,
    known: Vec<BaseNode>,
    custom: Vec<BaseNode>,
}

async fn get_base_nodes(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<BaseNodesResponse>, ApiError> {
    let registry = state.session.registry();

    Ok(Json(BaseNodesResponse {
        current: registry.current().await.map_err(internal)?,
        known: registry.known_base_nodes().await.map_err(internal)?,
        custom: registry.user_base_nodes().await.map_err(internal)?,
    }))
}

/// Custom base node in `<pubkey>::<address>` form
#[derive(Deserialize)]
struct AddBaseNodeRequest {
    name: String,
    peer: String,
}

async fn add_base_node(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<AddBaseNodeRequest>,
) -> Result<(StatusCode, Json<BaseNode>), ApiError> {
    let node = BaseNode::from_peer_string(&request.name, &request.peer).map_err(|e| match e {
        RegistryError::InvalidAddress(_) => (StatusCode::BAD_REQUEST, e.to_string()),
        other => internal(other),
    })?;

    state
        .session
        .registry()
        .add_user_base_node(&node)
        .await
        .map_err(internal)?;

    Ok((StatusCode::CREATED, Json(node)))
}

#[derive(Deserialize)]
struct SelectBaseNodeRequest {
    public_key: String,
}

async fn select_base_node(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<SelectBaseNodeRequest>,
) -> Result<Json<BaseNode>, ApiError> {
    let registry = state.session.registry();

    let mut candidates = registry.user_base_nodes().await.map_err(internal)?;
    candidates.extend(registry.known_base_nodes().await.map_err(internal)?);

    let node = candidates
        .into_iter()
        .find(|n| n.public_key_hex == request.public_key)
        .ok_or_else(|| (StatusCode::NOT_FOUND, "Unknown base node".to_string()))?;

    state
        .session
        .select_base_node(&node)
        .await
        .map_err(internal)?;

    Ok(Json(node))
}

async fn delete_base_node(
    State(state): State<Arc<ApiState>>,
    Path(public_key): Path<String>,
) -> Result<StatusCode, ApiError> {
    let removed = state
        .session
        .registry()
        .delete_user_base_node(&public_key)
        .await
        .map_err(internal)?;

    if removed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::NOT_FOUND, "Unknown base node".to_string()))
    }
}

#[derive(Serialize)]
struct SecurityResponse {
    has_verified_seed_phrase: bool,
    backup_enabled: bool,
    backup_password_set: bool,
    cooldown_until: Option<String>,
    last_prompted_stage: Option<String>,
}

async fn get_security(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<SecurityResponse>, ApiError> {
    let db = state.session.settings();

    Ok(Json(SecurityResponse {
        has_verified_seed_phrase: db.has_verified_seed_words().await.map_err(internal)?,
        backup_enabled: db.is_backup_enabled().await.map_err(internal)?,
        backup_password_set: db.is_backup_password_set().await.map_err(internal)?,
        cooldown_until: db
            .get_security_cooldown()
            .await
            .map_err(internal)?
            .map(|d| d.to_rfc3339()),
        last_prompted_stage: db.get_last_prompted_stage().await.map_err(internal)?,
    }))
}

/// Only the fields present are changed
#[derive(Deserialize)]
struct UpdateSecurityRequest {
    #[serde(default)]
    has_verified_seed_phrase: Option<bool>,
    #[serde(default)]
    backup_enabled: Option<bool>,
    #[serde(default)]
    backup_password_set: Option<bool>,
}

async fn update_security(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<UpdateSecurityRequest>,
) -> Result<Json<SecurityResponse>, ApiError> {
    let db = state.session.settings();

    if let Some(value) = request.has_verified_seed_phrase {
        db.set_verified_seed_words(value).await.map_err(internal)?;
    }
    if let Some(value) = request.backup_enabled {
        db.set_backup_enabled(value).await.map_err(internal)?;
    }
    if let Some(value) = request.backup_password_set {
        db.set_backup_password_set(value).await.map_err(internal)?;
    }

    get_security(State(state)).await
}
