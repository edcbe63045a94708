//! HTTP surface of the manager.
//!
//! Thin translation layer over the orchestrator facade: routes parse the
//! request, call `PlayerManager` or the config store, and map the typed
//! error taxonomy onto status codes. Instance records serialize without
//! their process handle.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::config::PlayerConfig;
use crate::errors::{ConfigError, OrchestratorError};
use crate::orchestrator::manager::PlayerManager;

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub manager: PlayerManager,
}

pub type SharedState = Arc<AppState>;

// ── Request payload types ─────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartPlayerRequest {
    pub id: String,
    pub config_name: String,
}

#[derive(Deserialize)]
pub struct IdQuery {
    pub id: Option<String>,
}

#[derive(Deserialize)]
pub struct NameQuery {
    pub name: Option<String>,
}

#[derive(Deserialize)]
pub struct SaveConfigRequest {
    pub name: String,
    pub config: PlayerConfig,
}

// ── Error handling ────────────────────────────────────────────────────

pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        match &err {
            OrchestratorError::AlreadyRunning { .. } => ApiError::Conflict(err.to_string()),
            OrchestratorError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            // A bad config name on start is a caller mistake, not a 404.
            OrchestratorError::Config(ConfigError::NotFound { .. })
            | OrchestratorError::Config(ConfigError::Invalid { .. }) => {
                ApiError::BadRequest(err.to_string())
            }
            OrchestratorError::Config(ConfigError::Io { .. })
            | OrchestratorError::PortExhausted { .. }
            | OrchestratorError::StartupFailed { .. } => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        match &err {
            ConfigError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            ConfigError::Invalid { .. } => ApiError::BadRequest(err.to_string()),
            ConfigError::Io { .. } => ApiError::Internal(err.to_string()),
        }
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route(
            "/api/players",
            get(get_players).post(start_player).delete(stop_player),
        )
        .route(
            "/api/configs",
            get(get_configs).put(save_config).delete(delete_config),
        )
        .route("/health", get(health_check))
}

async fn health_check() -> &'static str {
    "ok"
}

// ── Player instance handlers ──────────────────────────────────────────

async fn start_player(
    State(state): State<SharedState>,
    Json(req): Json<StartPlayerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.id.trim().is_empty() || req.config_name.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Player ID and config name are required".to_string(),
        ));
    }

    let record = state.manager.start(&req.id, &req.config_name).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn get_players(
    State(state): State<SharedState>,
    Query(query): Query<IdQuery>,
) -> Result<Response, ApiError> {
    match query.id {
        Some(id) => {
            let record = state.manager.get(&id).await?;
            Ok(Json(record).into_response())
        }
        None => Ok(Json(state.manager.list().await).into_response()),
    }
}

async fn stop_player(
    State(state): State<SharedState>,
    Query(query): Query<IdQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let id = query
        .id
        .ok_or_else(|| ApiError::BadRequest("Player ID is required".to_string()))?;

    state.manager.stop(&id).await?;
    Ok(Json(serde_json::json!({
        "message": format!("Player {id} stopped")
    })))
}

// ── Configuration handlers ────────────────────────────────────────────

async fn get_configs(
    State(state): State<SharedState>,
    Query(query): Query<NameQuery>,
) -> Result<Response, ApiError> {
    let store = state.manager.store();
    match query.name {
        Some(name) => Ok(Json(store.load(&name)?).into_response()),
        None => Ok(Json(store.list()?).into_response()),
    }
}

async fn save_config(
    State(state): State<SharedState>,
    Json(req): Json<SaveConfigRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Configuration name is required".to_string(),
        ));
    }
    req.config
        .validate()
        .map_err(ApiError::BadRequest)?;

    state.manager.store().save(&req.name, &req.config)?;
    Ok(Json(serde_json::json!({
        "message": format!("Configuration '{}' saved", req.name)
    })))
}

async fn delete_config(
    State(state): State<SharedState>,
    Query(query): Query<NameQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let name = query
        .name
        .ok_or_else(|| ApiError::BadRequest("Configuration name is required".to_string()))?;

    state.manager.store().delete(&name)?;
    Ok(Json(serde_json::json!({
        "message": format!("Configuration '{name}' deleted")
    })))
}

// ── Server bootstrap ──────────────────────────────────────────────────

/// Build the manager application router.
pub fn build_router(state: SharedState) -> Router {
    api_router()
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Run the manager server until ctrl-c, then tear down every instance.
pub async fn serve(host: &str, port: u16, state: SharedState) -> anyhow::Result<()> {
    use anyhow::Context;

    let app = build_router(state.clone());
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    info!("wolfpack manager listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    state.manager.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown requested");
}
