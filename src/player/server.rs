//! HTTP surface of a single player instance.
//!
//! Mirrors the manager's layer shape: routes parse the body, consult the
//! stored game state, delegate to the decision service, and map failures to
//! status codes. The status route doubles as the manager's probe target, so
//! it must answer even before a game has started.

use std::sync::Arc;

use axum::{Json, Router, extract::State, response::IntoResponse, routing::post};
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::api::ApiError;
use crate::config::PlayerConfig;
use crate::player::decision::DecisionService;
use crate::player::types::{GameState, PlayerContext, PlayerStatus, RoleContext, StatusConfig};

pub struct PlayerState {
    config: PlayerConfig,
    decision: Arc<dyn DecisionService>,
    game: RwLock<Option<GameState>>,
}

pub type SharedPlayerState = Arc<PlayerState>;

impl PlayerState {
    pub fn new(config: PlayerConfig, decision: Arc<dyn DecisionService>) -> Self {
        Self {
            config,
            decision,
            game: RwLock::new(None),
        }
    }

    async fn game(&self) -> Result<GameState, ApiError> {
        self.game
            .read()
            .await
            .clone()
            .ok_or_else(|| ApiError::BadRequest("Game has not started".to_string()))
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn player_router() -> Router<SharedPlayerState> {
    Router::new()
        .route("/api/player/status", post(status))
        .route("/api/player/start-game", post(start_game))
        .route("/api/player/speak", post(speak))
        .route("/api/player/vote", post(vote))
        .route("/api/player/use-ability", post(use_ability))
        .route("/api/player/last-words", post(last_words))
}

async fn status(State(state): State<SharedPlayerState>) -> Json<PlayerStatus> {
    let game = state.game.read().await;
    Json(PlayerStatus {
        game_id: game.as_ref().map(|g| g.game_id.clone()),
        player_id: game.as_ref().map(|g| g.player_id),
        role: game.as_ref().map(|g| g.role),
        teammates: game.as_ref().map(|g| g.teammates.clone()).unwrap_or_default(),
        is_alive: true,
        config: StatusConfig {
            personality: state.config.game.personality.clone(),
        },
    })
}

async fn start_game(
    State(state): State<SharedPlayerState>,
    Json(assignment): Json<GameState>,
) -> impl IntoResponse {
    info!(
        game_id = %assignment.game_id,
        player_id = assignment.player_id,
        role = %assignment.role,
        "game started"
    );
    let summary = serde_json::json!({
        "message": "Game started",
        "gameId": assignment.game_id,
        "playerId": assignment.player_id,
        "role": assignment.role,
    });
    *state.game.write().await = Some(assignment);
    Json(summary)
}

async fn speak(
    State(state): State<SharedPlayerState>,
    Json(context): Json<PlayerContext>,
) -> Result<impl IntoResponse, ApiError> {
    let game = state.game().await?;
    let reply = state
        .decision
        .speak(&game, &context)
        .await
        .map_err(decision_error)?;
    Ok(Json(reply))
}

async fn vote(
    State(state): State<SharedPlayerState>,
    Json(context): Json<PlayerContext>,
) -> Result<impl IntoResponse, ApiError> {
    let game = state.game().await?;
    let reply = state
        .decision
        .vote(&game, &context)
        .await
        .map_err(decision_error)?;
    Ok(Json(reply))
}

async fn use_ability(
    State(state): State<SharedPlayerState>,
    Json(context): Json<RoleContext>,
) -> Result<impl IntoResponse, ApiError> {
    let game = state.game().await?;
    if context.role() != game.role {
        return Err(ApiError::BadRequest(format!(
            "Ability context is for role {}, but this player is a {}",
            context.role(),
            game.role
        )));
    }
    let action = state
        .decision
        .night_action(&game, &context)
        .await
        .map_err(decision_error)?;
    Ok(Json(action))
}

async fn last_words(
    State(state): State<SharedPlayerState>,
) -> Result<impl IntoResponse, ApiError> {
    let game = state.game().await?;
    let content = state
        .decision
        .last_words(&game)
        .await
        .map_err(decision_error)?;
    Ok(Json(serde_json::json!({ "content": content })))
}

fn decision_error(err: anyhow::Error) -> ApiError {
    warn!(error = %err, "decision failed");
    ApiError::Internal(err.to_string())
}

// ── Server bootstrap ──────────────────────────────────────────────────

pub fn build_router(state: SharedPlayerState) -> Router {
    player_router()
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Run the player server until ctrl-c.
///
/// `port_override` takes precedence over the configured port; the manager
/// always passes the allocated one.
pub async fn serve(
    config: PlayerConfig,
    decision: Arc<dyn DecisionService>,
    port_override: Option<u16>,
) -> anyhow::Result<()> {
    use anyhow::Context;

    let host = config.server.host.clone();
    let port = port_override.unwrap_or(config.server.port);
    let name = config.game.name.clone();

    let state = Arc::new(PlayerState::new(config, decision));
    let app = build_router(state);

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    info!(
        name,
        "player server listening on http://{}",
        listener.local_addr()?
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("Player server error")?;

    Ok(())
}
