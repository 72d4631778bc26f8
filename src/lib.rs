pub mod auth;
pub mod config;
pub mod error;
pub mod game;
pub mod hub;
pub mod session;

pub use game::core::messages;

use auth::{TokenVerifier, token_from_request};
use axum::{
    Json, Router,
    extract::{Path, Query, State, WebSocketUpgrade},
    http::HeaderMap,
    response::Response,
    routing::get,
};
use config::Config;
use error::GameError;
use game::core::{Board, GameState};
use game::engine::{GameRegistry, GameRepository, GameService};
use hub::Hub;
use serde::{Deserialize, Serialize};
use session::{SessionConfig, run_connection};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

async fn health() -> &'static str {
    "ok"
}

#[derive(Clone)]
pub struct AppState {
    pub hub: Hub,
    pub games: GameService,
    pub verifier: TokenVerifier,
    pub session: SessionConfig,
    pub max_frame_bytes: usize,
}

#[derive(Debug, Deserialize)]
struct WsParams {
    token: Option<String>,
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    Query(params): Query<WsParams>,
    State(state): State<AppState>,
) -> Result<Response, GameError> {
    let token = token_from_request(&headers, params.token.as_deref())
        .ok_or(GameError::Unauthenticated)?;
    let user_id = state.verifier.verify(token)?;

    let AppState {
        hub,
        games,
        session,
        max_frame_bytes,
        ..
    } = state;
    Ok(ws
        .max_message_size(max_frame_bytes)
        .max_frame_size(max_frame_bytes)
        .on_upgrade(move |socket| run_connection(socket, user_id, hub, games, session)))
}

async fn get_game(
    Path(game_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<GameState>, GameError> {
    state.games.snapshot(&game_id).await.map(Json)
}

#[derive(Debug, Deserialize)]
struct ReplayParams {
    step: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReplayResponse {
    pub game_id: String,
    /// Moves applied, after clamping to the game's length
    pub step: usize,
    pub board: Board,
}

async fn replay_game(
    Path(game_id): Path<String>,
    Query(params): Query<ReplayParams>,
    State(state): State<AppState>,
) -> Result<Json<ReplayResponse>, GameError> {
    let board = state
        .games
        .replay(&game_id, params.step.unwrap_or(usize::MAX))
        .await?;
    Ok(Json(ReplayResponse {
        game_id,
        step: board.filled_count(),
        board,
    }))
}

pub fn app(pool: SqlitePool) -> Router {
    app_with_config(pool, &Config::default())
}

/// Builds the router and spawns the hub loop. Must run inside a Tokio runtime.
pub fn app_with_config(pool: SqlitePool, config: &Config) -> Router {
    let hub = Hub::spawn(config.hub.clone());
    let games = GameService::new(
        Arc::new(GameRegistry::new()),
        GameRepository::new(pool),
        hub.clone(),
    );
    info!(
        mailbox_capacity = config.session.mailbox_capacity,
        hub_queue_capacity = config.hub.queue_capacity,
        "Game hub ready"
    );
    let state = AppState {
        hub,
        games,
        verifier: TokenVerifier::new(&config.jwt_secret),
        session: config.session.clone(),
        max_frame_bytes: config.max_frame_bytes,
    };

    Router::new()
        .route("/health", get(health))
        .route("/ws", get(ws_handler))
        .route("/games/:game_id", get(get_game))
        .route("/games/:game_id/replay", get(replay_game))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    #[sqlx::test]
    async fn health_returns_ok(pool: SqlitePool) {
        let response = app(pool)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[sqlx::test]
    async fn unknown_game_is_404_with_code(pool: SqlitePool) {
        let response = app(pool)
            .oneshot(Request::builder().uri("/games/zzzzzz").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], "not_found");
    }

    #[sqlx::test]
    async fn unknown_replay_is_404(pool: SqlitePool) {
        let response = app(pool)
            .oneshot(
                Request::builder()
                    .uri("/games/zzzzzz/replay?step=3")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
