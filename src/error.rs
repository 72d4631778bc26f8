use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Errors surfaced to a single requesting session (or HTTP caller).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("malformed request: {0}")]
    Validation(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("not your turn")]
    OutOfTurn,

    #[error("position ({row}, {col}) is outside the board")]
    OutOfBounds { row: i32, col: i32 },

    #[error("position ({row}, {col}) is already taken")]
    CellOccupied { row: usize, col: usize },

    #[error("{0} not found")]
    NotFound(String),

    #[error("unauthenticated")]
    Unauthenticated,

    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),
}

impl GameError {
    /// Stable machine-readable code carried in `error` event payloads.
    pub fn code(&self) -> &'static str {
        match self {
            GameError::Validation(_) => "validation_error",
            GameError::InvalidState(_) => "invalid_state",
            GameError::OutOfTurn => "out_of_turn",
            GameError::OutOfBounds { .. } => "out_of_bounds",
            GameError::CellOccupied { .. } => "cell_occupied",
            GameError::NotFound(_) => "not_found",
            GameError::Unauthenticated => "unauthenticated",
            GameError::ResourceExhausted(_) => "resource_exhausted",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            GameError::Validation(_)
            | GameError::OutOfBounds { .. } => StatusCode::BAD_REQUEST,
            GameError::InvalidState(_)
            | GameError::OutOfTurn
            | GameError::CellOccupied { .. } => StatusCode::CONFLICT,
            GameError::NotFound(_) => StatusCode::NOT_FOUND,
            GameError::Unauthenticated => StatusCode::UNAUTHORIZED,
            GameError::ResourceExhausted(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for GameError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "code": self.code(), "message": self.to_string() }));
        (self.status(), body).into_response()
    }
}

/// Failures of the persistence gateway. Logged, never shown to players.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt game record: {0}")]
    Encoding(#[from] serde_json::Error),
}
