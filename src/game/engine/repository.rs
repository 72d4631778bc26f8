use crate::error::RepositoryError;
use crate::game::core::GameState;
use sqlx::SqlitePool;

/// Durable copies of game records, stored as JSON documents.
#[derive(Clone)]
pub struct GameRepository {
    pool: SqlitePool,
}

impl GameRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Upsert. An older version never overwrites a newer one, so saves may
    /// land in any order.
    pub async fn save(&self, game: &GameState) -> Result<(), RepositoryError> {
        let state = serde_json::to_string(game)?;
        sqlx::query(
            "INSERT INTO games (id, state, version, updated_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                state = excluded.state,
                version = excluded.version,
                updated_at = excluded.updated_at
             WHERE excluded.version >= games.version",
        )
        .bind(game.id())
        .bind(state)
        .bind(game.version() as i64)
        .bind(game.updated_at().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn load(&self, game_id: &str) -> Result<Option<GameState>, RepositoryError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT state FROM games WHERE id = ?")
            .bind(game_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|(state,)| serde_json::from_str(&state))
            .transpose()
            .map_err(RepositoryError::from)
    }
}
