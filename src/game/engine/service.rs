use super::registry::GameRegistry;
use super::repository::GameRepository;
use crate::error::GameError;
use crate::game::core::messages::{EventBody, ServerEvent};
use crate::game::core::state::project;
use crate::game::core::{Board, GameState, GameStatus};
use crate::hub::{Hub, SessionHandle};
use std::sync::Arc;
use tracing::{debug, warn};

/// Runs game requests from sessions: engine first, then fan-out, then a
/// background save. Engine errors go back to the caller only.
#[derive(Clone)]
pub struct GameService {
    registry: Arc<GameRegistry>,
    repository: GameRepository,
    hub: Hub,
}

fn ensure_self(session: &SessionHandle, claimed: &str, field: &str) -> Result<(), GameError> {
    if claimed != session.user_id {
        return Err(GameError::Validation(format!(
            "{field} does not match the authenticated user"
        )));
    }
    Ok(())
}

impl GameService {
    pub fn new(registry: Arc<GameRegistry>, repository: GameRepository, hub: Hub) -> Self {
        Self {
            registry,
            repository,
            hub,
        }
    }

    pub fn registry(&self) -> &GameRegistry {
        &self.registry
    }

    pub async fn create_game(
        &self,
        session: &SessionHandle,
        creator_id: &str,
    ) -> Result<GameState, GameError> {
        ensure_self(session, creator_id, "creator_id")?;

        let game = self.registry.create(creator_id);
        self.enter_room(session, game.id()).await;
        self.publish(ServerEvent::game_state(&game), game.id());
        self.persist(&game);
        Ok(game.clone())
    }

    pub async fn join_game(
        &self,
        session: &SessionHandle,
        game_id: &str,
        joiner_id: &str,
    ) -> Result<GameState, GameError> {
        ensure_self(session, joiner_id, "joiner_id")?;
        self.ensure_loaded(game_id).await?;

        let game = self.registry.join(game_id, joiner_id).await?;
        self.enter_room(session, game_id).await;
        self.publish(
            ServerEvent::in_room(
                EventBody::GameStart {
                    game_id: game_id.to_string(),
                    player_x: game.player1().to_string(),
                    player_o: joiner_id.to_string(),
                    next_turn: game.next_turn().to_string(),
                },
                game_id,
            ),
            game_id,
        );
        self.publish(ServerEvent::game_state(&game), game_id);
        self.persist(&game);
        Ok(game.clone())
    }

    pub async fn make_move(
        &self,
        session: &SessionHandle,
        game_id: &str,
        player_id: &str,
        row: i32,
        col: i32,
    ) -> Result<GameState, GameError> {
        ensure_self(session, player_id, "player_id")?;
        self.ensure_loaded(game_id).await?;

        let (outcome, game) = self.registry.make_move(game_id, player_id, row, col).await?;
        self.publish(
            ServerEvent::in_room(
                EventBody::GameMove {
                    game_id: game_id.to_string(),
                    mv: outcome.mv,
                },
                game_id,
            ),
            game_id,
        );
        self.publish(ServerEvent::game_state(&game), game_id);
        if let Some(winner) = outcome.finished {
            self.publish(
                ServerEvent::in_room(
                    EventBody::GameEnd {
                        game_id: game_id.to_string(),
                        winner,
                    },
                    game_id,
                ),
                game_id,
            );
        }
        self.persist(&game);
        Ok(game.clone())
    }

    /// Live snapshot, else the stored copy.
    pub async fn snapshot(&self, game_id: &str) -> Result<GameState, GameError> {
        if let Some(game) = self.registry.get(game_id).await {
            return Ok(game);
        }
        self.load_stored(game_id).await
    }

    /// Board after the first `step` moves, clamped to the moves played.
    pub async fn replay(&self, game_id: &str, step: usize) -> Result<Board, GameError> {
        match self.registry.replay(game_id, step).await {
            Err(GameError::NotFound(_)) => {
                let game = self.load_stored(game_id).await?;
                Ok(project(game.moves(), step))
            }
            result => result,
        }
    }

    async fn load_stored(&self, game_id: &str) -> Result<GameState, GameError> {
        match self.repository.load(game_id).await {
            Ok(Some(game)) => Ok(game),
            Ok(None) => Err(GameError::NotFound(format!("game {game_id}"))),
            Err(err) => {
                warn!(game_id, %err, "Failed to load game");
                Err(GameError::NotFound(format!("game {game_id}")))
            }
        }
    }

    /// Bring a stored game back under engine control if it is not live.
    /// Finished games stay in storage; nothing can change them.
    async fn ensure_loaded(&self, game_id: &str) -> Result<(), GameError> {
        if self.registry.contains(game_id) {
            return Ok(());
        }
        match self.load_stored(game_id).await {
            Ok(game) if game.status() == GameStatus::Finished => Err(GameError::InvalidState(
                format!("game {game_id} is not active"),
            )),
            Ok(game) => {
                self.registry.restore(game);
                Ok(())
            }
            // The engine reports the missing game
            Err(_) => Ok(()),
        }
    }

    /// Join the game's room and tell the caller how full it is. The engine
    /// change is already made, so a session that has gone away is only logged.
    async fn enter_room(&self, session: &SessionHandle, room_id: &str) {
        match self.hub.join_room(room_id, session.id).await {
            Ok(members) => session.mailbox.reply(ServerEvent::in_room(
                EventBody::RoomUpdate {
                    room_id: room_id.to_string(),
                    members,
                },
                room_id,
            )),
            Err(err) => debug!(room_id, session_id = %session.id, %err, "Room not joined"),
        }
    }

    fn publish(&self, event: ServerEvent, room_id: &str) {
        // A full intake queue is already logged by the hub; the next
        // game_state supersedes anything dropped
        let _ = self.hub.broadcast(event, Some(room_id));
    }

    /// Save in the background. A finished game leaves memory once its final
    /// state is stored; reads fall back to storage from then on.
    fn persist(&self, game: &GameState) {
        let repository = self.repository.clone();
        let registry = self.registry.clone();
        let game = game.clone();
        tokio::spawn(async move {
            match repository.save(&game).await {
                Ok(()) => {
                    debug!(game_id = game.id(), version = game.version(), "Game saved");
                    if game.status() == GameStatus::Finished {
                        registry.evict(game.id());
                    }
                }
                Err(err) => warn!(game_id = game.id(), %err, "Failed to save game"),
            }
        });
    }
}
