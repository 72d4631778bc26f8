use crate::error::GameError;
use crate::game::core::game_id::new_game_id;
use crate::game::core::{Board, GameState, MoveOutcome};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

type SharedGame = Arc<Mutex<GameState>>;

/// A game held under its lock. Events queued before the guard drops reach the
/// hub ahead of any later change to the same game.
pub type LockedGame = OwnedMutexGuard<GameState>;

/// Every live game, each behind its own lock.
///
/// The map lock is only held to look a game up; all validation and mutation
/// happens under the per-game lock so games never wait on each other.
#[derive(Default)]
pub struct GameRegistry {
    games: DashMap<String, SharedGame>,
}

impl GameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lookup(&self, game_id: &str) -> Result<SharedGame, GameError> {
        self.games
            .get(game_id)
            .map(|game| game.clone())
            .ok_or_else(|| GameError::NotFound(format!("game {game_id}")))
    }

    pub fn contains(&self, game_id: &str) -> bool {
        self.games.contains_key(game_id)
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }

    /// New game in `Waiting`, with the creator to move first. It is locked
    /// before anyone else can look it up.
    pub fn create(&self, creator_id: &str) -> LockedGame {
        loop {
            let id = new_game_id(|id| self.games.contains_key(id));
            // Another create may have claimed the same id in between
            if let Entry::Vacant(slot) = self.games.entry(id.clone()) {
                let game = Arc::new(Mutex::new(GameState::new(id, creator_id)));
                let Ok(locked) = game.clone().try_lock_owned() else {
                    continue;
                };
                slot.insert(game);
                info!(game_id = locked.id(), creator_id, "Game created");
                return locked;
            }
        }
    }

    /// Put a previously persisted game back under engine control.
    /// A game already live in memory wins over the stored copy.
    pub fn restore(&self, game: GameState) {
        if let Entry::Vacant(slot) = self.games.entry(game.id().to_string()) {
            debug!(game_id = game.id(), version = game.version(), "Game restored");
            slot.insert(Arc::new(Mutex::new(game)));
        }
    }

    /// Drop a game from memory. Requests already waiting on its lock still
    /// see its final state.
    pub fn evict(&self, game_id: &str) -> bool {
        let evicted = self.games.remove(game_id).is_some();
        if evicted {
            debug!(game_id, "Game evicted");
        }
        evicted
    }

    pub async fn join(&self, game_id: &str, joiner_id: &str) -> Result<LockedGame, GameError> {
        let mut game = self.lookup(game_id)?.lock_owned().await;
        game.join(joiner_id)?;
        info!(game_id, joiner_id, "Player joined game");
        Ok(game)
    }

    /// Validate and apply one move. Returns the outcome with the game still locked.
    pub async fn make_move(
        &self,
        game_id: &str,
        player_id: &str,
        row: i32,
        col: i32,
    ) -> Result<(MoveOutcome, LockedGame), GameError> {
        let mut game = self.lookup(game_id)?.lock_owned().await;
        let outcome = game.make_move(player_id, row, col)?;
        debug!(game_id, player_id, row, col, "Move accepted");
        if let Some(winner) = &outcome.finished {
            info!(game_id, ?winner, moves = game.moves().len(), "Game finished");
        }
        Ok((outcome, game))
    }

    /// Read-only snapshot.
    pub async fn get(&self, game_id: &str) -> Option<GameState> {
        let game = self.lookup(game_id).ok()?;
        let snapshot = game.lock().await.clone();
        Some(snapshot)
    }

    /// Board after the first `step` moves, clamped to the moves played so far.
    pub async fn replay(&self, game_id: &str, step: usize) -> Result<Board, GameError> {
        let game = self.lookup(game_id)?;
        let game = game.lock().await;
        Ok(game.replay(step.min(game.moves().len())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::core::{GameStatus, Symbol};
    use std::collections::HashSet;

    async fn active_game(registry: &GameRegistry) -> String {
        let id = registry.create("alice").id().to_string();
        registry.join(&id, "bob").await.unwrap();
        id
    }

    #[tokio::test]
    async fn create_then_join() {
        let registry = GameRegistry::new();
        let game = registry.create("alice").clone();
        assert_eq!(game.status(), GameStatus::Waiting);
        assert_eq!(game.next_turn(), "alice");

        let joined = registry.join(game.id(), "bob").await.unwrap();
        assert_eq!(joined.status(), GameStatus::Active);
        assert_eq!(joined.next_turn(), "alice");
        assert_eq!(joined.player2(), Some("bob"));
    }

    #[tokio::test]
    async fn unknown_game_is_not_found() {
        let registry = GameRegistry::new();
        assert_eq!(
            registry.join("nope", "bob").await.unwrap_err().code(),
            "not_found"
        );
        assert_eq!(
            registry.make_move("nope", "bob", 0, 0).await.unwrap_err().code(),
            "not_found"
        );
        assert!(registry.get("nope").await.is_none());
    }

    #[tokio::test]
    async fn second_join_is_rejected() {
        let registry = GameRegistry::new();
        let id = active_game(&registry).await;
        let err = registry.join(&id, "carol").await.unwrap_err();
        assert_eq!(err.code(), "invalid_state");
    }

    #[tokio::test]
    async fn failed_move_leaves_game_untouched() {
        let registry = GameRegistry::new();
        let id = active_game(&registry).await;
        registry.make_move(&id, "alice", 7, 7).await.unwrap();
        let before = registry.get(&id).await.unwrap();

        assert_eq!(
            registry.make_move(&id, "alice", 0, 0).await.unwrap_err(),
            GameError::OutOfTurn
        );
        assert_eq!(
            registry.make_move(&id, "bob", 7, 7).await.unwrap_err(),
            GameError::CellOccupied { row: 7, col: 7 }
        );
        assert_eq!(registry.get(&id).await.unwrap(), before);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_moves_on_same_cell_accept_exactly_one() {
        let registry = Arc::new(GameRegistry::new());
        let id = active_game(&registry).await;

        let attempts: Vec<_> = (0..16)
            .map(|_| {
                let registry = registry.clone();
                let id = id.clone();
                tokio::spawn(async move {
                    registry.make_move(&id, "alice", 3, 3).await.map(|_| ())
                })
            })
            .collect();

        let mut accepted = 0;
        for attempt in attempts {
            if attempt.await.unwrap().is_ok() {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 1);

        let game = registry.get(&id).await.unwrap();
        assert_eq!(game.moves().len(), 1);
        assert_eq!(game.board().get(3, 3), Some(Symbol::X));
        assert_eq!(game.next_turn(), "bob");
    }

    #[tokio::test]
    async fn replay_clamps_step() {
        let registry = GameRegistry::new();
        let id = active_game(&registry).await;
        registry.make_move(&id, "alice", 7, 7).await.unwrap();
        registry.make_move(&id, "bob", 0, 0).await.unwrap();

        let empty = registry.replay(&id, 0).await.unwrap();
        assert_eq!(empty.filled_count(), 0);
        let first = registry.replay(&id, 1).await.unwrap();
        assert_eq!(first.get(7, 7), Some(Symbol::X));
        assert_eq!(first.get(0, 0), None);
        let all = registry.replay(&id, 99).await.unwrap();
        assert_eq!(&all, registry.get(&id).await.unwrap().board());
    }

    #[tokio::test]
    async fn restore_does_not_clobber_live_game() {
        let registry = GameRegistry::new();
        let id = active_game(&registry).await;
        registry.make_move(&id, "alice", 7, 7).await.unwrap();

        registry.restore(GameState::new(id.clone(), "mallory"));
        assert_eq!(registry.get(&id).await.unwrap().player1(), "alice");

        let stored = GameState::new("stored", "dave");
        registry.restore(stored.clone());
        assert_eq!(registry.get("stored").await, Some(stored));
    }

    #[tokio::test]
    async fn change_is_not_visible_until_lock_is_released() {
        let registry = Arc::new(GameRegistry::new());
        let id = active_game(&registry).await;

        let (_, locked) = registry.make_move(&id, "alice", 7, 7).await.unwrap();
        let next = tokio::spawn({
            let registry = registry.clone();
            let id = id.clone();
            async move { registry.make_move(&id, "bob", 8, 8).await.map(|_| ()) }
        });
        tokio::task::yield_now().await;
        assert!(!next.is_finished());
        assert_eq!(locked.moves().len(), 1);

        drop(locked);
        next.await.unwrap().unwrap();
        assert_eq!(registry.get(&id).await.unwrap().moves().len(), 2);
    }

    #[tokio::test]
    async fn evicted_game_is_no_longer_live() {
        let registry = GameRegistry::new();
        let id = active_game(&registry).await;

        assert!(registry.evict(&id));
        assert!(!registry.contains(&id));
        assert!(registry.is_empty());
        assert!(!registry.evict(&id));
        assert_eq!(
            registry.make_move(&id, "alice", 0, 0).await.unwrap_err().code(),
            "not_found"
        );
    }

    #[test]
    fn ids_are_unique_across_creates() {
        let registry = GameRegistry::new();
        let ids: HashSet<_> = (0..200)
            .map(|_| registry.create("alice").id().to_string())
            .collect();
        assert_eq!(ids.len(), 200);
        assert_eq!(registry.len(), 200);
    }
}
