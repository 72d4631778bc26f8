use super::board::{Board, Symbol};
use crate::error::GameError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Waiting,
    Active,
    Finished,
}

/// One accepted move
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Move {
    pub player_id: String,
    pub row: usize,
    pub col: usize,
    pub symbol: Symbol,
    pub timestamp: DateTime<Utc>,
}

/// Result of an accepted move
#[derive(Debug, Clone, PartialEq)]
pub struct MoveOutcome {
    pub mv: Move,
    /// Set when the move ended the game. `Some(None)` is a draw on a full board.
    pub finished: Option<Option<String>>,
}

/// Authoritative record of one game (pure logic, no I/O).
///
/// `player1` created the game, plays `X` and always moves first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    id: String,
    board: Board,
    moves: Vec<Move>,
    status: GameStatus,
    player1: String,
    player2: Option<String>,
    next_turn: String,
    winner: Option<String>,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl GameState {
    pub fn new(id: impl Into<String>, creator: impl Into<String>) -> Self {
        let creator = creator.into();
        let now = Utc::now();
        Self {
            id: id.into(),
            board: Board::new(),
            moves: Vec::new(),
            status: GameStatus::Waiting,
            next_turn: creator.clone(),
            player1: creator,
            player2: None,
            winner: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn moves(&self) -> &[Move] {
        &self.moves
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn player1(&self) -> &str {
        &self.player1
    }

    pub fn player2(&self) -> Option<&str> {
        self.player2.as_deref()
    }

    pub fn next_turn(&self) -> &str {
        &self.next_turn
    }

    pub fn winner(&self) -> Option<&str> {
        self.winner.as_deref()
    }

    /// Monotonic mutation counter, used to order persisted snapshots.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn has_player(&self, player_id: &str) -> bool {
        self.player1 == player_id || self.player2.as_deref() == Some(player_id)
    }

    pub fn opponent_of(&self, player_id: &str) -> Option<&str> {
        if player_id == self.player1 {
            self.player2.as_deref()
        } else if self.player2.as_deref() == Some(player_id) {
            Some(&self.player1)
        } else {
            None
        }
    }

    /// Symbols are fixed for the game's lifetime: creator X, joiner O.
    pub fn symbol_of(&self, player_id: &str) -> Option<Symbol> {
        if player_id == self.player1 {
            Some(Symbol::X)
        } else if self.player2.as_deref() == Some(player_id) {
            Some(Symbol::O)
        } else {
            None
        }
    }

    /// Second player joins: Waiting -> Active. The creator keeps the first turn.
    pub fn join(&mut self, joiner: impl Into<String>) -> Result<(), GameError> {
        if self.status != GameStatus::Waiting {
            return Err(GameError::InvalidState(format!(
                "game {} is not waiting for players",
                self.id
            )));
        }
        let joiner = joiner.into();
        if joiner == self.player1 {
            return Err(GameError::InvalidState(
                "cannot join a game you created".to_string(),
            ));
        }

        self.player2 = Some(joiner);
        self.status = GameStatus::Active;
        self.touch();
        Ok(())
    }

    /// Validate and apply a move. Nothing is mutated on error.
    pub fn make_move(
        &mut self,
        player_id: &str,
        row: i32,
        col: i32,
    ) -> Result<MoveOutcome, GameError> {
        if self.status != GameStatus::Active {
            return Err(GameError::InvalidState(format!(
                "game {} is not active",
                self.id
            )));
        }
        if player_id != self.next_turn {
            return Err(GameError::OutOfTurn);
        }
        let (r, c) = Board::position(row, col).ok_or(GameError::OutOfBounds { row, col })?;
        if !self.board.is_empty_at(r, c) {
            return Err(GameError::CellOccupied { row: r, col: c });
        }
        let symbol = self.symbol_of(player_id).ok_or(GameError::OutOfTurn)?;

        // Keep timestamps non-decreasing even if the wall clock steps back
        let now = Utc::now();
        let timestamp = match self.moves.last() {
            Some(last) if last.timestamp > now => last.timestamp,
            _ => now,
        };

        let mv = Move {
            player_id: player_id.to_string(),
            row: r,
            col: c,
            symbol,
            timestamp,
        };
        self.board.place(r, c, symbol);
        self.moves.push(mv.clone());
        self.touch();

        let finished = if self.board.is_winning_move(r, c) {
            self.status = GameStatus::Finished;
            self.winner = Some(player_id.to_string());
            Some(self.winner.clone())
        } else if self.board.is_full() {
            self.status = GameStatus::Finished;
            Some(None)
        } else {
            if let Some(opponent) = self.opponent_of(player_id).map(str::to_string) {
                self.next_turn = opponent;
            }
            None
        };

        Ok(MoveOutcome { mv, finished })
    }

    /// Board as it stood after the first `step` accepted moves.
    pub fn replay(&self, step: usize) -> Board {
        project(&self.moves, step)
    }

    fn touch(&mut self) {
        self.version += 1;
        self.updated_at = Utc::now();
    }
}

/// Pure projection: applies `moves[0..step)` to an empty board.
/// Moves off the board or onto a taken cell can only come from a damaged
/// record and are skipped.
pub fn project(moves: &[Move], step: usize) -> Board {
    let mut board = Board::new();
    for mv in moves.iter().take(step) {
        if !board.try_place(mv.row, mv.col, mv.symbol) {
            warn!(row = mv.row, col = mv.col, "Skipping invalid move in replay");
        }
    }
    board
}
