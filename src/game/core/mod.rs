pub mod board;
pub mod game_id;
pub mod messages;
pub mod state;

pub use board::{BOARD_SIZE, Board, Symbol};
pub use state::{GameState, GameStatus, Move, MoveOutcome};
