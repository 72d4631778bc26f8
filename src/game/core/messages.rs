use super::board::Board;
use super::state::{GameState, GameStatus, Move};
use crate::error::GameError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatSubtype {
    #[default]
    Text,
    Emoji,
    Gift,
}

/// Inbound frames, tagged by `kind`.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClientMessage {
    // Game lifecycle
    CreateGame {
        creator_id: String,
    },
    JoinGame {
        game_id: String,
        joiner_id: String,
    },
    #[serde(alias = "move")]
    MakeMove {
        game_id: String,
        player_id: String,
        row: i32,
        col: i32,
    },

    // Rooms and chat
    Chat {
        room_id: String,
        content: String,
        #[serde(default)]
        subtype: ChatSubtype,
    },
    JoinRoom {
        room_id: String,
    },
    LeaveRoom {
        room_id: String,
    },

    // Liveness
    Ping,
}

impl ClientMessage {
    const KINDS: &'static [&'static str] = &[
        "create_game",
        "join_game",
        "make_move",
        "move",
        "chat",
        "join_room",
        "leave_room",
        "ping",
    ];

    /// Decode one text frame.
    ///
    /// `Ok(None)` means a well-formed frame of a kind we do not handle; those are
    /// dropped silently. A known kind with bad fields is a validation error.
    pub fn decode(text: &str) -> Result<Option<Self>, GameError> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| GameError::Validation(e.to_string()))?;

        let Some(kind) = value.get("kind").and_then(|k| k.as_str()) else {
            return Ok(None);
        };
        if !Self::KINDS.contains(&kind) {
            return Ok(None);
        }

        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| GameError::Validation(e.to_string()))
    }
}

/// Full view of a game as broadcast in `game_state`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameStatePayload {
    pub game_id: String,
    pub board: Board,
    pub current_turn: String,
    pub status: GameStatus,
    pub winner: Option<String>,
    pub player_x: String,
    pub player_o: Option<String>,
    pub move_count: usize,
}

impl From<&GameState> for GameStatePayload {
    fn from(game: &GameState) -> Self {
        Self {
            game_id: game.id().to_string(),
            board: game.board().clone(),
            current_turn: game.next_turn().to_string(),
            status: game.status(),
            winner: game.winner().map(str::to_string),
            player_x: game.player1().to_string(),
            player_o: game.player2().map(str::to_string),
            move_count: game.moves().len(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum EventBody {
    // Game flow
    GameState(GameStatePayload),
    GameStart {
        game_id: String,
        player_x: String,
        player_o: String,
        next_turn: String,
    },
    GameEnd {
        game_id: String,
        winner: Option<String>,
    },
    GameMove {
        game_id: String,
        #[serde(rename = "move")]
        mv: Move,
    },

    // Rooms
    RoomUpdate {
        room_id: String,
        members: usize,
    },
    PlayerJoin {
        user_id: String,
    },
    PlayerLeave {
        user_id: String,
    },
    ChatMessage {
        user_id: String,
        content: String,
        subtype: ChatSubtype,
        timestamp: i64,
    },

    // System
    Error {
        code: String,
        message: String,
    },
    Ping,
    Pong,
}

/// Outbound envelope: `{ kind, room_id?, payload }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerEvent {
    #[serde(flatten)]
    pub body: EventBody,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
}

impl ServerEvent {
    pub fn new(body: EventBody) -> Self {
        Self {
            body,
            room_id: None,
        }
    }

    pub fn in_room(body: EventBody, room_id: impl Into<String>) -> Self {
        Self {
            body,
            room_id: Some(room_id.into()),
        }
    }

    pub fn game_state(game: &GameState) -> Self {
        Self::in_room(EventBody::GameState(game.into()), game.id())
    }

    pub fn error(err: &GameError) -> Self {
        Self::new(EventBody::Error {
            code: err.code().to_string(),
            message: err.to_string(),
        })
    }

    /// Wire name of the event kind, for logs.
    pub fn kind(&self) -> &'static str {
        match self.body {
            EventBody::GameState(_) => "game_state",
            EventBody::GameStart { .. } => "game_start",
            EventBody::GameEnd { .. } => "game_end",
            EventBody::GameMove { .. } => "game_move",
            EventBody::RoomUpdate { .. } => "room_update",
            EventBody::PlayerJoin { .. } => "player_join",
            EventBody::PlayerLeave { .. } => "player_leave",
            EventBody::ChatMessage { .. } => "chat_message",
            EventBody::Error { .. } => "error",
            EventBody::Ping => "ping",
            EventBody::Pong => "pong",
        }
    }
}
