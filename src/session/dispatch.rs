use crate::error::GameError;
use crate::game::core::messages::{ClientMessage, EventBody, ServerEvent};
use crate::game::engine::GameService;
use crate::hub::{Hub, SessionHandle};
use chrono::Utc;
use tracing::debug;

/// Everything the inbound duty needs to act for one connected user.
#[derive(Clone)]
pub struct ConnectionContext {
    pub session: SessionHandle,
    pub hub: Hub,
    pub games: GameService,
}

impl ConnectionContext {
    pub fn new(session: SessionHandle, hub: Hub, games: GameService) -> Self {
        Self {
            session,
            hub,
            games,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.session.user_id
    }

    /// Handle one decoded message. Errors belong to this session alone.
    pub async fn dispatch(&self, msg: ClientMessage) -> Result<(), GameError> {
        match msg {
            ClientMessage::Ping => {
                self.session.mailbox.reply(ServerEvent::new(EventBody::Pong));
            }
            ClientMessage::CreateGame { creator_id } => {
                self.games.create_game(&self.session, &creator_id).await?;
            }
            ClientMessage::JoinGame { game_id, joiner_id } => {
                self.games
                    .join_game(&self.session, &game_id, &joiner_id)
                    .await?;
            }
            ClientMessage::MakeMove {
                game_id,
                player_id,
                row,
                col,
            } => {
                self.games
                    .make_move(&self.session, &game_id, &player_id, row, col)
                    .await?;
            }
            ClientMessage::Chat {
                room_id,
                content,
                subtype,
            } => {
                if content.trim().is_empty() {
                    return Err(GameError::Validation("chat content is empty".to_string()));
                }
                if self.hub.room_of(self.session.id).await.as_deref() != Some(room_id.as_str()) {
                    return Err(GameError::InvalidState(format!("not a member of room {room_id}")));
                }
                let event = ServerEvent::in_room(
                    EventBody::ChatMessage {
                        user_id: self.user_id().to_string(),
                        content,
                        subtype,
                        timestamp: Utc::now().timestamp(),
                    },
                    room_id.as_str(),
                );
                self.hub.broadcast(event, Some(room_id.as_str()))?;
            }
            ClientMessage::JoinRoom { room_id } => {
                let members = self.hub.join_room(&room_id, self.session.id).await?;
                self.session.mailbox.reply(ServerEvent::in_room(
                    EventBody::RoomUpdate {
                        room_id: room_id.clone(),
                        members,
                    },
                    room_id,
                ));
            }
            ClientMessage::LeaveRoom { room_id } => {
                self.hub.leave_room(&room_id, self.session.id).await;
            }
        }
        Ok(())
    }

    pub fn reply_error(&self, err: &GameError) {
        debug!(user_id = self.user_id(), code = err.code(), %err, "Request rejected");
        self.session.mailbox.reply(ServerEvent::error(err));
    }
}
