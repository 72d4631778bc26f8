//! Connection Hub: the registry of live sessions and the only place room
//! membership changes. One loop applies commands in arrival order.

mod rooms;
mod runner;

pub use rooms::Rooms;
pub use runner::HubRunner;

use crate::error::GameError;
use crate::game::core::messages::ServerEvent;
use crate::session::mailbox::Mailbox;
use runner::{HubCommand, HubState};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{RwLock, mpsc, oneshot};
use tracing::warn;
use uuid::Uuid;

pub type SessionId = Uuid;

pub const DEFAULT_HUB_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Bound on queued commands. Broadcasts beyond it are dropped.
    pub queue_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_HUB_QUEUE_CAPACITY,
        }
    }
}

/// What the Hub knows about a connection: who it is and where to deliver.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub id: SessionId,
    pub user_id: String,
    pub mailbox: Mailbox,
}

impl SessionHandle {
    pub fn new(user_id: impl Into<String>, mailbox: Mailbox) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            mailbox,
        }
    }
}

/// Cloneable front door to the Hub loop.
#[derive(Clone)]
pub struct Hub {
    commands: mpsc::Sender<HubCommand>,
    state: Arc<RwLock<HubState>>,
}

impl Hub {
    /// The handle plus the loop that must be driven for it to do anything.
    pub fn new(config: HubConfig) -> (Hub, HubRunner) {
        let (commands, rx) = mpsc::channel(config.queue_capacity.max(1));
        let state = Arc::new(RwLock::new(HubState::default()));
        let runner = HubRunner {
            commands: rx,
            state: state.clone(),
        };
        (Hub { commands, state }, runner)
    }

    pub fn spawn(config: HubConfig) -> Hub {
        let (hub, runner) = Hub::new(config);
        tokio::spawn(runner.run());
        hub
    }

    /// Waits for queue space, then for the loop to apply the command.
    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> HubCommand) -> Option<T> {
        let (ack, done) = oneshot::channel();
        if self.commands.send(build(ack)).await.is_err() {
            warn!("Hub loop is not running");
            return None;
        }
        done.await.ok()
    }

    /// Idempotent.
    pub async fn register(&self, session: SessionHandle) {
        self.request(|ack| HubCommand::Register { session, ack })
            .await;
    }

    /// Removes the session from its room and closes its mailbox. Idempotent.
    pub async fn unregister(&self, session_id: SessionId) {
        self.request(|ack| HubCommand::Unregister { session_id, ack })
            .await;
    }

    /// Moves the session into `room_id`, leaving any previous room.
    /// Returns the member count after joining.
    pub async fn join_room(&self, room_id: &str, session_id: SessionId) -> Result<usize, GameError> {
        let room_id = room_id.to_string();
        self.request(|ack| HubCommand::JoinRoom {
            room_id,
            session_id,
            ack,
        })
        .await
        .unwrap_or_else(|| Err(GameError::InvalidState("hub is not running".to_string())))
    }

    /// No-op unless the session is in `room_id`.
    pub async fn leave_room(&self, room_id: &str, session_id: SessionId) {
        let room_id = room_id.to_string();
        self.request(|ack| HubCommand::LeaveRoom {
            room_id,
            session_id,
            ack,
        })
        .await;
    }

    /// Queue an event for a room, or for every session when `room_id` is `None`.
    ///
    /// Never waits. When the queue is full the event is dropped and
    /// `ResourceExhausted` is returned.
    pub fn broadcast(&self, event: ServerEvent, room_id: Option<&str>) -> Result<(), GameError> {
        let kind = event.kind();
        let command = HubCommand::Broadcast {
            event: Arc::new(event),
            room_id: room_id.map(str::to_string),
        };
        match self.commands.try_send(command) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                warn!(kind, room_id, "Hub queue full, dropping broadcast");
                Err(GameError::ResourceExhausted(
                    "broadcast queue is full".to_string(),
                ))
            }
            Err(TrySendError::Closed(_)) => {
                Err(GameError::InvalidState("hub is not running".to_string()))
            }
        }
    }

    pub async fn room_member_count(&self, room_id: &str) -> usize {
        self.state.read().await.room_member_count(room_id)
    }

    pub async fn room_of(&self, session_id: SessionId) -> Option<String> {
        self.state.read().await.room_of(session_id).map(str::to_string)
    }

    pub async fn session_count(&self) -> usize {
        self.state.read().await.session_count()
    }

    pub async fn room_count(&self) -> usize {
        self.state.read().await.room_count()
    }
}
