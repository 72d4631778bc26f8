use super::rooms::Rooms;
use super::{SessionHandle, SessionId};
use crate::error::GameError;
use crate::game::core::messages::{EventBody, ServerEvent};
use crate::session::mailbox::DeliveryError;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc, oneshot};
use tracing::{debug, info, warn};

pub(super) enum HubCommand {
    Register {
        session: SessionHandle,
        ack: oneshot::Sender<()>,
    },
    Unregister {
        session_id: SessionId,
        ack: oneshot::Sender<()>,
    },
    JoinRoom {
        room_id: String,
        session_id: SessionId,
        ack: oneshot::Sender<Result<usize, GameError>>,
    },
    LeaveRoom {
        room_id: String,
        session_id: SessionId,
        ack: oneshot::Sender<()>,
    },
    Broadcast {
        event: Arc<ServerEvent>,
        room_id: Option<String>,
    },
}

/// An event waiting to be fanned out
struct Notice {
    event: Arc<ServerEvent>,
    /// `None` targets every live session
    room_id: Option<String>,
    exclude: Option<SessionId>,
}

impl Notice {
    fn to_room(room_id: &str, body: EventBody, exclude: Option<SessionId>) -> Self {
        Self {
            event: Arc::new(ServerEvent::in_room(body, room_id)),
            room_id: Some(room_id.to_string()),
            exclude,
        }
    }
}

struct LiveSession {
    handle: SessionHandle,
    room: Option<String>,
}

/// Live sessions and room memberships. Written only by the Hub loop.
#[derive(Default)]
pub(super) struct HubState {
    sessions: HashMap<SessionId, LiveSession>,
    rooms: Rooms,
}

impl HubState {
    pub(super) fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub(super) fn room_member_count(&self, room_id: &str) -> usize {
        self.rooms.member_count(room_id)
    }

    pub(super) fn room_count(&self) -> usize {
        self.rooms.room_count()
    }

    pub(super) fn room_of(&self, session_id: SessionId) -> Option<&str> {
        self.sessions.get(&session_id)?.room.as_deref()
    }

    fn register(&mut self, handle: SessionHandle) {
        if self.sessions.contains_key(&handle.id) {
            return;
        }
        info!(session_id = %handle.id, user_id = %handle.user_id, "Session registered");
        self.sessions
            .insert(handle.id, LiveSession { handle, room: None });
    }

    /// Drops the session, closes its mailbox and tells its room.
    fn remove_session(&mut self, session_id: SessionId) -> Option<Notice> {
        let session = self.sessions.remove(&session_id)?;
        session.handle.mailbox.close();
        info!(%session_id, user_id = %session.handle.user_id, "Session unregistered");

        let room_id = session.room?;
        self.rooms.leave(&room_id, session_id)?;
        Some(Notice::to_room(
            &room_id,
            EventBody::PlayerLeave {
                user_id: session.handle.user_id,
            },
            None,
        ))
    }

    fn join_room(
        &mut self,
        room_id: &str,
        session_id: SessionId,
    ) -> Result<(usize, Vec<Notice>), GameError> {
        let mut notices = Vec::new();
        let current = self
            .sessions
            .get(&session_id)
            .ok_or_else(|| GameError::NotFound(format!("session {session_id}")))?
            .room
            .clone();

        match current {
            Some(room) if room == room_id => {
                return Ok((self.rooms.member_count(room_id), notices));
            }
            Some(room) => notices.extend(self.leave_room(&room, session_id)),
            None => {}
        }

        let Some(session) = self.sessions.get_mut(&session_id) else {
            return Err(GameError::NotFound(format!("session {session_id}")));
        };
        session.room = Some(room_id.to_string());
        let members = self.rooms.join(room_id, session_id);
        debug!(room_id, %session_id, members, "Joined room");

        notices.push(Notice::to_room(
            room_id,
            EventBody::PlayerJoin {
                user_id: session.handle.user_id.clone(),
            },
            Some(session_id),
        ));
        Ok((members, notices))
    }

    fn leave_room(&mut self, room_id: &str, session_id: SessionId) -> Option<Notice> {
        let session = self.sessions.get_mut(&session_id)?;
        if session.room.as_deref() != Some(room_id) {
            return None;
        }
        session.room = None;
        let remaining = self.rooms.leave(room_id, session_id)?;
        debug!(room_id, %session_id, remaining, "Left room");

        (remaining > 0).then(|| {
            Notice::to_room(
                room_id,
                EventBody::PlayerLeave {
                    user_id: session.handle.user_id.clone(),
                },
                None,
            )
        })
    }

    /// Enqueue to every target mailbox. Returns the sessions whose mailbox was full.
    fn fan_out(&self, notice: &Notice) -> Vec<SessionId> {
        let targets: Vec<&SessionId> = match &notice.room_id {
            Some(room_id) => self.rooms.members(room_id).collect(),
            None => self.sessions.keys().collect(),
        };

        let mut stalled = Vec::new();
        let mut recipients = 0usize;
        for id in targets {
            if notice.exclude == Some(*id) {
                continue;
            }
            let Some(session) = self.sessions.get(id) else {
                continue;
            };
            match session.handle.mailbox.try_deliver(notice.event.clone()) {
                Ok(()) => recipients += 1,
                Err(DeliveryError::Full) => stalled.push(*id),
                // Already closing; its unregister is on the way
                Err(DeliveryError::Closed) => {}
            }
        }

        debug!(
            kind = notice.event.kind(),
            room_id = ?notice.room_id,
            recipients,
            stalled = stalled.len(),
            "Broadcast event"
        );
        stalled
    }
}

/// The Hub's single serialized processing loop.
pub struct HubRunner {
    pub(super) commands: mpsc::Receiver<HubCommand>,
    pub(super) state: Arc<RwLock<HubState>>,
}

impl HubRunner {
    /// Runs until every `Hub` handle is dropped.
    pub async fn run(mut self) {
        info!("Hub loop started");
        while let Some(command) = self.commands.recv().await {
            self.apply(command).await;
        }
        info!("Hub loop stopped");
    }

    async fn apply(&self, command: HubCommand) {
        match command {
            HubCommand::Register { session, ack } => {
                self.state.write().await.register(session);
                let _ = ack.send(());
            }
            HubCommand::Unregister { session_id, ack } => {
                let notice = self.state.write().await.remove_session(session_id);
                self.deliver(notice.into_iter().collect()).await;
                let _ = ack.send(());
            }
            HubCommand::JoinRoom {
                room_id,
                session_id,
                ack,
            } => {
                let result = self.state.write().await.join_room(&room_id, session_id);
                let reply = match result {
                    Ok((members, notices)) => {
                        self.deliver(notices.into()).await;
                        Ok(members)
                    }
                    Err(err) => Err(err),
                };
                let _ = ack.send(reply);
            }
            HubCommand::LeaveRoom {
                room_id,
                session_id,
                ack,
            } => {
                let notice = self.state.write().await.leave_room(&room_id, session_id);
                self.deliver(notice.into_iter().collect()).await;
                let _ = ack.send(());
            }
            HubCommand::Broadcast { event, room_id } => {
                self.deliver(VecDeque::from([Notice {
                    event,
                    room_id,
                    exclude: None,
                }]))
                .await;
            }
        }
    }

    /// Fan out under the read lock; force-disconnect stalled sessions under the
    /// write lock. Their leave notices go through the same path.
    async fn deliver(&self, mut pending: VecDeque<Notice>) {
        while let Some(notice) = pending.pop_front() {
            let stalled = self.state.read().await.fan_out(&notice);
            if stalled.is_empty() {
                continue;
            }

            let mut state = self.state.write().await;
            for session_id in stalled {
                warn!(%session_id, kind = notice.event.kind(), "Mailbox full, disconnecting stalled session");
                pending.extend(state.remove_session(session_id));
            }
        }
    }
}
