use super::SessionId;
use std::collections::{HashMap, HashSet};

/// Room membership bookkeeping. Rooms exist while they have members.
#[derive(Debug, Default)]
pub struct Rooms {
    rooms: HashMap<String, HashSet<SessionId>>,
}

impl Rooms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a member, creating the room if needed. Returns the member count.
    pub fn join(&mut self, room_id: &str, session: SessionId) -> usize {
        let members = self.rooms.entry(room_id.to_string()).or_default();
        members.insert(session);
        members.len()
    }

    /// Removes a member. Returns the remaining count if the session was a member.
    /// An emptied room is dropped.
    pub fn leave(&mut self, room_id: &str, session: SessionId) -> Option<usize> {
        let members = self.rooms.get_mut(room_id)?;
        if !members.remove(&session) {
            return None;
        }
        let remaining = members.len();
        if remaining == 0 {
            self.rooms.remove(room_id);
        }
        Some(remaining)
    }

    pub fn members(&self, room_id: &str) -> impl Iterator<Item = &SessionId> {
        self.rooms.get(room_id).into_iter().flatten()
    }

    pub fn member_count(&self, room_id: &str) -> usize {
        self.rooms.get(room_id).map_or(0, HashSet::len)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
