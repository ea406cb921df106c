use std::collections::HashMap;

use super::{
    conn::{ConnId, Connection},
    RoomId,
};

/// Room membership. Only the hub task holds one.
///
/// A room entry exists only while it has members, and every connection is in
/// at most one room, the one it registered with.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<RoomId, HashMap<ConnId, Connection>>,
    room_of: HashMap<ConnId, RoomId>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `conn` to its room. Returns the connection back if it was already
    /// registered, leaving the registry untouched.
    pub fn register(&mut self, conn: Connection) -> Result<(), Connection> {
        let id = conn.id();
        if self.room_of.contains_key(&id) {
            return Err(conn);
        }

        let room = conn.room();
        self.room_of.insert(id, room);
        self.rooms.entry(room).or_default().insert(id, conn);
        Ok(())
    }

    /// Removes the connection, dropping its room when it was the last member.
    pub fn unregister(&mut self, id: ConnId) -> Option<Connection> {
        let room = self.room_of.remove(&id)?;
        let members = self.rooms.get_mut(&room)?;
        let conn = members.remove(&id);
        if members.is_empty() {
            self.rooms.remove(&room);
        }
        conn
    }

    pub fn members(&self, room: RoomId) -> impl Iterator<Item = &Connection> {
        self.rooms.get(&room).into_iter().flat_map(|members| members.values())
    }

    pub fn member_ids(&self, room: RoomId) -> Vec<ConnId> {
        let mut ids: Vec<ConnId> = self.members(room).map(Connection::id).collect();
        ids.sort();
        ids
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn connection_count(&self) -> usize {
        self.room_of.len()
    }

    /// Empties the registry, handing back every connection.
    pub fn drain(&mut self) -> impl Iterator<Item = Connection> + '_ {
        self.room_of.clear();
        self.rooms.drain().flat_map(|(_, members)| members.into_values())
    }
}
