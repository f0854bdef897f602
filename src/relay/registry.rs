use std::collections::HashSet;

use axum::extract::ws::Message;
use dashmap::DashMap;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use uuid::Uuid;

struct Connection {
    tx: mpsc::UnboundedSender<Message>,
    user_id: Option<Uuid>,
}

/// Live-connection registry: connection-id to sender handle and bound user,
/// user-id back to connection-id, and room membership for chat scoping.
/// Entries are evicted on disconnect.
pub struct ConnectionRegistry {
    connections: DashMap<Uuid, Connection>,
    by_user: DashMap<Uuid, Uuid>,
    rooms: DashMap<String, HashSet<Uuid>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            by_user: DashMap::new(),
            rooms: DashMap::new(),
        }
    }

    pub fn register(&self, tx: mpsc::UnboundedSender<Message>) -> Uuid {
        let conn_id = Uuid::new_v4();
        self.connections.insert(conn_id, Connection { tx, user_id: None });
        conn_id
    }

    /// Associates the connection with an announced identity. A reconnecting
    /// user supersedes their previous mapping.
    pub fn bind_user(&self, conn_id: Uuid, user_id: Uuid) {
        if let Some(mut conn) = self.connections.get_mut(&conn_id) {
            if let Some(previous) = conn.user_id.replace(user_id) {
                self.by_user
                    .remove_if(&previous, |_, mapped| *mapped == conn_id);
            }
        }
        self.by_user.insert(user_id, conn_id);
    }

    /// Drops the connection and every index pointing at it; returns the user
    /// the connection was bound to, if any.
    pub fn unregister(&self, conn_id: Uuid) -> Option<Uuid> {
        let (_, conn) = self.connections.remove(&conn_id)?;

        if let Some(user_id) = conn.user_id {
            self.by_user
                .remove_if(&user_id, |_, mapped| *mapped == conn_id);
        }

        for mut room in self.rooms.iter_mut() {
            room.value_mut().remove(&conn_id);
        }

        conn.user_id
    }

    pub fn join_room(&self, room: &str, conn_id: Uuid) {
        self.rooms.entry(room.to_string()).or_default().insert(conn_id);
    }

    pub fn leave_room(&self, room: &str, conn_id: Uuid) {
        if let Some(mut members) = self.rooms.get_mut(room) {
            members.remove(&conn_id);
        }
    }

    pub fn connection_for(&self, user_id: Uuid) -> Option<Uuid> {
        self.by_user.get(&user_id).map(|entry| *entry.value())
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn send_to(&self, conn_id: Uuid, event: &str, data: &Value) -> bool {
        let Some(frame) = frame(event, data) else {
            return false;
        };
        match self.connections.get(&conn_id) {
            Some(conn) => conn.tx.send(frame).is_ok(),
            None => false,
        }
    }

    /// Pushes to every live connection; returns how many sends went through.
    pub fn broadcast(&self, event: &str, data: &Value) -> usize {
        let Some(frame) = frame(event, data) else {
            return 0;
        };
        self.connections
            .iter()
            .filter(|conn| conn.value().tx.send(frame.clone()).is_ok())
            .count()
    }

    pub fn send_room(&self, room: &str, event: &str, data: &Value) -> usize {
        let members: Vec<Uuid> = match self.rooms.get(room) {
            Some(members) => members.iter().copied().collect(),
            None => return 0,
        };

        members
            .into_iter()
            .filter(|conn_id| self.send_to(*conn_id, event, data))
            .count()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn frame(event: &str, data: &Value) -> Option<Message> {
    serde_json::to_string(&json!({ "event": event, "data": data }))
        .ok()
        .map(Message::Text)
}
