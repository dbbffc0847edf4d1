//! Per-user rooms for pushing events to live connections.
//!
//! A room is keyed by a user id and holds every connection that joined it.
//! Delivery is at most once: a user with no live connection simply misses the
//! push and catches up through the REST endpoints.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{chat::Message, users::PublicProfile};

/// Events written to a client socket, framed as `{"event": ..., "data": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Someone completed a mutual swipe with the recipient; carries their profile.
    MatchFound(PublicProfile),
    /// The match with this user was dissolved, by either side.
    Unmatched(Uuid),
    ReceiveMessage(Message),
    /// Acknowledges `join_room`.
    RoomJoined(Uuid),
    /// Sent only to the socket whose `send_message` was rejected.
    SendFailed(SendFailure),
    Error(ErrorEvent),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendFailure {
    pub client_id: Option<String>,
    pub receiver_id: Uuid,
    pub content: String,
    pub error: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub error: String,
    pub message: String,
}

pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

type Registry = HashMap<Uuid, HashMap<u64, EventSender>>;

#[derive(Clone, Default)]
pub struct Rooms {
    registry: Arc<Mutex<Registry>>,
    next_connection: Arc<AtomicU64>,
}

/// A connection's place in a room. Leaves the room when dropped.
pub struct Membership {
    rooms: Rooms,
    user_id: Uuid,
    connection: u64,
}

impl Rooms {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn join(&self, user_id: Uuid, tx: EventSender) -> Membership {
        let connection = self.next_connection.fetch_add(1, Ordering::Relaxed);
        let mut registry = self.lock();
        let room = registry.entry(user_id).or_default();
        room.insert(connection, tx);

        tracing::debug!(user = %user_id, connection, connections = room.len(), "joined room");

        Membership {
            rooms: self.clone(),
            user_id,
            connection,
        }
    }

    fn leave(&self, user_id: Uuid, connection: u64) {
        let mut registry = self.lock();
        if let Some(room) = registry.get_mut(&user_id) {
            room.remove(&connection);
            tracing::debug!(user = %user_id, connection, connections = room.len(), "left room");
            if room.is_empty() {
                registry.remove(&user_id);
            }
        }
    }

    /// Delivers `event` to every connection in `user_id`'s room and returns
    /// how many accepted it. An empty room is not an error.
    pub fn publish(&self, user_id: Uuid, event: &ServerEvent) -> usize {
        let mut registry = self.lock();
        let Some(room) = registry.get_mut(&user_id) else {
            tracing::debug!(user = %user_id, "no live connection, push skipped");
            return 0;
        };

        // the registry lock serialises publishers, so each connection sees
        // events for a room in emission order
        room.retain(|_, tx| tx.send(event.clone()).is_ok());
        let delivered = room.len();
        if room.is_empty() {
            registry.remove(&user_id);
        }
        delivered
    }

    pub fn connections(&self, user_id: Uuid) -> usize {
        self.lock().get(&user_id).map_or(0, HashMap::len)
    }
}

impl Membership {
    pub fn user_id(&self) -> Uuid {
        self.user_id
    }
}

impl Drop for Membership {
    fn drop(&mut self) {
        self.rooms.leave(self.user_id, self.connection);
    }
}
