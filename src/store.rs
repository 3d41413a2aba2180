//! Registry of live rooms, keyed by game code.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::deck::generate_room_code;
use crate::error::{RoomError, RoomResult};
use crate::types::{Room, RoomCode};

/// A room record. Only the holder of the room's queue slot locks it.
pub type SharedRoom = Arc<Mutex<Room>>;

/// Codes are case-insensitive on input
pub fn normalize_code(code: &str) -> RoomCode {
    code.trim().to_uppercase()
}

#[derive(Clone, Default)]
pub struct RoomStore {
    rooms: Arc<RwLock<HashMap<RoomCode, SharedRoom>>>,
}

impl RoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an unused code and insert the room built for it
    pub async fn create<F>(&self, build: F) -> SharedRoom
    where
        F: FnOnce(RoomCode) -> Room,
    {
        let mut rooms = self.rooms.write().await;
        let code = loop {
            let candidate = generate_room_code();
            if !rooms.contains_key(&candidate) {
                break candidate;
            }
            tracing::debug!("Room code {} already in use, retrying", candidate);
        };

        let room = Arc::new(Mutex::new(build(code.clone())));
        rooms.insert(code, room.clone());
        room
    }

    pub async fn get(&self, code: &str) -> RoomResult<SharedRoom> {
        self.rooms
            .read()
            .await
            .get(&normalize_code(code))
            .cloned()
            .ok_or(RoomError::RoomNotFound)
    }

    pub async fn remove(&self, code: &str) -> Option<SharedRoom> {
        self.rooms.write().await.remove(&normalize_code(code))
    }

    pub async fn len(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rooms.read().await.is_empty()
    }
}
