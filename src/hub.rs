//! Connection registry and connection → room routing.
//!
//! Each live socket registers an unbounded outbound channel here. Room logic never
//! touches sockets directly; it addresses connections by id through the hub.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

use crate::protocol::ServerMessage;
use crate::types::{ConnectionId, RoomCode};

/// What a socket task should do next
#[derive(Debug, Clone)]
pub enum Outbound {
    Message(ServerMessage),
    /// Force-close the socket
    Close,
}

#[derive(Clone, Default)]
pub struct ConnectionHub {
    senders: Arc<RwLock<HashMap<ConnectionId, mpsc::UnboundedSender<Outbound>>>>,
    routes: Arc<RwLock<HashMap<ConnectionId, RoomCode>>>,
}

impl ConnectionHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, connection: &ConnectionId) -> mpsc::UnboundedReceiver<Outbound> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.write().await.insert(connection.clone(), tx);
        rx
    }

    /// Forget a connection; returns the room it was bound to
    pub async fn unregister(&self, connection: &ConnectionId) -> Option<RoomCode> {
        self.senders.write().await.remove(connection);
        self.routes.write().await.remove(connection)
    }

    /// Returns false if the connection is gone
    pub async fn send(&self, connection: &ConnectionId, message: ServerMessage) -> bool {
        match self.senders.read().await.get(connection) {
            Some(tx) => tx.send(Outbound::Message(message)).is_ok(),
            None => false,
        }
    }

    pub async fn close(&self, connection: &ConnectionId) {
        if let Some(tx) = self.senders.read().await.get(connection) {
            let _ = tx.send(Outbound::Close);
        }
    }

    /// Route a connection to a room. Returns the previous room if it was a different one.
    pub async fn bind(&self, connection: &ConnectionId, code: &RoomCode) -> Option<RoomCode> {
        self.routes
            .write()
            .await
            .insert(connection.clone(), code.clone())
            .filter(|previous| previous != code)
    }

    /// Drop the route only if it still points at `code`
    pub async fn unbind(&self, connection: &ConnectionId, code: &RoomCode) {
        let mut routes = self.routes.write().await;
        if routes.get(connection) == Some(code) {
            routes.remove(connection);
        }
    }

    pub async fn unbind_room(&self, code: &RoomCode) {
        self.routes.write().await.retain(|_, room| room != code);
    }

    pub async fn route(&self, connection: &ConnectionId) -> Option<RoomCode> {
        self.routes.read().await.get(connection).cloned()
    }

    pub async fn connection_count(&self) -> usize {
        self.senders.read().await.len()
    }
}
