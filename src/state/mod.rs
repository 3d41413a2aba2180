mod end_vote;
mod lifecycle;
mod player;
mod score;
mod submission;
mod vote;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::AbortHandle;

use crate::cards::{CardPool, CardRepository};
use crate::config::GameConfig;
use crate::error::{RoomError, RoomResult};
use crate::hub::ConnectionHub;
use crate::queue::RoomQueue;
use crate::room::Reassessment;
use crate::store::{normalize_code, RoomStore};
use crate::types::*;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub rooms: RoomStore,
    pub queue: RoomQueue,
    /// Process-wide card pool rooms copy their decks from
    pub cards: CardPool,
    pub repository: Arc<dyn CardRepository>,
    pub hub: ConnectionHub,
    pub config: GameConfig,
}

impl AppState {
    pub fn new(cards: CardPool, repository: Arc<dyn CardRepository>, config: GameConfig) -> Self {
        Self {
            rooms: RoomStore::new(),
            queue: RoomQueue::new(),
            cards,
            repository,
            hub: ConnectionHub::new(),
            config,
        }
    }

    /// Run `op` in the room's queue slot and wait for its result.
    /// Never call this from inside another operation on the same room.
    pub(crate) async fn serialized<T, F, Fut>(self: &Arc<Self>, code: &str, op: F) -> RoomResult<T>
    where
        T: Send + 'static,
        F: FnOnce(Arc<Self>, RoomCode) -> Fut,
        Fut: Future<Output = RoomResult<T>> + Send + 'static,
    {
        let code = normalize_code(code);
        let operation = op(self.clone(), code.clone());
        self.queue.run(&code, operation).await
    }

    /// Queue `op` for the room once `delay` has passed. The returned handle cancels
    /// the wait; an operation that already reached the queue still runs.
    pub(crate) fn enqueue_after<F, Fut>(
        self: &Arc<Self>,
        code: RoomCode,
        delay: Duration,
        op: F,
    ) -> AbortHandle
    where
        F: FnOnce(Arc<Self>, RoomCode) -> Fut + Send + 'static,
        Fut: Future<Output = RoomResult<()>> + Send + 'static,
    {
        let state = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let queue = state.queue.clone();
            let key = code.clone();
            queue.enqueue(&key, op(state, code)).await;
        })
        .abort_handle()
    }

    /// Re-check the round after membership changed and follow through
    pub(crate) async fn reassess(self: &Arc<Self>, room: &mut Room) {
        match room.reassess() {
            Reassessment::Unchanged => {}
            Reassessment::RevertedToWaiting => {
                tracing::info!(
                    "Room {} back to waiting: not enough active players",
                    room.code
                );
            }
            Reassessment::Revealed => {
                tracing::info!("Room {} revealing submissions", room.code);
            }
            Reassessment::Voted(outcome) => self.conclude_vote(room, outcome),
        }

        // A departure can also decide a running vote to end the game
        let status = room.settle_end_vote(self.config.end_vote_rule);
        if status != crate::room::EndVoteStatus::Pending {
            self.apply_end_vote(room, status).await;
        }
    }
}

/// Seat bound to `connection` in this room
pub(crate) fn seat_of(room: &Room, connection: &ConnectionId) -> RoomResult<PlayerId> {
    room.player_by_connection(connection)
        .map(|p| p.id.clone())
        .ok_or(RoomError::Rejected("not seated in this room"))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::cards::MemoryRepository;
    use crate::hub::Outbound;
    use crate::protocol::ServerMessage;
    use tokio::sync::mpsc;

    pub fn state_with(white: usize, black: usize, config: GameConfig) -> Arc<AppState> {
        let cards = CardPool::new(
            (0..white).map(|i| format!("White card {i}")).collect(),
            (0..black)
                .map(|i| BlackCard {
                    text: format!("Prompt {i} is _."),
                    pick: 1,
                })
                .collect(),
        );
        Arc::new(AppState::new(
            cards,
            Arc::new(MemoryRepository::default()),
            config,
        ))
    }

    pub fn test_state() -> Arc<AppState> {
        state_with(
            300,
            30,
            GameConfig {
                blank_card_ratio: 0.0,
                ..GameConfig::default()
            },
        )
    }

    pub struct Client {
        pub connection: ConnectionId,
        pub rx: mpsc::UnboundedReceiver<Outbound>,
    }

    impl Client {
        pub async fn connect(state: &Arc<AppState>, name: &str) -> Self {
            let connection = format!("conn-{name}");
            let rx = state.hub.register(&connection).await;
            Self { connection, rx }
        }

        /// Everything delivered so far
        pub fn drain(&mut self) -> Vec<ServerMessage> {
            let mut out = Vec::new();
            while let Ok(Outbound::Message(msg)) = self.rx.try_recv() {
                out.push(msg);
            }
            out
        }
    }

    /// Let spawned timers and queue workers catch up
    pub async fn settle() {
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
    }

    pub async fn room_snapshot<T>(
        state: &Arc<AppState>,
        code: &str,
        read: impl FnOnce(&Room) -> T,
    ) -> T {
        let shared = state.rooms.get(code).await.unwrap();
        let room = shared.lock().await;
        read(&room)
    }
}
