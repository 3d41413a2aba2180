//! Per-room serial task queue.
//!
//! Every state-mutating operation on a room goes through [`RoomQueue`]. Operations
//! for one room run strictly one after another in arrival order; different rooms
//! are processed fully concurrently. A room's lane exists only while it has work.

use futures::future::BoxFuture;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};

use crate::error::{RoomError, RoomResult};

pub type Operation = BoxFuture<'static, RoomResult<()>>;

#[derive(Clone, Default)]
pub struct RoomQueue {
    /// A key is present exactly while a worker is draining that lane
    lanes: Arc<Mutex<HashMap<String, VecDeque<Operation>>>>,
}

impl RoomQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an operation to the room's lane, starting a worker if the lane was idle
    pub async fn enqueue<F>(&self, key: &str, operation: F)
    where
        F: Future<Output = RoomResult<()>> + Send + 'static,
    {
        let operation: Operation = Box::pin(operation);
        let mut lanes = self.lanes.lock().await;

        if let Some(lane) = lanes.get_mut(key) {
            lane.push_back(operation);
            return;
        }

        lanes.insert(key.to_string(), VecDeque::new());
        drop(lanes);

        let queue = self.clone();
        let key = key.to_string();
        tokio::spawn(async move { queue.drain(key, operation).await });
    }

    /// Enqueue an operation and wait for its result
    pub async fn run<T, F>(&self, key: &str, operation: F) -> RoomResult<T>
    where
        T: Send + 'static,
        F: Future<Output = RoomResult<T>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.enqueue(key, async move {
            let result = operation.await;
            let outcome = match &result {
                Ok(_) => Ok(()),
                Err(e) => Err(e.clone()),
            };
            let _ = tx.send(result);
            outcome
        })
        .await;

        rx.await.unwrap_or(Err(RoomError::OperationLost))
    }

    /// Number of rooms with queued or running work
    pub async fn busy_lanes(&self) -> usize {
        self.lanes.lock().await.len()
    }

    async fn drain(&self, key: String, first: Operation) {
        let mut next = Some(first);

        while let Some(operation) = next {
            // Run on its own task so a panic is contained to this operation
            match tokio::spawn(operation).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::debug!("Operation for room {} rejected: {}", key, e);
                }
                Err(e) => {
                    tracing::error!("Operation for room {} failed: {}", key, e);
                }
            }

            let mut lanes = self.lanes.lock().await;
            next = lanes.get_mut(&key).and_then(|lane| lane.pop_front());
            if next.is_none() {
                lanes.remove(&key);
            }
        }
    }
}
