use super::AppState;
use crate::error::{RoomError, RoomResult};
use crate::protocol::{FinalScore, ServerMessage};
use crate::room::{validate_name, validate_win_target, GameEnd, RoundResult, RoundStart};
use crate::types::*;
use std::sync::Arc;

impl AppState {
    /// Open a new room with the caller seated as host. Returns the game code.
    pub async fn create_game(
        self: &Arc<Self>,
        connection: &ConnectionId,
        name: &str,
        win_target: Option<u32>,
        is_endless: bool,
        is_democratic: bool,
    ) -> RoomResult<RoomCode> {
        let name = name.trim().to_string();
        validate_name(&name)?;
        if name == SPECTATOR_NAME {
            return Err(RoomError::InvalidName);
        }
        let settings = RoomSettings {
            win_target: validate_win_target(win_target, is_endless)?,
            is_endless,
            is_democratic,
        };

        let (white, black) = self.cards.snapshot().await;
        let ratio = self.config.blank_card_ratio;
        let shared = self
            .rooms
            .create(|code| Room::new(code, settings, white, black, ratio))
            .await;
        let code = shared.lock().await.code.clone();

        let connection = connection.clone();
        self.serialized(&code, move |state, code| async move {
            let shared = state.rooms.get(&code).await?;
            let mut room = shared.lock().await;
            let player_id = room.seat_host(&name, &connection);
            state.bind_connection(&connection, &room.code).await;

            tracing::info!(
                "Room {} created by {} (endless: {}, democratic: {})",
                room.code,
                name,
                room.settings.is_endless,
                room.settings.is_democratic
            );
            state
                .hub
                .send(
                    &connection,
                    ServerMessage::GameCreated {
                        code: room.code.clone(),
                        token: room.host_token.clone(),
                        name,
                        player_id,
                    },
                )
                .await;
            state.broadcast_room(&room).await;
            Ok(room.code.clone())
        })
        .await
    }

    /// Host starts the first round
    pub async fn start_game(self: &Arc<Self>, connection: &ConnectionId, code: &str) -> RoomResult<()> {
        let connection = connection.clone();
        self.serialized(code, move |state, code| async move {
            let shared = state.rooms.get(&code).await?;
            let mut room = shared.lock().await;
            let player_id = super::seat_of(&room, &connection)?;
            room.check_start(&player_id)?;

            tracing::info!("Room {} starting with {} players", room.code, room.active_count());
            state.advance_round(&mut room).await;
            Ok(())
        })
        .await
    }

    /// Begin the next round, or end the game when the decks cannot support one
    pub(crate) async fn advance_round(self: &Arc<Self>, room: &mut Room) {
        match room.begin_round() {
            Ok(RoundStart::Started { cancelled_end_vote }) => {
                tracing::info!(
                    "Room {} round {} started (czar: {:?})",
                    room.code,
                    room.round,
                    room.current_czar
                );
                if cancelled_end_vote {
                    self.send_to_room(
                        room,
                        ServerMessage::VoteToEndResult {
                            passed: false,
                            reason: "A new round started.".to_string(),
                        },
                    )
                    .await;
                }
                self.broadcast_room(room).await;
            }
            Ok(RoundStart::Deferred) => {
                tracing::info!(
                    "Room {} waiting: not enough active players for a round",
                    room.code
                );
                self.broadcast_room(room).await;
            }
            Err(end) => self.end_game(room, end).await,
        }
    }

    /// After the winner display delay, either finish or move on to the next round.
    /// Does nothing if the round has moved on in the meantime.
    pub(crate) fn schedule_advance(self: &Arc<Self>, room: &Room, result: Option<RoundResult>) {
        let expected_round = room.round;
        let delay = self.config.round_advance_delay;
        self.enqueue_after(room.code.clone(), delay, move |state, code| async move {
            let shared = state.rooms.get(&code).await?;
            let mut room = shared.lock().await;
            if room.round != expected_round || !room.phase.in_round() {
                return Ok(());
            }

            match result.filter(|r| r.reached_target) {
                Some(result) => {
                    let reason = format!("{} reached the score limit!", result.winner_name);
                    state
                        .end_game(&mut room, GameEnd::with_winner(reason, result.winner_id))
                        .await;
                }
                None => state.advance_round(&mut room).await,
            }
            Ok(())
        });
    }

    /// Enter the terminal state, announce the result and schedule the room's deletion
    pub(crate) async fn end_game(self: &Arc<Self>, room: &mut Room, end: GameEnd) {
        if room.phase == RoomPhase::Finished {
            return;
        }
        room.finish();

        let winner = end
            .winner
            .as_ref()
            .and_then(|id| room.player(id))
            .map(|p| p.name.clone());
        let final_scores = room
            .players
            .iter()
            .filter(|p| !p.is_spectator())
            .map(|p| FinalScore {
                player_id: p.id.clone(),
                name: p.name.clone(),
                score: p.score,
            })
            .collect();

        tracing::info!("Room {} finished: {}", room.code, end.reason);
        self.send_to_room(
            room,
            ServerMessage::GameOver {
                reason: end.reason,
                winner,
                final_scores,
            },
        )
        .await;
        self.broadcast_room(room).await;

        let retention = self.config.finished_retention;
        self.enqueue_after(room.code.clone(), retention, |state, code| async move {
            state.delete_room(&code).await;
            Ok(())
        });
    }

    pub(crate) async fn delete_room(&self, code: &RoomCode) {
        if self.rooms.remove(code).await.is_some() {
            self.hub.unbind_room(code).await;
            tracing::info!("Room {} deleted", code);
        }
    }

    /// Route a connection to a room; a connection leaving another room is
    /// treated as disconnecting from it
    pub(crate) async fn bind_connection(self: &Arc<Self>, connection: &ConnectionId, code: &RoomCode) {
        if let Some(previous) = self.hub.bind(connection, code).await {
            tracing::debug!(
                "Connection {} moved from room {} to {}",
                connection,
                previous,
                code
            );
            let connection = connection.clone();
            let state = self.clone();
            let key = previous.clone();
            // Fire and forget: waiting on another room's queue from here could deadlock
            self.queue
                .enqueue(&key, async move {
                    state.leave_room(&previous, &connection).await
                })
                .await;
        }
    }
}
