use super::{seat_of, AppState};
use crate::error::{RoomError, RoomResult};
use crate::protocol::ServerMessage;
use crate::room::JoinOutcome;
use crate::types::*;
use std::sync::Arc;

impl AppState {
    /// Join, rejoin or re-sync a seat in an existing room
    pub async fn join_game(
        self: &Arc<Self>,
        connection: &ConnectionId,
        code: &str,
        name: &str,
        token: Option<String>,
    ) -> RoomResult<()> {
        // Unknown codes fail fast instead of opening a queue lane
        self.rooms.get(code).await?;

        let connection = connection.clone();
        let name = name.to_string();
        self.serialized(code, move |state, code| async move {
            let shared = state.rooms.get(&code).await?;
            let mut room = shared.lock().await;
            if room.phase == RoomPhase::Finished {
                return Err(RoomError::RoomNotFound);
            }

            let outcome = room.join(&name, &connection, token.as_deref())?;
            let player = room
                .player(outcome.player_id())
                .ok_or(RoomError::Rejected("seat vanished"))?;
            let (name, token, player_id) =
                (player.name.clone(), player.token.clone(), player.id.clone());

            match &outcome {
                JoinOutcome::Joined(_) => {
                    tracing::info!("{} joined room {}", name, room.code);
                }
                JoinOutcome::Rejoined(_) => {
                    tracing::info!("{} reconnected to room {}", name, room.code);
                }
                JoinOutcome::AlreadySeated(_) => {
                    tracing::debug!("{} re-synced with room {}", name, room.code);
                }
                JoinOutcome::TookOver { previous, .. } => {
                    tracing::info!("{} moved to a new connection in room {}", name, room.code);
                    state.hub.unbind(previous, &room.code).await;
                    state
                        .hub
                        .send(
                            previous,
                            ServerMessage::ErrorMsg {
                                text: "You joined this game from another window.".to_string(),
                                fatal: true,
                            },
                        )
                        .await;
                }
            }

            state.bind_connection(&connection, &room.code).await;
            state
                .hub
                .send(
                    &connection,
                    ServerMessage::JoinSuccess {
                        name,
                        token,
                        code: room.code.clone(),
                        player_id,
                    },
                )
                .await;
            state.broadcast_room(&room).await;
            Ok(())
        })
        .await
    }

    /// Host removes a player from the lobby
    pub async fn kick_player(
        self: &Arc<Self>,
        connection: &ConnectionId,
        code: &str,
        target: &PlayerId,
    ) -> RoomResult<()> {
        let connection = connection.clone();
        let target = target.clone();
        self.serialized(code, move |state, code| async move {
            let shared = state.rooms.get(&code).await?;
            let mut room = shared.lock().await;
            let host_id = seat_of(&room, &connection)?;
            let removal = room.kick(&host_id, &target)?;

            tracing::info!("{} was kicked from room {}", removal.player.name, room.code);
            let kicked = &removal.player.connection;
            state.hub.unbind(kicked, &room.code).await;
            state.hub.send(kicked, ServerMessage::YouWereKicked).await;
            state.hub.close(kicked).await;

            state.broadcast_room(&room).await;
            Ok(())
        })
        .await
    }

    /// Socket closed: forget the connection and release its seat, if any
    pub async fn disconnect(self: &Arc<Self>, connection: &ConnectionId) {
        let Some(code) = self.hub.unregister(connection).await else {
            return;
        };
        let connection = connection.clone();
        let result = self
            .serialized(&code, move |state, code| async move {
                state.leave_room(&code, &connection).await
            })
            .await;
        if let Err(e) = result {
            tracing::debug!("Disconnect handling for room {} skipped: {}", code, e);
        }
    }

    /// Mark the seat bound to `connection` as disconnected and start its grace period.
    /// Runs inside the room's queue slot.
    pub(crate) async fn leave_room(
        self: &Arc<Self>,
        code: &RoomCode,
        connection: &ConnectionId,
    ) -> RoomResult<()> {
        let shared = self.rooms.get(code).await?;
        let mut room = shared.lock().await;
        if room.phase == RoomPhase::Finished {
            return Ok(());
        }
        let Some(departure) = room.mark_disconnected(connection) else {
            return Ok(());
        };
        let player_id = departure.player_id.clone();
        let name = room
            .player(&player_id)
            .map(|p| p.name.clone())
            .unwrap_or_default();
        tracing::info!("{} disconnected from room {}", name, room.code);

        let grace = self.config.disconnect_grace;
        let purge_id = player_id.clone();
        let timer = self.enqueue_after(room.code.clone(), grace, move |state, code| async move {
            state.purge_player(&code, &purge_id).await
        });
        if let Some(player) = room.player_mut(&player_id) {
            player.removal_timer = Some(timer);
        }

        if departure.czar_left_mid_round {
            self.send_to_room(
                &room,
                ServerMessage::ErrorMsg {
                    text: format!("The Card Czar ({name}) disconnected. Starting a new round."),
                    fatal: false,
                },
            )
            .await;
            self.schedule_czar_restart(&room);
            if room.active_count() < 2 {
                self.reassess(&mut room).await;
            }
        } else {
            self.reassess(&mut room).await;
        }

        self.broadcast_room(&room).await;
        Ok(())
    }

    fn schedule_czar_restart(self: &Arc<Self>, room: &Room) {
        let expected_round = room.round;
        let delay = self.config.czar_disconnect_delay;
        self.enqueue_after(room.code.clone(), delay, move |state, code| async move {
            let shared = state.rooms.get(&code).await?;
            let mut room = shared.lock().await;
            if room.round == expected_round && room.phase.in_round() && !room.round_decided() {
                tracing::info!("Room {} restarting round after czar left", room.code);
                state.advance_round(&mut room).await;
            }
            Ok(())
        });
    }

    /// Grace period over: drop the seat for good unless its owner came back
    pub(crate) async fn purge_player(
        self: &Arc<Self>,
        code: &RoomCode,
        player_id: &PlayerId,
    ) -> RoomResult<()> {
        let shared = self.rooms.get(code).await?;
        let mut room = shared.lock().await;
        if room.phase == RoomPhase::Finished
            || !room.player(player_id).is_some_and(|p| p.disconnected)
        {
            return Ok(());
        }

        let Some(removal) = room.remove_player(player_id) else {
            return Ok(());
        };
        tracing::info!(
            "{} removed from room {} after grace period",
            removal.player.name,
            room.code
        );
        self.hub.unbind(&removal.player.connection, &room.code).await;

        if removal.host_lost {
            self.end_game(
                &mut room,
                crate::room::GameEnd::new("The host left and no other players are in the game."),
            )
            .await;
            return Ok(());
        }
        if let Some(host) = removal.promoted_host.as_ref().and_then(|id| room.player(id)) {
            tracing::info!("{} is now host of room {}", host.name, room.code);
        }
        if room.phase.in_round() && room.seated_players() < 2 {
            self.end_game(
                &mut room,
                crate::room::GameEnd::new("Not enough players left to continue."),
            )
            .await;
            return Ok(());
        }

        self.reassess(&mut room).await;
        self.broadcast_room(&room).await;
        Ok(())
    }
}
