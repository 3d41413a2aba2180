use super::{seat_of, AppState};
use crate::error::RoomResult;
use crate::protocol::ServerMessage;
use crate::room::{EndVoteStatus, GameEnd};
use crate::types::*;
use std::sync::Arc;

impl AppState {
    /// Endless games: propose ending the game
    pub async fn initiate_vote_to_end(
        self: &Arc<Self>,
        connection: &ConnectionId,
        code: &str,
    ) -> RoomResult<()> {
        let connection = connection.clone();
        self.serialized(code, move |state, code| async move {
            let shared = state.rooms.get(&code).await?;
            let mut room = shared.lock().await;
            let player_id = seat_of(&room, &connection)?;
            let rule = state.config.end_vote_rule;
            let (initiator_name, status) = room.start_end_vote(&player_id, rule)?;

            tracing::info!("{} started a vote to end room {}", initiator_name, room.code);
            state
                .send_to_room(&room, ServerMessage::VoteToEndStarted { initiator_name })
                .await;
            state.apply_end_vote(&mut room, status).await;
            Ok(())
        })
        .await
    }

    pub async fn cast_end_vote(
        self: &Arc<Self>,
        connection: &ConnectionId,
        code: &str,
        vote: EndVote,
    ) -> RoomResult<()> {
        let connection = connection.clone();
        self.serialized(code, move |state, code| async move {
            let shared = state.rooms.get(&code).await?;
            let mut room = shared.lock().await;
            let player_id = seat_of(&room, &connection)?;
            let status = room.cast_end_vote(&player_id, vote, state.config.end_vote_rule)?;
            state.apply_end_vote(&mut room, status).await;
            Ok(())
        })
        .await
    }

    /// Announce a decided end vote; a passed vote finishes the game with the leader as winner
    pub(crate) async fn apply_end_vote(self: &Arc<Self>, room: &mut Room, status: EndVoteStatus) {
        let unanimous = self.config.end_vote_rule == EndVoteRule::Unanimous;
        match status {
            EndVoteStatus::Pending => self.broadcast_room(room).await,
            EndVoteStatus::Failed => {
                let reason = if unanimous {
                    "The vote was not unanimous."
                } else {
                    "Not enough players voted to end the game."
                };
                tracing::info!("Vote to end room {} failed", room.code);
                self.send_to_room(
                    room,
                    ServerMessage::VoteToEndResult {
                        passed: false,
                        reason: reason.to_string(),
                    },
                )
                .await;
                self.broadcast_room(room).await;
            }
            EndVoteStatus::Passed => {
                let reason = if unanimous {
                    "The players have unanimously voted to end the game!"
                } else {
                    "The players have voted to end the game!"
                };
                self.send_to_room(
                    room,
                    ServerMessage::VoteToEndResult {
                        passed: true,
                        reason: reason.to_string(),
                    },
                )
                .await;
                let end = match room.leader() {
                    Some(leader) => GameEnd::with_winner(reason, leader.id.clone()),
                    None => GameEnd::new(reason),
                };
                self.end_game(room, end).await;
            }
        }
    }
}
