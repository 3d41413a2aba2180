use super::{seat_of, AppState};
use crate::error::RoomResult;
use crate::room::VoteOutcome;
use crate::types::*;
use std::sync::Arc;

impl AppState {
    /// Democratic mode: vote for another player's submission
    pub async fn player_vote(
        self: &Arc<Self>,
        connection: &ConnectionId,
        code: &str,
        submission_owner: &PlayerId,
    ) -> RoomResult<()> {
        let connection = connection.clone();
        let owner = submission_owner.clone();
        self.serialized(code, move |state, code| async move {
            let shared = state.rooms.get(&code).await?;
            let mut room = shared.lock().await;
            let voter = seat_of(&room, &connection)?;
            if let Some(outcome) = room.cast_vote(&voter, &owner)? {
                state.conclude_vote(&mut room, outcome);
            }
            state.broadcast_room(&room).await;
            Ok(())
        })
        .await
    }

    /// Apply a decided vote and schedule what comes after the winner display
    pub(crate) fn conclude_vote(self: &Arc<Self>, room: &mut Room, outcome: VoteOutcome) {
        let result = match outcome {
            VoteOutcome::Winner(owner) => match room.award_round(&owner) {
                Ok(result) => {
                    tracing::info!(
                        "{} won the vote in room {} round {}",
                        result.winner_name,
                        room.code,
                        room.round
                    );
                    Some(result)
                }
                Err(e) => {
                    tracing::warn!("Vote winner in room {} not awarded: {}", room.code, e);
                    room.declare_tie();
                    None
                }
            },
            VoteOutcome::Tie => {
                tracing::info!("Vote tied in room {} round {}", room.code, room.round);
                room.declare_tie();
                None
            }
        };
        self.schedule_advance(room, result);
    }
}
