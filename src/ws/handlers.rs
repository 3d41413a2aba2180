//! WebSocket message dispatch
//!
//! Every client event maps to one room operation on [`AppState`]. Failures are
//! reported back according to their severity; silent ones are only logged.

use crate::error::{RoomError, RoomResult, Severity};
use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use crate::types::ConnectionId;
use std::sync::Arc;

/// Handle a client message and return an optional direct reply
pub async fn handle_message(
    msg: ClientMessage,
    connection: &ConnectionId,
    state: &Arc<AppState>,
) -> Option<ServerMessage> {
    let room = msg.room_code().map(str::to_string);
    let result: RoomResult<()> = match msg {
        ClientMessage::CreateGame {
            name,
            win_target,
            is_endless,
            is_democratic,
        } => state
            .create_game(connection, &name, win_target, is_endless, is_democratic)
            .await
            .map(|_| ()),

        ClientMessage::JoinGame { code, name, token } => {
            state.join_game(connection, &code, &name, token).await
        }

        ClientMessage::StartGame { code } => state.start_game(connection, &code).await,

        ClientMessage::SubmitCard { code, cards } => {
            state.submit_cards(connection, &code, cards).await
        }

        ClientMessage::SubmitBlankCard { code, card_text } => {
            state.submit_blank_card(connection, &code, &card_text).await
        }

        ClientMessage::CzarChoose {
            code,
            winning_cards,
        } => state.czar_choose(connection, &code, winning_cards).await,

        ClientMessage::PlayerVote {
            code,
            submission_owner_id,
        } => {
            state
                .player_vote(connection, &code, &submission_owner_id)
                .await
        }

        ClientMessage::InitiateVoteToEnd { code } => {
            state.initiate_vote_to_end(connection, &code).await
        }

        ClientMessage::CastVote { code, vote } => state.cast_end_vote(connection, &code, vote).await,

        ClientMessage::KickPlayer {
            code,
            player_id_to_kick,
        } => state.kick_player(connection, &code, &player_id_to_kick).await,
    };

    result
        .err()
        .and_then(|e| report(e, connection, room.as_deref()))
}

/// Turn a failed operation into the reply its severity calls for
fn report(error: RoomError, connection: &ConnectionId, room: Option<&str>) -> Option<ServerMessage> {
    let room = room.unwrap_or("-");
    match error.severity() {
        Severity::Fatal => Some(ServerMessage::ErrorMsg {
            text: error.to_string(),
            fatal: true,
        }),
        Severity::Notice => Some(ServerMessage::ErrorMsg {
            text: error.to_string(),
            fatal: false,
        }),
        Severity::Silent => {
            match &error {
                RoomError::OperationLost => {
                    tracing::warn!("Operation from {} in room {} failed: {}", connection, room, error);
                }
                _ => tracing::debug!("Ignored request from {} in room {}: {}", connection, room, error),
            }
            None
        }
    }
}
