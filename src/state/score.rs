use super::{seat_of, AppState};
use crate::error::RoomResult;
use crate::types::*;
use std::sync::Arc;

impl AppState {
    /// Czar picks the winning submission by its cards
    pub async fn czar_choose(
        self: &Arc<Self>,
        connection: &ConnectionId,
        code: &str,
        winning_cards: Vec<String>,
    ) -> RoomResult<()> {
        let connection = connection.clone();
        self.serialized(code, move |state, code| async move {
            let shared = state.rooms.get(&code).await?;
            let mut room = shared.lock().await;
            let czar = seat_of(&room, &connection)?;
            let result = room.choose_winner(&czar, &winning_cards)?;

            tracing::info!(
                "{} won round {} in room {}",
                result.winner_name,
                room.round,
                room.code
            );
            state.broadcast_room(&room).await;
            state.schedule_advance(&room, Some(result));
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use crate::config::GameConfig;
    use crate::protocol::ServerMessage;
    use crate::types::*;
    use std::sync::Arc;
    use std::time::Duration;

    /// Alice (czar) and Bob; Bob submits and the round goes to judging
    async fn judging_room(win_target: u32) -> (Arc<super::AppState>, RoomCode, Client, Client, Vec<String>) {
        let state = state_with(
            300,
            30,
            GameConfig {
                blank_card_ratio: 0.0,
                ..GameConfig::default()
            },
        );
        let alice = Client::connect(&state, "alice").await;
        let code = state
            .create_game(&alice.connection, "Alice", Some(win_target), false, false)
            .await
            .unwrap();
        let bob = Client::connect(&state, "bob").await;
        state
            .join_game(&bob.connection, &code, "Bob", None)
            .await
            .unwrap();
        state.start_game(&alice.connection, &code).await.unwrap();

        let card = room_snapshot(&state, &code, |room| room.players[1].hand[0].clone()).await;
        state
            .submit_cards(&bob.connection, &code, vec![card.clone()])
            .await
            .unwrap();
        (state, code, alice, bob, vec![card])
    }

    #[tokio::test(start_paused = true)]
    async fn test_winner_scores_then_next_round_after_delay() {
        let (state, code, alice, bob, cards) = judging_room(5).await;

        assert!(state
            .czar_choose(&bob.connection, &code, cards.clone())
            .await
            .is_err());
        state
            .czar_choose(&alice.connection, &code, cards.clone())
            .await
            .unwrap();

        room_snapshot(&state, &code, |room| {
            assert_eq!(room.players[1].score, 1);
            assert_eq!(room.round_winner_info.as_ref().unwrap().name, "Bob");
            assert_eq!(room.round, 1);
        })
        .await;

        // A second pick in the same round changes nothing
        assert!(state.czar_choose(&alice.connection, &code, cards).await.is_err());

        tokio::time::sleep(Duration::from_secs(4)).await;
        settle().await;
        room_snapshot(&state, &code, |room| assert_eq!(room.round, 1)).await;

        tokio::time::sleep(Duration::from_secs(2)).await;
        settle().await;
        room_snapshot(&state, &code, |room| {
            assert_eq!(room.round, 2);
            assert_eq!(room.phase, RoomPhase::Playing);
            assert_eq!(room.current_czar.as_ref(), Some(&room.players[1].id));
            assert!(room.round_winner_info.is_none());
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaching_target_ends_game() {
        let (state, code, mut alice, _bob, cards) = judging_room(1).await;
        state
            .czar_choose(&alice.connection, &code, cards)
            .await
            .unwrap();
        alice.drain();

        tokio::time::sleep(Duration::from_secs(6)).await;
        settle().await;

        let over = alice.drain().into_iter().find_map(|m| match m {
            ServerMessage::GameOver {
                reason,
                winner,
                final_scores,
            } => Some((reason, winner, final_scores)),
            _ => None,
        });
        let (reason, winner, scores) = over.expect("game over sent");
        assert_eq!(reason, "Bob reached the score limit!");
        assert_eq!(winner.as_deref(), Some("Bob"));
        assert_eq!(scores.len(), 2);
        room_snapshot(&state, &code, |room| assert_eq!(room.phase, RoomPhase::Finished)).await;
    }
}
