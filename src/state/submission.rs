use super::{seat_of, AppState};
use crate::error::RoomResult;
use crate::room::validate_custom_text;
use crate::types::*;
use std::sync::Arc;

impl AppState {
    /// Play cards from hand for the current prompt
    pub async fn submit_cards(
        self: &Arc<Self>,
        connection: &ConnectionId,
        code: &str,
        cards: Vec<String>,
    ) -> RoomResult<()> {
        let connection = connection.clone();
        self.serialized(code, move |state, code| async move {
            let shared = state.rooms.get(&code).await?;
            let mut room = shared.lock().await;
            let player_id = seat_of(&room, &connection)?;
            room.submit_cards(&player_id, cards)?;

            tracing::debug!("Submission from {} in room {}", player_id, room.code);
            state.after_submission(&mut room).await;
            Ok(())
        })
        .await
    }

    /// Spend a blank card on player-written text. New texts also join the
    /// card pool and are persisted in the background.
    pub async fn submit_blank_card(
        self: &Arc<Self>,
        connection: &ConnectionId,
        code: &str,
        card_text: &str,
    ) -> RoomResult<()> {
        let text = validate_custom_text(card_text)?;
        let connection = connection.clone();
        self.serialized(code, move |state, code| async move {
            let shared = state.rooms.get(&code).await?;
            let mut room = shared.lock().await;
            let player_id = seat_of(&room, &connection)?;
            room.check_custom_submission(&player_id)?;

            let new_to_pool = state.cards.append_white(&text).await;
            if new_to_pool {
                let repository = state.repository.clone();
                let persisted = text.clone();
                tokio::spawn(async move {
                    if let Err(e) = repository.append_white(&persisted).await {
                        tracing::warn!("Failed to persist custom card: {}", e);
                    }
                });
            }
            room.submit_custom_card(&player_id, text, new_to_pool)?;

            tracing::info!(
                "Custom card from {} in room {} (new: {})",
                player_id,
                room.code,
                new_to_pool
            );
            state.after_submission(&mut room).await;
            Ok(())
        })
        .await
    }

    /// Show the new submission, then open judging or voting if everyone is in
    async fn after_submission(self: &Arc<Self>, room: &mut Room) {
        self.broadcast_room(room).await;
        if room.try_reveal() {
            tracing::info!("Room {} moving to {:?}", room.code, room.phase);
            self.broadcast_room(room).await;
        }
    }
}
