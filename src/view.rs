//! Per-viewer projection of a room.
//!
//! Every broadcast builds one [`RoomView`] per recipient. Secrets (tokens, decks,
//! discard pile, timers) have no field here at all, so they cannot leak.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::deck::shuffle;
use crate::types::*;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub score: u32,
    pub disconnected: bool,
    pub is_spectator: bool,
    /// Only present in the owner's own view
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub hand: Option<Vec<String>>,
}

/// One anonymized submission, as judged or voted on
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionEntry {
    pub player_id: PlayerId,
    pub cards: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoomView {
    pub code: RoomCode,
    pub host_id: Option<PlayerId>,
    pub state: RoomPhase,
    pub round: u32,
    pub win_target: Option<u32>,
    pub is_endless: bool,
    pub is_democratic: bool,
    pub players: Vec<PlayerView>,
    pub current_czar: Option<PlayerId>,
    pub current_black_card: Option<BlackCard>,
    pub submissions: HashMap<PlayerId, Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub shuffled_submissions: Option<Vec<SubmissionEntry>>,
    pub round_winner_info: Option<RoundWinnerInfo>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub votes: Option<HashMap<PlayerId, PlayerId>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub vote_counts: Option<HashMap<PlayerId, u32>>,
    pub vote_to_end_state: VoteToEndState,
    /// The viewer's own seat
    pub you: Option<PlayerId>,
}

impl RoomView {
    /// Project `room` for `viewer`. `None` is an anonymous observer with no seat.
    pub fn for_viewer(room: &Room, viewer: Option<&PlayerId>) -> Self {
        let seat = viewer.and_then(|id| room.player(id));
        let is_spectator = seat.is_some_and(|p| p.is_spectator());
        let is_czar = viewer.is_some_and(|id| room.is_czar(id));
        let democratic = room.settings.is_democratic;

        let revealed = matches!(room.phase, RoomPhase::Judging | RoomPhase::Voting)
            || is_czar
            || democratic
            || is_spectator;

        let submissions = room
            .submissions
            .iter()
            .map(|(owner, submission)| {
                let cards = if revealed || Some(owner) == viewer {
                    submission.cards.clone()
                } else {
                    vec![SUBMITTED_PLACEHOLDER.to_string()]
                };
                (owner.clone(), cards)
            })
            .collect();

        let anonymized = (democratic
            && matches!(room.phase, RoomPhase::Judging | RoomPhase::Voting))
            || (is_czar && room.phase == RoomPhase::Judging)
            || is_spectator;
        let shuffled_submissions = anonymized.then(|| {
            let mut entries: Vec<SubmissionEntry> = room
                .submissions
                .iter()
                .map(|(owner, submission)| SubmissionEntry {
                    player_id: owner.clone(),
                    cards: submission.cards.clone(),
                })
                .collect();
            shuffle(&mut entries);
            entries
        });

        let voting = democratic && room.phase == RoomPhase::Voting;

        Self {
            code: room.code.clone(),
            host_id: room.host_id.clone(),
            state: room.phase,
            round: room.round,
            win_target: room.settings.win_target,
            is_endless: room.settings.is_endless,
            is_democratic: democratic,
            players: room
                .players
                .iter()
                .map(|p| PlayerView {
                    id: p.id.clone(),
                    name: p.name.clone(),
                    score: p.score,
                    disconnected: p.disconnected,
                    is_spectator: p.is_spectator(),
                    hand: (Some(&p.id) == viewer).then(|| p.hand.clone()),
                })
                .collect(),
            current_czar: room.current_czar.clone(),
            current_black_card: room.current_black_card.clone(),
            submissions,
            shuffled_submissions,
            round_winner_info: room.round_winner_info.clone(),
            votes: voting.then(|| room.votes.clone()),
            vote_counts: voting.then(|| room.vote_counts()),
            vote_to_end_state: room.vote_to_end.clone(),
            you: seat.map(|p| p.id.clone()),
        }
    }
}
