use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::task::AbortHandle;

/// Opaque ID types for type safety
pub type RoomCode = String;
pub type PlayerId = String;
pub type ConnectionId = String;

/// Cards a player keeps in hand between rounds
pub const HAND_SIZE: usize = 10;

/// Used cards are only shuffled back in once the white deck drops below this
pub const DECK_LOW_WATERMARK: usize = 50;

/// Reserved name for shared-screen display clients
pub const SPECTATOR_NAME: &str = "TV_BOARD";

/// Hand placeholder that lets a player write their own card
pub const BLANK_CARD: &str = "___BLANK_CARD___";

/// Shown to viewers in place of submission contents that are still hidden
pub const SUBMITTED_PLACEHOLDER: &str = "SUBMITTED";

pub const DEFAULT_WIN_TARGET: u32 = 7;
pub const MAX_WIN_TARGET: u32 = 100;
pub const MIN_NAME_CHARS: usize = 2;
pub const MAX_NAME_CHARS: usize = 20;
pub const MAX_CUSTOM_CARD_CHARS: usize = 150;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RoomPhase {
    Waiting,
    Playing,
    Judging,
    Voting,
    Finished,
}

impl RoomPhase {
    /// Phases in which a round is underway
    pub fn in_round(&self) -> bool {
        matches!(self, Self::Playing | Self::Judging | Self::Voting)
    }
}

/// A prompt card; `pick` is how many white cards answer it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlackCard {
    pub text: String,
    pub pick: u32,
}

/// Mode flags fixed at room creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSettings {
    pub win_target: Option<u32>,
    pub is_endless: bool,
    pub is_democratic: bool,
}

#[derive(Debug, Clone)]
pub struct Player {
    /// Stable seat id, survives reconnects
    pub id: PlayerId,
    /// Connection currently bound to this seat
    pub connection: ConnectionId,
    pub name: String,
    pub score: u32,
    pub hand: Vec<String>,
    pub token: String,
    pub disconnected: bool,
    pub removal_timer: Option<AbortHandle>,
}

impl Player {
    pub fn new(name: String, connection: ConnectionId, token: String) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            connection,
            name,
            score: 0,
            hand: Vec::new(),
            token,
            disconnected: false,
            removal_timer: None,
        }
    }

    pub fn is_spectator(&self) -> bool {
        self.name == SPECTATOR_NAME
    }

    /// Connected and taking part in rounds
    pub fn is_active(&self) -> bool {
        !self.disconnected && !self.is_spectator()
    }

    pub fn cancel_removal(&mut self) {
        if let Some(timer) = self.removal_timer.take() {
            timer.abort();
        }
    }
}

/// Cards one player put forward this round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub cards: Vec<String>,
    /// Written by the player; its text is already back in the deck
    pub custom: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoundWinnerInfo {
    pub name: String,
    pub sentence: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EndVote {
    Yes,
    No,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VoteToEndState {
    pub in_progress: bool,
    pub initiator_name: Option<String>,
    pub votes: HashMap<PlayerId, EndVote>,
}

/// How many "yes" votes end an endless game
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EndVoteRule {
    #[default]
    Unanimous,
    Majority,
}

/// Full server-side room record. Never serialized as-is; see `view::RoomView`.
#[derive(Debug)]
pub struct Room {
    pub code: RoomCode,
    pub host_id: Option<PlayerId>,
    pub host_token: String,
    pub phase: RoomPhase,
    pub round: u32,
    pub settings: RoomSettings,
    pub players: Vec<Player>,
    pub czar_index: Option<usize>,
    pub current_czar: Option<PlayerId>,
    pub current_black_card: Option<BlackCard>,
    pub submissions: HashMap<PlayerId, Submission>,
    pub round_winner_info: Option<RoundWinnerInfo>,
    pub votes: HashMap<PlayerId, PlayerId>,
    pub vote_to_end: VoteToEndState,
    pub white_deck: Vec<String>,
    pub black_deck: Vec<BlackCard>,
    pub discard: Vec<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}
