use crate::types::*;
use crate::view::RoomView;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    CreateGame {
        name: String,
        #[serde(default)]
        win_target: Option<u32>,
        #[serde(default)]
        is_endless: bool,
        #[serde(default)]
        is_democratic: bool,
    },
    JoinGame {
        code: RoomCode,
        name: String,
        /// Seat or host token from an earlier session
        #[serde(default)]
        token: Option<String>,
    },
    StartGame {
        code: RoomCode,
    },
    SubmitCard {
        code: RoomCode,
        cards: Vec<String>,
    },
    SubmitBlankCard {
        code: RoomCode,
        card_text: String,
    },
    CzarChoose {
        code: RoomCode,
        winning_cards: Vec<String>,
    },
    PlayerVote {
        code: RoomCode,
        submission_owner_id: PlayerId,
    },
    InitiateVoteToEnd {
        code: RoomCode,
    },
    CastVote {
        code: RoomCode,
        vote: EndVote,
    },
    KickPlayer {
        code: RoomCode,
        player_id_to_kick: PlayerId,
    },
}

impl ClientMessage {
    /// Room this message addresses, if any
    pub fn room_code(&self) -> Option<&str> {
        match self {
            Self::CreateGame { .. } => None,
            Self::JoinGame { code, .. }
            | Self::StartGame { code }
            | Self::SubmitCard { code, .. }
            | Self::SubmitBlankCard { code, .. }
            | Self::CzarChoose { code, .. }
            | Self::PlayerVote { code, .. }
            | Self::InitiateVoteToEnd { code }
            | Self::CastVote { code, .. }
            | Self::KickPlayer { code, .. } => Some(code),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FinalScore {
    pub player_id: PlayerId,
    pub name: String,
    pub score: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    Welcome {
        connection_id: ConnectionId,
        server_now: String,
    },
    /// Sent only to the creator; `token` is the host token
    GameCreated {
        code: RoomCode,
        token: String,
        name: String,
        player_id: PlayerId,
    },
    /// Sent only to the joining connection; `token` is that seat's own token
    JoinSuccess {
        name: String,
        token: String,
        code: RoomCode,
        player_id: PlayerId,
    },
    GameUpdate(Box<RoomView>),
    GameOver {
        reason: String,
        /// Winner's display name
        #[serde(skip_serializing_if = "Option::is_none", default)]
        winner: Option<String>,
        final_scores: Vec<FinalScore>,
    },
    ErrorMsg {
        text: String,
        /// Client should drop its session and return to the entry screen
        fatal: bool,
    },
    VoteToEndStarted {
        initiator_name: String,
    },
    VoteToEndResult {
        passed: bool,
        reason: String,
    },
    YouWereKicked,
}
