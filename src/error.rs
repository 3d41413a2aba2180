/// Result type for room operations
pub type RoomResult<T> = Result<T, RoomError>;

/// How a failed operation surfaces to the client that caused it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Client drops its cached identity and returns to the entry screen
    Fatal,
    /// Transient notification, current view stays
    Notice,
    /// Not reported; unreachable for a well-behaved client
    Silent,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    #[error("Game not found.")]
    RoomNotFound,

    #[error("That name is already taken.")]
    NameTaken,

    #[error("Invalid name.")]
    InvalidName,

    #[error("Invalid win target.")]
    InvalidWinTarget,

    #[error("Custom cards must be between 1 and 150 characters.")]
    InvalidCardText,

    #[error("Cannot start game. At least 2 active players are required.")]
    NotEnoughPlayers,

    #[error("rejected: {0}")]
    Rejected(&'static str),

    #[error("operation was dropped before completing")]
    OperationLost,
}

impl RoomError {
    pub fn severity(&self) -> Severity {
        match self {
            Self::RoomNotFound | Self::NameTaken => Severity::Fatal,
            Self::InvalidName
            | Self::InvalidWinTarget
            | Self::InvalidCardText
            | Self::NotEnoughPlayers => Severity::Notice,
            Self::Rejected(_) | Self::OperationLost => Severity::Silent,
        }
    }
}
