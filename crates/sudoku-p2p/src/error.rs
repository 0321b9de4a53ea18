use crate::store::Key;
use sudoku_core::PlaceError;

/// Errors raised by the replicated store and its client.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("a value already exists for key {key}")]
    AlreadyExists { key: Key },

    #[error("no value stored for key {key}")]
    NotFound { key: Key },

    /// Replicas report different versions: a write is in flight
    #[error("replicas disagree on the latest version of {key}")]
    Unaligned { key: Key },

    /// Another writer got there first; the tentative write was rolled back
    #[error("update of {key} lost a race and was rolled back")]
    Conflict { key: Key },

    #[error("store operation {op} timed out")]
    Timeout { op: &'static str },

    #[error("store unreachable: {reason}")]
    Unreachable { reason: String },

    #[error("store operation {op} was cancelled")]
    Cancelled { op: &'static str },

    #[error("could not encode or decode a record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("stored record for {key} is corrupt: {reason}")]
    Corrupt { key: Key, reason: String },
}

impl StoreError {
    /// Whether a fresh read-modify-write attempt may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Unaligned { .. } | Self::Conflict { .. } | Self::Timeout { .. } | Self::Unreachable { .. }
        )
    }
}

/// Refusals and outcomes of challenge state transitions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChallengeError {
    #[error("challenge names are 3 to 24 letters, digits and single spaces: {name:?}")]
    InvalidChallengeName { name: String },

    #[error("{nickname} is not part of this challenge")]
    UnknownPlayer { nickname: String },

    #[error("only the owner can do this")]
    Unauthorized,

    #[error("the challenge has already been started")]
    InvalidTransition,

    #[error("at least {required} players are needed to start, found {found}")]
    NotEnoughPlayers { required: usize, found: usize },

    #[error("the challenge is not being played")]
    InvalidState,

    #[error("cell ({row}, {col}) does not exist")]
    CellNotFound { row: usize, col: usize },

    #[error("value {value} is not a digit between 1 and 9")]
    ValueOutOfRange { value: u8 },

    #[error("cell ({row}, {col}) is fixed")]
    FixedCell { row: usize, col: usize },

    #[error("cell ({row}, {col}) is already filled")]
    AlreadyFilled { row: usize, col: usize },

    /// Another player solved the cell first
    #[error("cell ({row}, {col}) was already guessed by another player")]
    AlreadyGuessed { row: usize, col: usize },

    #[error("{value} is not a valid value for cell ({row}, {col})")]
    InvalidValue { row: usize, col: usize, value: u8 },
}

impl From<PlaceError> for ChallengeError {
    fn from(err: PlaceError) -> Self {
        match err {
            PlaceError::CellNotFound { row, col } => Self::CellNotFound { row, col },
            PlaceError::ValueOutOfRange { value } => Self::ValueOutOfRange { value },
            PlaceError::FixedCell { row, col } => Self::FixedCell { row, col },
            PlaceError::FilledCell { row, col } => Self::AlreadyGuessed { row, col },
            PlaceError::InvalidValue { row, col, value } => Self::InvalidValue { row, col, value },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration: {reason}")]
    Invalid { reason: String },

    #[error("could not read {path}: {reason}")]
    Unreadable { path: String, reason: String },
}

/// Broad classes of [`GameError`], used to decide how a caller recovers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed nickname, challenge name or coordinates
    InputValidation,
    /// Wrong status, not the owner, not enough players, session state
    DomainState,
    /// Fixed, filled, already guessed or invalid placement
    BoardRule,
    /// Retries exhausted or the store failed in a way retrying cannot fix
    Store,
    /// Missing or already existing records
    Existence,
}

/// Error returned by every [`GameClient`](crate::GameClient) operation.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("nicknames are 3 to 24 letters, digits, dots, dashes or underscores: {nickname:?}")]
    InvalidNickname { nickname: String },

    #[error("nickname {nickname} is already taken")]
    TakenNickname { nickname: String },

    #[error("already logged in")]
    AlreadyLoggedIn,

    #[error("player not logged in")]
    NotLoggedIn,

    #[error("not participating in any challenge")]
    NotInChallenge,

    #[error("already participating in challenge {name}")]
    AlreadyInChallenge { name: String },

    #[error("a challenge named {name:?} already exists")]
    ChallengeExists { name: String },

    #[error("no challenge named {name:?}")]
    ChallengeNotFound { name: String },

    #[error(transparent)]
    Challenge(#[from] ChallengeError),

    #[error("{op} failed after {attempts} attempts")]
    OperationFailed { op: &'static str, attempts: u32 },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl GameError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidNickname { .. } => ErrorCategory::InputValidation,
            Self::TakenNickname { .. } | Self::ChallengeExists { .. } | Self::ChallengeNotFound { .. } => {
                ErrorCategory::Existence
            }
            Self::AlreadyLoggedIn
            | Self::NotLoggedIn
            | Self::NotInChallenge
            | Self::AlreadyInChallenge { .. } => ErrorCategory::DomainState,
            Self::Challenge(err) => match err {
                ChallengeError::InvalidChallengeName { .. }
                | ChallengeError::CellNotFound { .. }
                | ChallengeError::ValueOutOfRange { .. } => ErrorCategory::InputValidation,
                ChallengeError::UnknownPlayer { .. }
                | ChallengeError::Unauthorized
                | ChallengeError::InvalidTransition
                | ChallengeError::NotEnoughPlayers { .. }
                | ChallengeError::InvalidState => ErrorCategory::DomainState,
                ChallengeError::FixedCell { .. }
                | ChallengeError::AlreadyFilled { .. }
                | ChallengeError::AlreadyGuessed { .. }
                | ChallengeError::InvalidValue { .. } => ErrorCategory::BoardRule,
            },
            Self::Store(StoreError::AlreadyExists { .. } | StoreError::NotFound { .. }) => {
                ErrorCategory::Existence
            }
            Self::OperationFailed { .. } | Self::Store(_) | Self::Config(_) => ErrorCategory::Store,
        }
    }

    /// The board-rule or state error behind this failure, if any
    pub fn as_challenge(&self) -> Option<&ChallengeError> {
        match self {
            Self::Challenge(err) => Some(err),
            _ => None,
        }
    }
}

pub type GameResult<T> = Result<T, GameError>;
