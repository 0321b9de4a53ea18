use thiserror::Error;

/// Reasons a placement on a [`Grid`](crate::Grid) can be refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PlaceError {
    /// The coordinates are outside the 9x9 board
    #[error("cell ({row}, {col}) does not exist")]
    CellNotFound { row: usize, col: usize },

    /// Only digits 1-9 can be placed
    #[error("value {value} is not a digit between 1 and 9")]
    ValueOutOfRange { value: u8 },

    /// The cell holds a clue
    #[error("cell ({row}, {col}) is fixed")]
    FixedCell { row: usize, col: usize },

    /// The cell already holds a value
    #[error("cell ({row}, {col}) already holds a value")]
    FilledCell { row: usize, col: usize },

    /// The value breaks a row, column or region constraint
    #[error("placing {value} at ({row}, {col}) violates the board constraints")]
    InvalidValue { row: usize, col: usize, value: u8 },
}

/// Errors raised when rebuilding a grid from its flat wire form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("{field} must hold 81 digits, got {len}")]
    Length { field: &'static str, len: usize },

    #[error("{field} contains a non-digit character {found:?}")]
    Digit { field: &'static str, found: char },

    #[error("clue bitmap is not valid hex: {0}")]
    Clues(String),

    #[error("clue at cell {index} has no value")]
    EmptyClue { index: usize },

    #[error("grid violates the board constraints")]
    Inconsistent,
}
