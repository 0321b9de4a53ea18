//! Sudoku puzzle engine.
//!
//! A [`Grid`] wires its 81 cells into 27 groups (rows, columns, regions) and
//! enforces the placement rules; [`Generator`] builds solved grids by
//! randomized backtracking and reduces them to playable puzzles.

mod error;
mod generator;
mod grid;

pub use error::{PlaceError, WireError};
pub use generator::{generate, Generator, GeneratorConfig};
pub use grid::{
    Board, Cell, Grid, GridWire, Group, GroupKind, PlacementRule, Position, CELL_COUNT, EMPTY,
    REGION_SIDE, SIDE,
};
