//! The 9x9 board: cells, the 27 groups wired over them, and the placement rules.

use crate::error::{PlaceError, WireError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Side length of the board
pub const SIDE: usize = 9;
/// Side length of a region
pub const REGION_SIDE: usize = 3;
/// Number of cells on the board
pub const CELL_COUNT: usize = SIDE * SIDE;
/// Value of an empty cell
pub const EMPTY: u8 = 0;

/// Plain matrix of digits, `0` marking an empty cell.
pub type Board = [[u8; SIDE]; SIDE];

/// A cell coordinate (0-based row and column)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

impl Position {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Build a position, or `None` when it falls outside the board
    pub fn checked(row: usize, col: usize) -> Option<Self> {
        (row < SIDE && col < SIDE).then_some(Self { row, col })
    }

    pub fn from_index(index: usize) -> Self {
        Self::new(index / SIDE, index % SIDE)
    }

    /// Row-major index of the cell
    pub fn index(self) -> usize {
        self.row * SIDE + self.col
    }

    /// Index of the 3x3 region, counted left to right, top to bottom
    pub fn region(self) -> usize {
        (self.row / REGION_SIDE) * REGION_SIDE + self.col / REGION_SIDE
    }

    /// Every position on the board in row-major order
    pub fn all() -> impl Iterator<Item = Position> {
        (0..CELL_COUNT).map(Self::from_index)
    }
}

/// Rule applied when validating a placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlacementRule {
    /// A value is accepted when its row, column and region stay duplicate-free
    ConstraintsOnly,
    /// The value must also equal the recorded solution digit
    #[default]
    MatchSolution,
}

/// One square of the board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cell {
    value: u8,
    solution: u8,
    fixed: bool,
}

impl Cell {
    /// Current value, `0` when empty
    pub fn value(&self) -> u8 {
        self.value
    }

    /// Digit of the full solution for this cell (`0` when unknown)
    pub fn solution(&self) -> u8 {
        self.solution
    }

    /// Whether the cell is a clue
    pub fn is_fixed(&self) -> bool {
        self.fixed
    }

    pub fn is_empty(&self) -> bool {
        self.value == EMPTY
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupKind {
    Row,
    Column,
    Region,
}

/// A row, column or region: nine cells whose non-empty values must differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Group {
    kind: GroupKind,
    index: usize,
    cells: [usize; SIDE],
}

impl Group {
    fn new(kind: GroupKind, index: usize) -> Self {
        let cells = std::array::from_fn(|i| match kind {
            GroupKind::Row => Position::new(index, i).index(),
            GroupKind::Column => Position::new(i, index).index(),
            GroupKind::Region => {
                let top = (index / REGION_SIDE) * REGION_SIDE;
                let left = (index % REGION_SIDE) * REGION_SIDE;
                Position::new(top + i / REGION_SIDE, left + i % REGION_SIDE).index()
            }
        });
        Self { kind, index, cells }
    }

    pub fn kind(&self) -> GroupKind {
        self.kind
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Row-major indices of the member cells
    pub fn cells(&self) -> &[usize; SIDE] {
        &self.cells
    }

    fn is_valid(&self, cells: &[Cell; CELL_COUNT]) -> bool {
        let mut seen = 0u16;
        for &index in &self.cells {
            let value = cells[index].value;
            if value == EMPTY {
                continue;
            }
            let bit = 1u16 << value;
            if seen & bit != 0 {
                return false;
            }
            seen |= bit;
        }
        true
    }
}

/// A Sudoku board with its solution and clue markers.
///
/// The 27 groups are wired when the grid is built and rebuilt on
/// deserialization; only the flat [`GridWire`] form is ever stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "GridWire", into = "GridWire")]
pub struct Grid {
    cells: [Cell; CELL_COUNT],
    groups: Vec<Group>,
}

impl PartialEq for Grid {
    fn eq(&self, other: &Self) -> bool {
        self.cells == other.cells
    }
}

impl Eq for Grid {}

impl Default for Grid {
    fn default() -> Self {
        Self::empty()
    }
}

impl Grid {
    /// An empty board with every group wired
    pub fn empty() -> Self {
        let mut groups = Vec::with_capacity(3 * SIDE);
        for kind in [GroupKind::Row, GroupKind::Column, GroupKind::Region] {
            groups.extend((0..SIDE).map(|index| Group::new(kind, index)));
        }
        Self {
            cells: [Cell::default(); CELL_COUNT],
            groups,
        }
    }

    /// Parse a puzzle from 81 characters (`1`-`9` clues, `0` or `.` empty).
    ///
    /// The parsed values become fixed clues; the solution stays unknown.
    pub fn from_string(puzzle: &str) -> Option<Self> {
        let digits: Vec<u8> = puzzle
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| match c {
                '.' => Some(EMPTY),
                _ => c.to_digit(10).map(|d| d as u8),
            })
            .collect::<Option<_>>()?;
        if digits.len() != CELL_COUNT {
            return None;
        }

        let mut grid = Self::empty();
        for (index, digit) in digits.into_iter().enumerate() {
            grid.cells[index].value = digit;
            grid.cells[index].fixed = digit != EMPTY;
        }
        grid.is_consistent().then_some(grid)
    }

    pub fn cell(&self, pos: Position) -> &Cell {
        &self.cells[pos.index()]
    }

    pub fn value(&self, pos: Position) -> u8 {
        self.cells[pos.index()].value
    }

    pub fn solution(&self, pos: Position) -> u8 {
        self.cells[pos.index()].solution
    }

    pub fn is_fixed(&self, pos: Position) -> bool {
        self.cells[pos.index()].fixed
    }

    /// All 27 groups: rows, then columns, then regions
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// The row, column and region containing `pos`
    pub fn groups_of(&self, pos: Position) -> [&Group; 3] {
        [
            &self.groups[pos.row],
            &self.groups[SIDE + pos.col],
            &self.groups[2 * SIDE + pos.region()],
        ]
    }

    /// Place a value, enforcing the Sudoku rules.
    ///
    /// Checks run in order: bounds, digit range, fixed cell, filled cell,
    /// then the group constraints (and the solution digit under
    /// [`PlacementRule::MatchSolution`]). A rejected value leaves the cell empty.
    pub fn place(
        &mut self,
        pos: Position,
        value: u8,
        rule: PlacementRule,
    ) -> Result<(), PlaceError> {
        let Position { row, col } = pos;
        if Position::checked(row, col).is_none() {
            return Err(PlaceError::CellNotFound { row, col });
        }
        if !(1..=9).contains(&value) {
            return Err(PlaceError::ValueOutOfRange { value });
        }

        let cell = self.cells[pos.index()];
        if cell.fixed {
            return Err(PlaceError::FixedCell { row, col });
        }
        if cell.value != EMPTY {
            return Err(PlaceError::FilledCell { row, col });
        }

        let invalid = PlaceError::InvalidValue { row, col, value };
        if rule == PlacementRule::MatchSolution && cell.solution != value {
            return Err(invalid);
        }
        if !self.try_fill(pos.index(), value) {
            return Err(invalid);
        }
        Ok(())
    }

    /// Set a value and keep it only if the cell's groups stay valid.
    pub(crate) fn try_fill(&mut self, index: usize, value: u8) -> bool {
        self.cells[index].value = value;
        let pos = Position::from_index(index);
        if self.groups_of(pos).iter().all(|g| g.is_valid(&self.cells)) {
            return true;
        }
        self.cells[index].value = EMPTY;
        false
    }

    pub(crate) fn clear(&mut self, index: usize) {
        self.cells[index].value = EMPTY;
    }

    pub(crate) fn value_at(&self, index: usize) -> u8 {
        self.cells[index].value
    }

    /// Record the current values as the solution
    pub(crate) fn record_solution(&mut self) {
        for cell in &mut self.cells {
            cell.solution = cell.value;
        }
    }

    /// Mark every remaining non-empty cell as a clue
    pub(crate) fn fix_clues(&mut self) {
        for cell in &mut self.cells {
            cell.fixed = cell.value != EMPTY;
        }
    }

    /// Current values as a matrix
    pub fn values(&self) -> Board {
        std::array::from_fn(|row| std::array::from_fn(|col| self.value(Position::new(row, col))))
    }

    /// Solution digits as a matrix
    pub fn solution_values(&self) -> Board {
        std::array::from_fn(|row| {
            std::array::from_fn(|col| self.solution(Position::new(row, col)))
        })
    }

    /// Every cell holds a value
    pub fn is_complete(&self) -> bool {
        self.cells.iter().all(|c| c.value != EMPTY)
    }

    /// No group contains a duplicate value
    pub fn is_consistent(&self) -> bool {
        self.groups.iter().all(|g| g.is_valid(&self.cells))
    }

    /// Digits that could go in `pos` without repeating one in its groups.
    /// Empty for filled cells.
    pub fn candidates(&self, pos: Position) -> Vec<u8> {
        if self.value(pos) != EMPTY {
            return Vec::new();
        }
        let mut used = 0u16;
        for group in self.groups_of(pos) {
            for &index in group.cells() {
                used |= 1 << self.cells[index].value;
            }
        }
        (1..=SIDE as u8).filter(|v| used & (1 << v) == 0).collect()
    }

    pub fn clue_count(&self) -> usize {
        self.cells.iter().filter(|c| c.fixed).count()
    }

    pub fn empty_count(&self) -> usize {
        self.cells.iter().filter(|c| c.value == EMPTY).count()
    }

    /// Number of clues showing each digit (index 0 is digit 1)
    pub fn clue_digit_counts(&self) -> [usize; SIDE] {
        let mut counts = [0; SIDE];
        for cell in self.cells.iter().filter(|c| c.fixed) {
            counts[(cell.value - 1) as usize] += 1;
        }
        counts
    }

    /// Current values as 81 digits
    pub fn to_string_compact(&self) -> String {
        digits(self.cells.iter().map(|c| c.value))
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..SIDE {
            if row != 0 && row % REGION_SIDE == 0 {
                writeln!(f, "------+-------+------")?;
            }
            for col in 0..SIDE {
                if col != 0 && col % REGION_SIDE == 0 {
                    write!(f, "| ")?;
                }
                match self.value(Position::new(row, col)) {
                    EMPTY => write!(f, ". ")?,
                    v => write!(f, "{} ", v)?,
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

fn digits(values: impl Iterator<Item = u8>) -> String {
    values.map(|v| char::from(b'0' + v)).collect()
}

/// Flat storage form of a [`Grid`]: row-major values, row-major solution and
/// an 81-bit clue bitmap (bit `i` set when cell `i` is a clue), hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridWire {
    pub values: String,
    pub solution: String,
    pub clues: String,
}

impl From<Grid> for GridWire {
    fn from(grid: Grid) -> Self {
        let clues = grid
            .cells
            .iter()
            .enumerate()
            .filter(|(_, c)| c.fixed)
            .fold(0u128, |bits, (i, _)| bits | (1u128 << i));
        Self {
            values: digits(grid.cells.iter().map(|c| c.value)),
            solution: digits(grid.cells.iter().map(|c| c.solution)),
            clues: format!("{:032x}", clues),
        }
    }
}

impl TryFrom<GridWire> for Grid {
    type Error = WireError;

    fn try_from(wire: GridWire) -> Result<Self, Self::Error> {
        let values = parse_digits("values", &wire.values)?;
        let solution = parse_digits("solution", &wire.solution)?;
        let clues =
            u128::from_str_radix(&wire.clues, 16).map_err(|e| WireError::Clues(e.to_string()))?;

        let mut grid = Grid::empty();
        for index in 0..CELL_COUNT {
            let fixed = clues & (1u128 << index) != 0;
            if fixed && values[index] == EMPTY {
                return Err(WireError::EmptyClue { index });
            }
            grid.cells[index] = Cell {
                value: values[index],
                solution: solution[index],
                fixed,
            };
        }

        if !grid.is_consistent() {
            return Err(WireError::Inconsistent);
        }
        Ok(grid)
    }
}

fn parse_digits(field: &'static str, raw: &str) -> Result<[u8; CELL_COUNT], WireError> {
    let len = raw.chars().count();
    if len != CELL_COUNT {
        return Err(WireError::Length { field, len });
    }
    let mut out = [EMPTY; CELL_COUNT];
    for (slot, c) in out.iter_mut().zip(raw.chars()) {
        *slot = c
            .to_digit(10)
            .ok_or(WireError::Digit { field, found: c })? as u8;
    }
    Ok(out)
}
