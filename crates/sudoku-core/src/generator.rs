use crate::grid::{Grid, CELL_COUNT, EMPTY, SIDE};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Removals allowed per digit: one of the nine occurrences always survives
const MAX_REMOVALS_PER_DIGIT: usize = SIDE - 1;

/// Configuration for puzzle generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Fewest clues left on the board
    pub min_clues: usize,
    /// Upper bound (exclusive) of the clue window
    pub max_clues: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            min_clues: 26,
            max_clues: 34,
        }
    }
}

/// Sudoku puzzle generator
pub struct Generator<R = StdRng> {
    config: GeneratorConfig,
    rng: R,
}

impl Default for Generator {
    fn default() -> Self {
        Self::new()
    }
}

impl Generator {
    /// Create a new generator seeded from entropy
    pub fn new() -> Self {
        Self::with_config(GeneratorConfig::default())
    }

    /// Create a generator with custom configuration
    pub fn with_config(config: GeneratorConfig) -> Self {
        Self::from_rng(config, StdRng::from_entropy())
    }

    /// Create a generator with a specific seed for reproducibility
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(GeneratorConfig::default(), StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> Generator<R> {
    pub fn from_rng(config: GeneratorConfig, rng: R) -> Self {
        Self { config, rng }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Generate a solved grid, record its solution and reduce it to a playable puzzle
    pub fn generate(&mut self) -> Grid {
        let mut grid = self.generate_filled_grid();
        grid.record_solution();
        self.remove_cells(&mut grid);
        grid.fix_clues();
        grid
    }

    /// Randomized backtracking over the cells in row-major order.
    fn generate_filled_grid(&mut self) -> Grid {
        let mut grid = Grid::empty();
        // Per cell: shuffled candidates and whether each was already tried
        let mut candidates: Vec<[(u8, bool); SIDE]> =
            (0..CELL_COUNT).map(|_| self.shuffled_candidates()).collect();

        let mut index = 0;
        while index < CELL_COUNT {
            if grid.value_at(index) != EMPTY {
                grid.clear(index);
            }

            let mut placed = false;
            for slot in candidates[index].iter_mut().filter(|(_, tried)| !tried) {
                slot.1 = true;
                if grid.try_fill(index, slot.0) {
                    placed = true;
                    break;
                }
            }

            if placed {
                index += 1;
                continue;
            }

            // Exhausted: reset this cell and step back
            grid.clear(index);
            for slot in candidates[index].iter_mut() {
                slot.1 = false;
            }
            match index.checked_sub(1) {
                Some(previous) => index = previous,
                None => break,
            }
        }

        grid
    }

    fn shuffled_candidates(&mut self) -> [(u8, bool); SIDE] {
        let mut digits: [u8; SIDE] = std::array::from_fn(|i| i as u8 + 1);
        digits.shuffle(&mut self.rng);
        digits.map(|d| (d, false))
    }

    /// Clear cells in random order until the clue count falls in the configured window
    fn remove_cells(&mut self, grid: &mut Grid) {
        let retained = if self.config.max_clues > self.config.min_clues {
            self.rng
                .gen_range(self.config.min_clues..self.config.max_clues)
        } else {
            self.config.min_clues
        };
        let target = CELL_COUNT.saturating_sub(retained);

        let mut order: Vec<usize> = (0..CELL_COUNT).collect();
        order.shuffle(&mut self.rng);

        let mut removed_per_digit = [0usize; SIDE];
        let mut removed = 0;
        for index in order {
            if removed == target {
                break;
            }
            let digit = grid.value_at(index);
            if digit == EMPTY {
                continue;
            }
            let count = &mut removed_per_digit[(digit - 1) as usize];
            if *count < MAX_REMOVALS_PER_DIGIT {
                *count += 1;
                removed += 1;
                grid.clear(index);
            }
        }
    }
}

/// Generate a puzzle with the default clue window.
///
/// A seed makes the result reproducible; `None` draws from entropy.
pub fn generate(seed: Option<u64>) -> Grid {
    match seed {
        Some(seed) => Generator::with_seed(seed).generate(),
        None => Generator::new().generate(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Position;

    #[test]
    fn test_generate_is_valid() {
        for seed in 0..20 {
            let grid = Generator::with_seed(seed).generate();
            assert!(grid.is_consistent(), "seed {} produced duplicates", seed);

            let clues = grid.clue_count();
            assert!((26..34).contains(&clues), "seed {} kept {} clues", seed, clues);
            assert_eq!(grid.empty_count(), 81 - clues);
        }
    }

    #[test]
    fn test_solution_is_complete_and_matches_clues() {
        let grid = Generator::with_seed(42).generate();
        let mut solved = Grid::empty();
        for pos in Position::all() {
            let digit = grid.solution(pos);
            assert!((1..=9).contains(&digit));
            if grid.is_fixed(pos) {
                assert_eq!(grid.value(pos), digit);
            }
            assert!(solved.try_fill(pos.index(), digit));
        }
        assert!(solved.is_complete());
    }

    #[test]
    fn test_every_digit_keeps_a_clue() {
        let config = GeneratorConfig {
            min_clues: 17,
            max_clues: 17,
        };
        for seed in 0..20 {
            let mut generator = Generator::from_rng(config, StdRng::seed_from_u64(seed));
            let grid = generator.generate();
            assert_eq!(grid.clue_count(), 17);
            assert!(grid.clue_digit_counts().iter().all(|&n| n >= 1));
        }
    }

    #[test]
    fn test_seed_is_reproducible() {
        let a = Generator::with_seed(7).generate();
        let b = Generator::with_seed(7).generate();
        let c = Generator::with_seed(8).generate();
        assert_eq!(a, b);
        assert_ne!(a.solution_values(), c.solution_values());
        assert_eq!(generate(Some(7)), a);
    }

    #[test]
    fn test_clues_are_fixed() {
        let grid = generate(None);
        for pos in Position::all() {
            assert_eq!(grid.is_fixed(pos), grid.value(pos) != EMPTY);
        }
    }
}
