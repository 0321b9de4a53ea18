//! Basic example of using the Sudoku engine

use rand::rngs::StdRng;
use rand::SeedableRng;
use sudoku_core::{Generator, GeneratorConfig, Grid, GridWire, PlacementRule, Position};

fn main() {
    // Generate a reproducible puzzle with a tight clue window
    println!("Generating a puzzle with 28 to 30 clues...\n");
    let config = GeneratorConfig {
        min_clues: 28,
        max_clues: 30,
    };
    let mut generator = Generator::from_rng(config, StdRng::seed_from_u64(42));
    let mut puzzle = generator.generate();

    println!("Generated puzzle:");
    println!("{}", puzzle);
    println!("Clues: {}", puzzle.clue_count());
    println!("Empty cells: {}", puzzle.empty_count());

    // Play the first empty cell two ways
    let Some(pos) = Position::all().find(|&p| puzzle.value(p) == 0) else {
        return;
    };
    println!("\nCandidates at {:?}: {:?}", pos, puzzle.candidates(pos));
    let answer = puzzle.solution(pos);
    let wrong = (1..=9).find(|&v| v != answer).unwrap_or(1);
    match puzzle.place(pos, wrong, PlacementRule::MatchSolution) {
        Ok(()) => println!("{} accepted", wrong),
        Err(err) => println!("{} refused: {}", wrong, err),
    }
    match puzzle.place(pos, answer, PlacementRule::MatchSolution) {
        Ok(()) => println!("{} accepted", answer),
        Err(err) => println!("{} refused: {}", answer, err),
    }

    // The stored form is flat; the groups are rebuilt on load
    let json = serde_json::to_string(&GridWire::from(puzzle.clone())).unwrap_or_default();
    println!("\nWire form: {} bytes", json.len());

    // Parse a puzzle from a string
    println!("\n--- Parsing a puzzle from string ---\n");
    let puzzle_string = "530070000600195000098000060800060003400803001700020006060000280000419005000080079";
    if let Some(grid) = Grid::from_string(puzzle_string) {
        println!("Parsed puzzle:");
        println!("{}", grid);
        println!("Consistent: {}", grid.is_consistent());
    }
}
