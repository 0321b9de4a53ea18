#![allow(dead_code)]

use std::sync::Arc;

use sudoku_core::{Grid, Position, EMPTY, REGION_SIDE, SIDE};
use sudoku_p2p::{ClientConfig, GameClient, LocalNetwork, MemoryDht, PeerAddress};

pub type Client = GameClient<MemoryDht>;

pub struct Swarm {
    pub dht: Arc<MemoryDht>,
    pub network: Arc<LocalNetwork>,
    pub config: ClientConfig,
}

impl Swarm {
    pub fn new() -> Self {
        Self::with_config(ClientConfig {
            backoff_max_ms: 20,
            ..Default::default()
        })
    }

    pub fn with_config(config: ClientConfig) -> Self {
        Self {
            dht: Arc::new(MemoryDht::new(3)),
            network: Arc::new(LocalNetwork::new()),
            config,
        }
    }

    pub async fn client(&self, address: &str, seed: u64) -> Client {
        GameClient::connect(
            self.config.clone(),
            Arc::clone(&self.dht),
            Arc::clone(&self.network),
            PeerAddress::new(address),
        )
        .await
        .unwrap()
        .with_rng_seed(seed)
    }
}

/// Empty cells of the shared board, row-major
pub fn empty_cells(puzzle: &Grid) -> Vec<Position> {
    Position::all().filter(|&p| puzzle.value(p) == EMPTY).collect()
}

pub fn fixed_cell(puzzle: &Grid) -> Position {
    Position::all().find(|&p| puzzle.is_fixed(p)).unwrap()
}

/// A digit already present in the row, column or region of `pos`
pub fn conflicting_value(puzzle: &Grid, pos: Position) -> u8 {
    let top = pos.row / REGION_SIDE * REGION_SIDE;
    let left = pos.col / REGION_SIDE * REGION_SIDE;
    (0..SIDE)
        .flat_map(|i| {
            [
                Position::new(pos.row, i),
                Position::new(i, pos.col),
                Position::new(top + i / REGION_SIDE, left + i % REGION_SIDE),
            ]
        })
        .map(|p| puzzle.value(p))
        .find(|&v| v != EMPTY)
        .unwrap()
}
