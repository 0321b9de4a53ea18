//! `p2p-sudoku`: plays a multiplayer challenge between simulated peers over
//! an in-memory replicated store and prints the final board and standings.
//!
//! ```bash
//! RUST_LOG=sudoku_p2p=debug p2p-sudoku --peers 4 --seed 42
//! ```

mod render;
mod swarm;
mod theme;

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use sudoku_p2p::{ClientConfig, MemoryDht};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use swarm::SwarmOptions;
use theme::Theme;

#[derive(Parser, Debug)]
#[command(name = "p2p-sudoku")]
#[command(about = "Simulate a peer-to-peer Sudoku challenge")]
struct Args {
    /// Number of peers racing on the board
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u16).range(2..=16))]
    peers: u16,

    /// Seed for the puzzle and every peer's guesses
    #[arg(long)]
    seed: Option<u64>,

    /// Challenge name
    #[arg(long, default_value = "Console Cup")]
    name: String,

    /// Keep the challenge out of the public directory
    #[arg(long)]
    unlisted: bool,

    /// Upper bound on the guesses each peer makes
    #[arg(long, default_value_t = 200)]
    moves: usize,

    /// Replicas of the in-memory store
    #[arg(long, default_value_t = MemoryDht::DEFAULT_REPLICAS as u16, value_parser = clap::value_parser!(u16).range(1..=9))]
    replicas: u16,

    /// Client configuration file, instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,

    /// Colours for terminals without true colour
    #[arg(long)]
    high_contrast: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn load_config(path: Option<&PathBuf>) -> Result<ClientConfig> {
    let config = match path {
        Some(path) => {
            let mut config = ClientConfig::from_file(path)?;
            config.apply_env(|name| std::env::var(name).ok())?;
            config.validate()?;
            config
        }
        None => ClientConfig::load()?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();

    let config = load_config(args.config.as_ref())?;
    tracing::debug!(?config, "client configuration");

    let options = SwarmOptions {
        peers: usize::from(args.peers),
        seed: args.seed,
        name: args.name,
        listed: !args.unlisted,
        moves: args.moves,
        replicas: usize::from(args.replicas),
    };
    let summary = swarm::run(config, &options).await?;

    let theme = if args.high_contrast {
        Theme::high_contrast()
    } else {
        Theme::default()
    };
    let mut stdout = io::stdout();
    render::render(&mut stdout, &summary, &theme)?;
    stdout.flush()?;
    Ok(())
}
