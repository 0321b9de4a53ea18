//! A whole game played out in one process: every peer is a tokio task with
//! its own [`GameClient`], all sharing one in-memory store and network.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use sudoku_core::{Grid, Position, EMPTY};
use sudoku_p2p::{
    ChallengeError, ChallengeStatus, ClientConfig, DirectoryEntry, GameClient, LocalNetwork,
    MemoryDht, Nickname, PeerAddress,
};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

type Peer = GameClient<MemoryDht>;

#[derive(Debug, Clone)]
pub struct SwarmOptions {
    pub peers: usize,
    pub seed: Option<u64>,
    pub name: String,
    pub listed: bool,
    pub moves: usize,
    pub replicas: usize,
}

/// How one peer's guesses went
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    pub nickname: String,
    pub correct: u32,
    /// Cells another peer solved first
    pub beaten: u32,
    pub wrong: u32,
}

/// Final state of the challenge as the host last saw it
#[derive(Debug, Clone)]
pub struct Summary {
    pub name: String,
    pub puzzle: Grid,
    pub status: ChallengeStatus,
    pub scores: Vec<(Nickname, i32)>,
    pub tallies: Vec<Tally>,
    pub listing: Option<DirectoryEntry>,
}

/// Seeded per-peer randomness, or entropy without a seed
fn peer_rng(seed: Option<u64>, peer: usize) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(peer as u64 + 1)),
        None => StdRng::from_entropy(),
    }
}

/// A random empty cell with one of its constraint-legal digits
pub fn pick_move<R: rand::Rng>(puzzle: &Grid, rng: &mut R) -> Option<(Position, u8)> {
    let open: Vec<(Position, Vec<u8>)> = Position::all()
        .filter(|&pos| puzzle.value(pos) == EMPTY)
        .map(|pos| (pos, puzzle.candidates(pos)))
        .filter(|(_, candidates)| !candidates.is_empty())
        .collect();
    let (pos, candidates) = open.choose(rng)?;
    candidates.choose(rng).map(|&value| (*pos, value))
}

async fn play(mut peer: Peer, mut rng: StdRng, moves: usize) -> (Peer, Tally) {
    let mut tally = Tally {
        nickname: peer.nickname().map(|n| n.to_string()).unwrap_or_default(),
        ..Default::default()
    };

    for _ in 0..moves {
        peer.process_notifications().await;
        if !matches!(peer.challenge_status(), Ok(ChallengeStatus::Playing)) {
            break;
        }
        let Some((pos, value)) = peer
            .challenge_puzzle()
            .ok()
            .and_then(|puzzle| pick_move(puzzle, &mut rng))
        else {
            debug!(player = %tally.nickname, "no legal move left");
            break;
        };

        match peer.place_number(pos.row, pos.col, value).await {
            Ok(()) => tally.correct += 1,
            Err(err) => match err.as_challenge() {
                Some(ChallengeError::AlreadyGuessed { .. } | ChallengeError::AlreadyFilled { .. }) => {
                    tally.beaten += 1
                }
                Some(ChallengeError::InvalidValue { .. }) => tally.wrong += 1,
                Some(ChallengeError::InvalidState) => break,
                _ => {
                    warn!(player = %tally.nickname, error = %err, "peer stopped playing");
                    break;
                }
            },
        }
        tokio::task::yield_now().await;
    }
    (peer, tally)
}

/// Log everyone in, create and start the challenge, let the peers race,
/// then collect the final standings.
pub async fn run(config: ClientConfig, options: &SwarmOptions) -> Result<Summary> {
    if options.peers < 2 {
        return Err(anyhow!("a challenge needs at least two peers"));
    }
    let dht = Arc::new(MemoryDht::with_pending_ttl(options.replicas, config.pending_ttl()));
    let network = Arc::new(LocalNetwork::new());

    let mut peers = Vec::with_capacity(options.peers);
    for i in 0..options.peers {
        let address = PeerAddress::new(format!("peer-{i}"));
        let mut peer = GameClient::connect(config.clone(), Arc::clone(&dht), Arc::clone(&network), address)
            .await
            .context("connecting peer")?;
        if let Some(seed) = options.seed {
            peer = peer.with_rng_seed(seed.wrapping_add(i as u64));
        }
        peer.login(&format!("player{}", i + 1)).await?;
        peers.push(peer);
    }

    let (host, guests) = peers
        .split_first_mut()
        .ok_or_else(|| anyhow!("no peers connected"))?;
    host.create_challenge(&options.name, options.seed, options.listed)
        .await
        .with_context(|| format!("creating challenge {:?}", options.name))?;
    for guest in guests.iter_mut() {
        guest.join_challenge(&options.name).await?;
    }
    host.start_challenge().await?;
    info!(challenge = %options.name, peers = options.peers, "challenge started");

    let mut tasks = JoinSet::new();
    for (i, peer) in peers.into_iter().enumerate() {
        tasks.spawn(play(peer, peer_rng(options.seed, i), options.moves));
    }
    let mut finished = Vec::with_capacity(options.peers);
    while let Some(joined) = tasks.join_next().await {
        finished.push(joined.context("peer task panicked")?);
    }
    finished.sort_by(|a, b| a.1.nickname.cmp(&b.1.nickname));

    let tallies = finished.iter().map(|(_, tally)| tally.clone()).collect();
    let (observer, _) = finished
        .first_mut()
        .ok_or_else(|| anyhow!("no peer finished"))?;
    observer.sync_challenge().await?;
    let challenge = observer.current_challenge()?;
    let summary = Summary {
        name: challenge.name().to_string(),
        puzzle: challenge.puzzle().clone(),
        status: challenge.status(),
        scores: challenge.scores(),
        tallies,
        listing: None,
    };
    let listing = observer
        .list_challenges()
        .await?
        .into_iter()
        .find(|entry| entry.name.as_str() == summary.name);
    let summary = Summary { listing, ..summary };

    for (peer, _) in finished {
        if let Err(err) = peer.close().await {
            warn!(error = %err, "peer did not close cleanly");
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(peers: usize) -> SwarmOptions {
        SwarmOptions {
            peers,
            seed: Some(3),
            name: "Test Run".to_string(),
            listed: true,
            moves: 500,
            replicas: 3,
        }
    }

    #[test]
    fn test_pick_move_is_legal() {
        let puzzle = sudoku_core::generate(Some(9));
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..20 {
            let (pos, value) = pick_move(&puzzle, &mut rng).unwrap();
            assert_eq!(puzzle.value(pos), EMPTY);
            assert!(puzzle.candidates(pos).contains(&value));
        }
    }

    #[test]
    fn test_pick_move_on_full_grid() {
        let mut puzzle = sudoku_core::generate(Some(9));
        for pos in Position::all() {
            if puzzle.value(pos) == EMPTY {
                let answer = puzzle.solution(pos);
                puzzle
                    .place(pos, answer, sudoku_core::PlacementRule::MatchSolution)
                    .unwrap();
            }
        }
        assert!(pick_move(&puzzle, &mut StdRng::seed_from_u64(1)).is_none());
    }

    #[tokio::test]
    async fn test_swarm_plays_a_challenge() {
        let config = ClientConfig {
            backoff_max_ms: 10,
            max_attempts: 50,
            ..Default::default()
        };
        let summary = run(config, &options(3)).await.unwrap();

        assert_eq!(summary.name, "Test Run");
        assert_eq!(summary.scores.len(), 3);
        assert_eq!(summary.tallies.len(), 3);
        assert!(summary.puzzle.is_consistent());
        let correct: u32 = summary.tallies.iter().map(|t| t.correct).sum();
        assert!(correct > 0);
        let listing = summary.listing.unwrap();
        assert_eq!(listing.players, 3);
        assert_eq!(listing.owner.as_str(), "player1");
    }

    #[tokio::test]
    async fn test_swarm_needs_two_peers() {
        let err = run(ClientConfig::default(), &options(1)).await.unwrap_err();
        assert!(err.to_string().contains("two peers"));
    }
}
