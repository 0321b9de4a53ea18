//! Peer-to-peer multiplayer Sudoku.
//!
//! Peers share their game state through a replicated key-value store using
//! optimistic concurrency: every change is a read-modify-write cycle that
//! only commits when all replicas agree on the new version, and is retried
//! with jittered backoff when another peer got there first. Peers then push
//! a [`Notification`] to everyone with a stake in the changed record.
//!
//! ```no_run
//! use std::sync::Arc;
//! use sudoku_p2p::{ClientConfig, GameClient, LocalNetwork, MemoryDht, PeerAddress};
//!
//! # async fn demo() -> Result<(), sudoku_p2p::GameError> {
//! let dht = Arc::new(MemoryDht::default());
//! let network = Arc::new(LocalNetwork::new());
//! let mut alice =
//!     GameClient::connect(ClientConfig::default(), dht, network, PeerAddress::new("alice")).await?;
//! alice.login("Alice").await?;
//! alice.create_challenge("Friday Night", Some(7), true).await?;
//! # Ok(())
//! # }
//! ```

pub mod challenge;
pub mod client;
pub mod config;
pub mod directory;
pub mod error;
pub mod notify;
pub mod player;
pub mod retry;
pub mod session;
pub mod store;

pub use challenge::{
    Challenge, ChallengeName, ChallengeStatus, PlaceOutcome, PlayerGame, RemoveOutcome,
    CORRECT_NUMBER_SCORE, WRONG_NUMBER_SCORE,
};
pub use client::GameClient;
pub use config::ClientConfig;
pub use directory::{Directory, DirectoryEntry, Roster};
pub use error::{ChallengeError, ConfigError, ErrorCategory, GameError, GameResult, StoreError};
pub use notify::{LocalNetwork, Notification, NotifyError, Transport};
pub use player::{Nickname, PeerAddress, PlayerIdentity};
pub use store::{Dht, Key, MemoryDht, ReplicatedStore, Version, Versioned};
