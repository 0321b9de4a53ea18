//! Optimistic-concurrency storage of versioned records.
//!
//! [`Dht`] is the contract consumed from the distributed key-value store: a
//! per-replica view of the latest version, tentative writes that are either
//! confirmed or rolled back, and deletion. [`ReplicatedStore`] builds the
//! create/get/update/remove protocol on top of it.

mod client;
mod memory;

pub use client::{ReplicatedStore, Versioned};
pub use memory::MemoryDht;

use crate::error::StoreError;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::fmt;

/// Fixed-width identifier of a stored record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key([u8; 20]);

impl Key {
    /// Roster of logged-in players
    pub const ROSTER: Key = Key([0; 20]);

    /// Public challenge directory
    pub const DIRECTORY: Key = {
        let mut bytes = [0; 20];
        bytes[19] = 1;
        Key(bytes)
    };

    /// Key of a challenge record, derived from its name
    pub fn for_challenge(name: &str) -> Self {
        let digest = Sha256::digest(name.as_bytes());
        let mut bytes = [0; 20];
        bytes.copy_from_slice(&digest[..20]);
        Key(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Version of a stored record: a write counter plus the hash of its content.
///
/// Only compared for equality; the counter just keeps successive versions distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Version {
    seq: u64,
    digest: [u8; 32],
}

impl Version {
    /// Version of the first write of `data`
    pub fn initial(data: &[u8]) -> Self {
        Self {
            seq: 1,
            digest: Sha256::digest(data).into(),
        }
    }

    /// Version of a write of `data` based on this one
    pub fn next(&self, data: &[u8]) -> Self {
        Self {
            seq: self.seq + 1,
            digest: Sha256::digest(data).into(),
        }
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.seq, hex::encode(&self.digest[..4]))
    }
}

/// The latest version one replica holds for a key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaValue {
    pub version: Version,
    pub data: Vec<u8>,
    /// Written tentatively and not yet confirmed
    pub pending: bool,
}

/// Contract of the distributed key-value store.
///
/// Methods returning a `Vec` report one entry per reachable replica.
#[async_trait]
pub trait Dht: Send + Sync {
    /// Latest version held by each replica, tentative writes included
    async fn get_latest(&self, key: Key) -> Result<Vec<Option<ReplicaValue>>, StoreError>;

    /// Tentatively write `data` where the key holds nothing yet
    async fn put_if_absent(
        &self,
        key: Key,
        version: Version,
        data: Vec<u8>,
    ) -> Result<Vec<bool>, StoreError>;

    /// Tentatively write `data` where the latest version is `based_on`
    async fn prepare(
        &self,
        key: Key,
        version: Version,
        based_on: Version,
        data: Vec<u8>,
    ) -> Result<Vec<bool>, StoreError>;

    /// Make a tentative version final; returns how many replicas confirmed it
    async fn confirm(&self, key: Key, version: Version) -> Result<usize, StoreError>;

    /// Roll back a tentative version
    async fn remove_version(&self, key: Key, version: Version) -> Result<(), StoreError>;

    /// Delete every version on every replica; `false` when not acknowledged
    async fn remove_all(&self, key: Key) -> Result<bool, StoreError>;
}
