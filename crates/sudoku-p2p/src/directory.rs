//! Shared records stored under the well-known keys: the roster of logged-in
//! players and the public challenge directory.

use crate::challenge::{ChallengeName, ChallengeStatus};
use crate::player::{Nickname, PlayerIdentity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Public summary of a listed challenge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub name: ChallengeName,
    pub owner: Nickname,
    pub status: ChallengeStatus,
    pub players: usize,
}

/// The public challenge directory. Eventually consistent with the records it summarizes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directory {
    entries: BTreeMap<ChallengeName, DirectoryEntry>,
}

impl Directory {
    /// Insert an entry; returns `false` if one with the same name is already listed
    pub fn add(&mut self, entry: DirectoryEntry) -> bool {
        if self.entries.contains_key(&entry.name) {
            return false;
        }
        self.entries.insert(entry.name.clone(), entry);
        true
    }

    /// Replace a listed entry; returns `false` when the name is not listed
    /// or nothing changed. Never inserts, so a late update cannot revive a
    /// removed challenge.
    pub fn update(&mut self, entry: DirectoryEntry) -> bool {
        match self.entries.get_mut(&entry.name) {
            Some(listed) if *listed != entry => {
                *listed = entry;
                true
            }
            _ => false,
        }
    }

    pub fn remove(&mut self, name: &ChallengeName) -> bool {
        self.entries.remove(name).is_some()
    }

    pub fn get(&self, name: &ChallengeName) -> Option<&DirectoryEntry> {
        self.entries.get(name)
    }

    pub fn entries(&self) -> impl Iterator<Item = &DirectoryEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Every logged-in player, keyed by nickname.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    players: BTreeMap<Nickname, PlayerIdentity>,
}

impl Roster {
    /// Add a player; returns `false` if the nickname is taken
    pub fn insert(&mut self, player: PlayerIdentity) -> bool {
        if self.players.contains_key(player.nickname()) {
            return false;
        }
        self.players.insert(player.nickname().clone(), player);
        true
    }

    pub fn remove(&mut self, nickname: &Nickname) -> bool {
        self.players.remove(nickname).is_some()
    }

    pub fn contains(&self, nickname: &Nickname) -> bool {
        self.players.contains_key(nickname)
    }

    pub fn players(&self) -> impl Iterator<Item = &PlayerIdentity> {
        self.players.values()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::PeerAddress;

    fn entry(name: &str, players: usize) -> DirectoryEntry {
        DirectoryEntry {
            name: ChallengeName::parse(name).unwrap(),
            owner: Nickname::parse("Alice").unwrap(),
            status: ChallengeStatus::Waiting,
            players,
        }
    }

    #[test]
    fn test_directory_add_update_remove() {
        let mut dir = Directory::default();
        assert!(dir.add(entry("Challenge 1", 1)));
        assert!(!dir.add(entry("Challenge 1", 2)));
        assert_eq!(dir.len(), 1);

        assert!(!dir.update(entry("Challenge 1", 1)));
        assert!(dir.update(entry("Challenge 1", 2)));
        let name = ChallengeName::parse("Challenge 1").unwrap();
        assert_eq!(dir.get(&name).map(|e| e.players), Some(2));

        assert!(dir.remove(&name));
        assert!(!dir.remove(&name));
        assert!(dir.is_empty());
    }

    #[test]
    fn test_directory_update_after_remove_stays_removed() {
        let mut dir = Directory::default();
        let name = ChallengeName::parse("Challenge 1").unwrap();
        assert!(dir.add(entry("Challenge 1", 2)));
        assert!(dir.remove(&name));

        assert!(!dir.update(entry("Challenge 1", 1)));
        assert!(dir.get(&name).is_none());
        assert!(dir.is_empty());
    }

    #[test]
    fn test_roster_rejects_taken_nickname() {
        let mut roster = Roster::default();
        let alice = Nickname::parse("Alice").unwrap();
        assert!(roster.insert(PlayerIdentity::new(alice.clone(), PeerAddress::new("a"))));
        assert!(!roster.insert(PlayerIdentity::new(alice.clone(), PeerAddress::new("b"))));
        assert_eq!(roster.len(), 1);
        assert!(roster.remove(&alice));
        assert!(roster.is_empty());
    }
}
