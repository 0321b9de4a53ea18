use crate::challenge::Challenge;
use crate::directory::{Directory, Roster};
use crate::error::{GameError, GameResult};
use crate::player::PlayerIdentity;
use crate::store::Versioned;

/// Local cached copies of the shared records a client cares about.
///
/// Owned and mutated only by its [`GameClient`](crate::GameClient); a failed
/// operation leaves it as it was.
#[derive(Debug, Default)]
pub struct Session {
    pub player: Option<PlayerIdentity>,
    pub roster: Roster,
    pub directory: Directory,
    pub challenge: Option<Versioned<Challenge>>,
}

impl Session {
    pub fn player(&self) -> GameResult<&PlayerIdentity> {
        self.player.as_ref().ok_or(GameError::NotLoggedIn)
    }

    /// The challenge being played; requires a logged-in player
    pub fn challenge(&self) -> GameResult<&Challenge> {
        self.player()?;
        self.challenge
            .as_ref()
            .map(|c| &c.value)
            .ok_or(GameError::NotInChallenge)
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
