//! The session coordinator.
//!
//! [`GameClient`] is one peer's entry point: every user action is a
//! read-modify-write cycle against the replicated store, followed by
//! notifications to the peers holding a stake in the changed record.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use sudoku_core::{Board, Grid};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::challenge::{Challenge, ChallengeName, ChallengeStatus, PlaceOutcome, RemoveOutcome};
use crate::config::ClientConfig;
use crate::directory::{Directory, DirectoryEntry, Roster};
use crate::error::{GameError, GameResult, StoreError};
use crate::notify::{broadcast, LocalNetwork, Notification, Transport};
use crate::player::{Nickname, PeerAddress, PlayerIdentity};
use crate::retry::{Commit, RetryPolicy};
use crate::session::Session;
use crate::store::{Dht, Key, ReplicatedStore, Versioned};

/// Change to apply to the public directory
enum DirectoryChange {
    Add(DirectoryEntry),
    /// Refresh a listed entry; ignored once the entry is gone
    Update(DirectoryEntry),
    Remove(ChallengeName),
}

/// One peer of the game.
pub struct GameClient<D, T: ?Sized = LocalNetwork> {
    config: ClientConfig,
    address: PeerAddress,
    store: ReplicatedStore<D>,
    transport: Arc<T>,
    inbox: UnboundedReceiver<Notification>,
    retry: RetryPolicy,
    session: Session,
}

impl<D, T> GameClient<D, T>
where
    D: Dht,
    T: Transport + ?Sized,
{
    /// Join the network at `address` and make sure the well-known records exist.
    pub async fn connect(
        config: ClientConfig,
        dht: Arc<D>,
        transport: Arc<T>,
        address: PeerAddress,
    ) -> GameResult<Self> {
        config.validate()?;
        let store = ReplicatedStore::new(dht, config.operation_timeout(), CancellationToken::new());
        let retry = RetryPolicy::new(config.max_attempts, config.backoff_max(), StdRng::from_entropy());
        let inbox = transport.register(address.clone());
        let mut client = Self {
            config,
            address,
            store,
            transport,
            inbox,
            retry,
            session: Session::default(),
        };
        client.bootstrap().await?;
        debug!(address = %client.address, "connected");
        Ok(client)
    }

    /// Replace the source of randomness (backoff, ownership handover) with a seeded one
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.retry = RetryPolicy::new(
            self.config.max_attempts,
            self.config.backoff_max(),
            StdRng::seed_from_u64(seed),
        );
        self
    }

    async fn bootstrap(&mut self) -> GameResult<()> {
        self.ensure_exists("create_roster", Key::ROSTER, &Roster::default())
            .await?;
        self.ensure_exists("create_directory", Key::DIRECTORY, &Directory::default())
            .await
    }

    /// Create a well-known record unless another peer already did
    async fn ensure_exists<V>(&mut self, op: &'static str, key: Key, initial: &V) -> GameResult<()>
    where
        V: serde::Serialize + Sync,
    {
        match self.retry.create(&self.store, op, key, initial).await {
            Ok(_) => {
                debug!(%key, "created well-known record");
                Ok(())
            }
            Err(GameError::Store(StoreError::AlreadyExists { .. })) => Ok(()),
            Err(err) => Err(err),
        }
    }

    pub fn address(&self) -> &PeerAddress {
        &self.address
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub async fn login(&mut self, nickname: &str) -> GameResult<()> {
        if self.session.player.is_some() {
            return Err(GameError::AlreadyLoggedIn);
        }
        let nickname = Nickname::parse(nickname).ok_or_else(|| GameError::InvalidNickname {
            nickname: nickname.to_owned(),
        })?;
        let player = PlayerIdentity::new(nickname, self.address.clone());

        let committed = {
            let player = player.clone();
            self.retry
                .read_modify_write(&self.store, "login", Key::ROSTER, move |roster: &mut Roster, _| {
                    if roster.insert(player.clone()) {
                        Ok(Commit::Update(()))
                    } else {
                        Err(GameError::TakenNickname {
                            nickname: player.nickname().to_string(),
                        })
                    }
                })
                .await?
        };

        if let Some(record) = committed.record {
            self.session.roster = record.value;
        }
        info!(player = %player.nickname(), "logged in");
        self.session.player = Some(player);

        if let Err(err) = self.refresh_directory().await {
            warn!(error = %err, "directory sync after login failed");
        }
        Ok(())
    }

    /// Leave the current challenge, if any, and drop out of the roster.
    pub async fn logout(&mut self) -> GameResult<()> {
        let Some(player) = self.session.player.clone() else {
            return Ok(());
        };
        if self.session.challenge.is_some() {
            self.quit_challenge().await?;
        }

        let nickname = player.nickname().clone();
        self.retry
            .read_modify_write(&self.store, "logout", Key::ROSTER, move |roster: &mut Roster, _| {
                if roster.remove(&nickname) {
                    Ok(Commit::Update(()))
                } else {
                    Ok(Commit::Skip(()))
                }
            })
            .await?;

        info!(player = %player.nickname(), "logged out");
        self.session.clear();
        Ok(())
    }

    /// Nicknames of every logged-in player
    pub async fn list_players(&mut self) -> GameResult<Vec<Nickname>> {
        self.session.player()?;
        let roster: Versioned<Roster> = self.retry.get(&self.store, "list_players", Key::ROSTER).await?;
        self.session.roster = roster.value;
        Ok(self
            .session
            .roster
            .players()
            .map(|p| p.nickname().clone())
            .collect())
    }

    /// Create a challenge with a fresh puzzle and join it.
    ///
    /// `seed` makes the puzzle reproducible; `None` draws one at random.
    pub async fn create_challenge(
        &mut self,
        name: &str,
        seed: Option<u64>,
        listed: bool,
    ) -> GameResult<()> {
        let player = self.session.player()?.clone();
        if let Some(current) = &self.session.challenge {
            return Err(GameError::AlreadyInChallenge {
                name: current.value.name().to_string(),
            });
        }
        let name = ChallengeName::parse(name)?;

        let mut challenge = Challenge::new(player.clone(), name.clone(), seed, listed, self.config.generator());
        challenge.add_player(player);

        let key = Key::for_challenge(name.as_str());
        let version = self
            .retry
            .create(&self.store, "create_challenge", key, &challenge)
            .await
            .map_err(|err| match err {
                GameError::Store(StoreError::AlreadyExists { .. }) => GameError::ChallengeExists {
                    name: name.to_string(),
                },
                err => err,
            })?;
        info!(challenge = %name, listed, "created challenge");

        let entry = challenge.info();
        self.session.challenge = Some(Versioned {
            version,
            value: challenge,
        });
        if listed {
            self.change_directory(DirectoryChange::Add(entry)).await;
        }
        Ok(())
    }

    /// Listed challenges, freshly read from the directory
    pub async fn list_challenges(&mut self) -> GameResult<Vec<DirectoryEntry>> {
        self.session.player()?;
        self.refresh_directory().await?;
        Ok(self.session.directory.entries().cloned().collect())
    }

    /// Re-read the public directory into the local cache
    pub async fn refresh_directory(&mut self) -> GameResult<()> {
        let directory: Versioned<Directory> = self
            .retry
            .get(&self.store, "sync_directory", Key::DIRECTORY)
            .await?;
        self.session.directory = directory.value;
        debug!(entries = self.session.directory.len(), "directory synchronized");
        Ok(())
    }

    pub async fn join_challenge(&mut self, name: &str) -> GameResult<()> {
        let player = self.session.player()?.clone();
        let name = ChallengeName::parse(name)?;
        if let Some(current) = &self.session.challenge {
            if *current.value.name() == name {
                return Ok(());
            }
            return Err(GameError::AlreadyInChallenge {
                name: current.value.name().to_string(),
            });
        }

        let key = Key::for_challenge(name.as_str());
        let committed = {
            let player = player.clone();
            self.retry
                .read_modify_write(&self.store, "join_challenge", key, move |c: &mut Challenge, _| {
                    if c.add_player(player.clone()) {
                        Ok(Commit::Update(()))
                    } else {
                        Ok(Commit::Skip(()))
                    }
                })
                .await
                .map_err(|err| challenge_not_found(err, &name))?
        };
        info!(challenge = %name, player = %player.nickname(), "joined challenge");

        self.session.challenge = committed.record;
        if committed.written {
            self.after_challenge_write().await;
        }
        Ok(())
    }

    /// Leave the current challenge, deleting it when nobody is left.
    ///
    /// The delete only goes through if the record is unchanged since it was
    /// read; a player joining in between makes the cycle start over and the
    /// challenge survives with them in it.
    pub async fn quit_challenge(&mut self) -> GameResult<()> {
        let player = self.session.player()?.clone();
        let current = self.session.challenge()?;
        let name = current.name().clone();
        let listed = current.is_listed();
        let key = Key::for_challenge(name.as_str());

        let quitter = player.clone();
        let result = self
            .retry
            .read_modify_write(&self.store, "quit_challenge", key, move |c: &mut Challenge, rng| {
                let outcome = c.remove_player(&quitter, rng);
                Ok(match outcome {
                    RemoveOutcome::Absent => Commit::Skip(outcome),
                    RemoveOutcome::Left { .. } => Commit::Update(outcome),
                    RemoveOutcome::Empty => Commit::Remove(outcome),
                })
            })
            .await;

        let committed = match result {
            Ok(committed) => Some(committed),
            // Already deleted by someone else
            Err(GameError::Store(StoreError::NotFound { .. })) => None,
            Err(err) => return Err(err),
        };
        info!(challenge = %name, player = %player.nickname(), "quit challenge");

        let remaining = committed.as_ref().and_then(|c| c.record.as_ref());
        if let Some(RemoveOutcome::Left {
            new_owner: Some(owner),
        }) = committed.as_ref().map(|c| &c.result)
        {
            info!(challenge = %name, owner = %owner.nickname(), "ownership handed over");
        }
        if let Some(record) = remaining {
            if committed.as_ref().is_some_and(|c| c.written) {
                self.notify_players(&record.value).await;
            }
        }

        let change = match remaining {
            Some(record) => DirectoryChange::Update(record.value.info()),
            None => DirectoryChange::Remove(name),
        };
        self.session.challenge = None;
        if listed {
            self.change_directory(change).await;
        }
        Ok(())
    }

    /// Move the current challenge from waiting to playing (owner only).
    pub async fn start_challenge(&mut self) -> GameResult<()> {
        let player = self.session.player()?.clone();
        let name = self.session.challenge()?.name().clone();
        let key = Key::for_challenge(name.as_str());
        let min_players = self.config.min_players_to_start;

        let committed = self
            .retry
            .read_modify_write(&self.store, "start_challenge", key, move |c: &mut Challenge, _| {
                c.start(&player, min_players)?;
                Ok(Commit::Update(()))
            })
            .await
            .map_err(|err| challenge_not_found(err, &name))?;
        info!(challenge = %name, "challenge started");

        self.session.challenge = committed.record;
        self.after_challenge_write().await;
        Ok(())
    }

    /// Place `value` at (`row`, `col`) of the current challenge.
    ///
    /// A wrong or already guessed value is stored (score penalty, board
    /// convergence) before the error is returned.
    pub async fn place_number(&mut self, row: usize, col: usize, value: u8) -> GameResult<()> {
        let player = self.session.player()?.clone();
        let name = self.session.challenge()?.name().clone();
        let key = Key::for_challenge(name.as_str());
        let rule = self.config.placement_rule;

        let committed = self
            .retry
            .read_modify_write(&self.store, "place_number", key, move |c: &mut Challenge, _| {
                let outcome = c.place_number(&player, row, col, value, rule)?;
                Ok(match outcome {
                    PlaceOutcome::Ignored => Commit::Skip(outcome),
                    _ => Commit::Update(outcome),
                })
            })
            .await
            .map_err(|err| challenge_not_found(err, &name))?;
        debug!(challenge = %name, row, col, value, outcome = ?committed.result, "placed number");

        self.session.challenge = committed.record;
        if committed.written {
            self.after_challenge_write().await;
        }
        committed.result.into_result(row, col, value)?;
        Ok(())
    }

    /// Apply queued notifications by re-fetching the records they name.
    ///
    /// Returns how many notifications were drained.
    pub async fn process_notifications(&mut self) -> usize {
        let mut challenge_changed = false;
        let mut directory_changed = false;
        let mut drained = 0;
        while let Ok(notification) = self.inbox.try_recv() {
            match notification {
                Notification::ChallengeChanged => challenge_changed = true,
                Notification::DirectoryChanged => directory_changed = true,
            }
            drained += 1;
        }

        if challenge_changed {
            if let Err(err) = self.sync_challenge().await {
                warn!(error = %err, "challenge sync failed");
            }
        }
        if directory_changed && self.session.player.is_some() {
            if let Err(err) = self.refresh_directory().await {
                warn!(error = %err, "directory sync failed");
            }
        }
        drained
    }

    /// Re-read the current challenge into the local cache
    pub async fn sync_challenge(&mut self) -> GameResult<()> {
        let Some(current) = &self.session.challenge else {
            return Ok(());
        };
        let name = current.value.name().clone();
        let key = Key::for_challenge(name.as_str());
        match self.retry.get(&self.store, "sync_challenge", key).await {
            Ok(record) => {
                self.session.challenge = Some(record);
                debug!(challenge = %name, "challenge synchronized");
                Ok(())
            }
            Err(GameError::Store(StoreError::NotFound { .. })) => {
                self.session.challenge = None;
                Err(GameError::ChallengeNotFound {
                    name: name.to_string(),
                })
            }
            Err(err) => Err(err),
        }
    }

    /// Log out and release the network endpoint.
    pub async fn close(mut self) -> GameResult<()> {
        let result = self.logout().await;
        self.transport.unregister(&self.address);
        self.store.cancel_token().cancel();
        debug!(address = %self.address, "closed");
        result
    }

    /// Notify the other players and refresh the directory entry after the
    /// cached challenge was written.
    async fn after_challenge_write(&mut self) {
        let Some(record) = &self.session.challenge else {
            return;
        };
        let challenge = record.value.clone();
        self.notify_players(&challenge).await;
        if challenge.is_listed() {
            self.change_directory(DirectoryChange::Update(challenge.info()))
                .await;
        }
    }

    async fn notify_players(&self, challenge: &Challenge) {
        let targets: Vec<PeerAddress> = challenge
            .players()
            .filter(|p| Some(*p) != self.session.player.as_ref())
            .map(|p| p.address().clone())
            .collect();
        if targets.is_empty() {
            return;
        }
        let delivered = broadcast(
            &self.transport,
            &targets,
            Notification::ChallengeChanged,
            self.config.notify_timeout(),
        )
        .await;
        debug!(challenge = %challenge.name(), delivered, targets = targets.len(), "notified players");
    }

    /// Apply a directory change and tell every other logged-in player.
    /// Failures are logged: the directory is only eventually consistent.
    async fn change_directory(&mut self, change: DirectoryChange) {
        let result = self
            .retry
            .read_modify_write(&self.store, "update_directory", Key::DIRECTORY, move |dir: &mut Directory, _| {
                let changed = match &change {
                    DirectoryChange::Add(entry) => dir.add(entry.clone()),
                    DirectoryChange::Update(entry) => dir.update(entry.clone()),
                    DirectoryChange::Remove(name) => dir.remove(name),
                };
                if changed {
                    Ok(Commit::Update(()))
                } else {
                    Ok(Commit::Skip(()))
                }
            })
            .await;

        let committed = match result {
            Ok(committed) => committed,
            Err(err) => {
                warn!(error = %err, "directory update failed");
                return;
            }
        };
        if let Some(record) = committed.record {
            self.session.directory = record.value;
        }
        if committed.written {
            self.notify_roster().await;
        }
    }

    async fn notify_roster(&mut self) {
        let roster: Versioned<Roster> = match self.retry.get(&self.store, "read_roster", Key::ROSTER).await {
            Ok(roster) => roster,
            Err(err) => {
                warn!(error = %err, "could not read roster for notifications");
                return;
            }
        };
        self.session.roster = roster.value;
        let targets: Vec<PeerAddress> = self
            .session
            .roster
            .players()
            .filter(|p| Some(*p) != self.session.player.as_ref())
            .map(|p| p.address().clone())
            .collect();
        let delivered = broadcast(
            &self.transport,
            &targets,
            Notification::DirectoryChanged,
            self.config.notify_timeout(),
        )
        .await;
        debug!(delivered, targets = targets.len(), "notified roster");
    }

    // Accessors over the cached session

    pub fn nickname(&self) -> GameResult<&Nickname> {
        Ok(self.session.player()?.nickname())
    }

    pub fn is_logged_in(&self) -> bool {
        self.session.player.is_some()
    }

    /// The cached challenge record
    pub fn current_challenge(&self) -> GameResult<&Challenge> {
        self.session.challenge()
    }

    pub fn challenge_name(&self) -> GameResult<&ChallengeName> {
        Ok(self.session.challenge()?.name())
    }

    /// The player's private board
    pub fn challenge_board(&self) -> GameResult<Board> {
        Ok(self.own_game()?.board)
    }

    /// The shared board with every correctly solved cell
    pub fn challenge_puzzle(&self) -> GameResult<&Grid> {
        Ok(self.session.challenge()?.puzzle())
    }

    pub fn challenge_score(&self) -> GameResult<i32> {
        Ok(self.own_game()?.score)
    }

    pub fn challenge_scores(&self) -> GameResult<Vec<(Nickname, i32)>> {
        Ok(self.session.challenge()?.scores())
    }

    pub fn challenge_owner_nickname(&self) -> GameResult<&Nickname> {
        Ok(self.session.challenge()?.owner().nickname())
    }

    pub fn is_challenge_owner(&self) -> GameResult<bool> {
        let player = self.session.player()?;
        Ok(self.session.challenge()?.owner() == player)
    }

    pub fn challenge_status(&self) -> GameResult<ChallengeStatus> {
        Ok(self.session.challenge()?.status())
    }

    /// Directory as last synchronized
    pub fn cached_directory(&self) -> &Directory {
        &self.session.directory
    }

    fn own_game(&self) -> GameResult<&crate::challenge::PlayerGame> {
        let player = self.session.player()?;
        let challenge = self.session.challenge()?;
        challenge
            .game(player.nickname())
            .ok_or(GameError::NotInChallenge)
    }
}

fn challenge_not_found(err: GameError, name: &ChallengeName) -> GameError {
    match err {
        GameError::Store(StoreError::NotFound { .. }) => GameError::ChallengeNotFound {
            name: name.to_string(),
        },
        err => err,
    }
}
