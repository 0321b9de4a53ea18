//! Bounded read-modify-write cycles with jittered backoff.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{GameError, GameResult, StoreError};
use crate::store::{Dht, Key, ReplicatedStore, Version, Versioned};

/// What a mutation wants done with the record it was handed
#[derive(Debug)]
pub enum Commit<R> {
    /// Store the mutated record
    Update(R),
    /// Delete the record, provided nobody wrote it since it was read
    Remove(R),
    /// Nothing changed, skip the write
    Skip(R),
}

/// Result of a successful read-modify-write cycle
#[derive(Debug)]
pub struct Committed<T, R> {
    pub result: R,
    /// The record as now stored, `None` once removed
    pub record: Option<Versioned<T>>,
    /// Whether the store was written
    pub written: bool,
}

/// Attempt bound and backoff shared by every store operation of a client.
pub struct RetryPolicy {
    max_attempts: u32,
    backoff_max: Duration,
    rng: StdRng,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_max: Duration, rng: StdRng) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_max,
            rng,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Uniformly random pause in `0..=backoff_max`
    async fn backoff(&mut self) {
        let max = self.backoff_max.as_millis() as u64;
        let millis = if max == 0 { 0 } else { self.rng.gen_range(0..=max) };
        tokio::time::sleep(Duration::from_millis(millis)).await;
    }

    /// Retry a store call while it fails transiently.
    pub async fn run<T, F, Fut>(&mut self, op: &'static str, mut call: F) -> GameResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, StoreError>>,
    {
        for attempt in 1..=self.max_attempts {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() => {
                    debug!(op, attempt, error = %err, "transient store failure");
                    self.backoff().await;
                }
                Err(err) => return Err(err.into()),
            }
        }
        warn!(op, attempts = self.max_attempts, "giving up");
        Err(GameError::OperationFailed {
            op,
            attempts: self.max_attempts,
        })
    }

    /// Read a record, retrying unaligned reads.
    pub async fn get<D, T>(
        &mut self,
        store: &ReplicatedStore<D>,
        op: &'static str,
        key: Key,
    ) -> GameResult<Versioned<T>>
    where
        D: Dht,
        T: DeserializeOwned,
    {
        self.run(op, || store.get(key)).await
    }

    /// Create a record, retrying lost creation races.
    pub async fn create<D, T>(
        &mut self,
        store: &ReplicatedStore<D>,
        op: &'static str,
        key: Key,
        value: &T,
    ) -> GameResult<Version>
    where
        D: Dht,
        T: Serialize + Sync,
    {
        self.run(op, || store.create(key, value)).await
    }

    /// Fetch, mutate and conditionally write a record until a write wins.
    ///
    /// `mutate` runs on a fresh copy of the record on every attempt. An `Err`
    /// from it aborts the cycle without writing; transient store failures
    /// back off and start over from a new read.
    pub async fn read_modify_write<D, T, R, F>(
        &mut self,
        store: &ReplicatedStore<D>,
        op: &'static str,
        key: Key,
        mut mutate: F,
    ) -> GameResult<Committed<T, R>>
    where
        D: Dht,
        T: Serialize + DeserializeOwned + Sync,
        F: FnMut(&mut T, &mut StdRng) -> GameResult<Commit<R>>,
    {
        for attempt in 1..=self.max_attempts {
            let outcome = match store.get::<T>(key).await {
                Ok(mut current) => match mutate(&mut current.value, &mut self.rng)? {
                    Commit::Skip(result) => {
                        return Ok(Committed {
                            result,
                            record: Some(current),
                            written: false,
                        })
                    }
                    Commit::Update(result) => store
                        .update(key, current.version, &current.value)
                        .await
                        .map(|version| Committed {
                            result,
                            record: Some(Versioned {
                                version,
                                value: current.value,
                            }),
                            written: true,
                        }),
                    Commit::Remove(result) => {
                        store
                            .remove_at(key, current.version)
                            .await
                            .map(|()| Committed {
                                result,
                                record: None,
                                written: true,
                            })
                    }
                },
                Err(err) => Err(err),
            };

            match outcome {
                Ok(committed) => {
                    debug!(op, attempt, %key, "committed");
                    return Ok(committed);
                }
                Err(err) if err.is_transient() => {
                    debug!(op, attempt, %key, error = %err, "attempt failed, backing off");
                    self.backoff().await;
                }
                Err(err) => return Err(err.into()),
            }
        }

        warn!(op, attempts = self.max_attempts, %key, "read-modify-write exhausted");
        Err(GameError::OperationFailed {
            op,
            attempts: self.max_attempts,
        })
    }
}
