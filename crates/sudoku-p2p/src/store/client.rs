use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{Dht, Key, ReplicaValue, Version};
use crate::error::StoreError;

/// A decoded record together with the version it was read at
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub version: Version,
    pub value: T,
}

/// Create/get/update/remove of serde records over a [`Dht`] with
/// optimistic concurrency.
///
/// Every call to the store is bounded by the operation timeout and aborts
/// as soon as the cancellation token fires.
pub struct ReplicatedStore<D> {
    dht: Arc<D>,
    timeout: Duration,
    cancel: CancellationToken,
}

impl<D> Clone for ReplicatedStore<D> {
    fn clone(&self) -> Self {
        Self {
            dht: Arc::clone(&self.dht),
            timeout: self.timeout,
            cancel: self.cancel.clone(),
        }
    }
}

impl<D: Dht> ReplicatedStore<D> {
    pub fn new(dht: Arc<D>, timeout: Duration, cancel: CancellationToken) -> Self {
        Self {
            dht,
            timeout,
            cancel,
        }
    }

    pub fn dht(&self) -> &Arc<D> {
        &self.dht
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    async fn call<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(StoreError::Cancelled { op }),
            result = tokio::time::timeout(self.timeout, fut) => {
                result.map_err(|_| StoreError::Timeout { op })?
            }
        }
    }

    /// Store `value` under a key that must not hold anything yet.
    pub async fn create<T: Serialize>(&self, key: Key, value: &T) -> Result<Version, StoreError> {
        match self.latest(key).await {
            Err(StoreError::NotFound { .. }) => {}
            Ok(_) => return Err(StoreError::AlreadyExists { key }),
            Err(err) => return Err(err),
        }

        let data = serde_json::to_vec(value)?;
        let version = Version::initial(&data);
        let acks = self
            .call("put_if_absent", self.dht.put_if_absent(key, version, data))
            .await?;
        if acks.iter().all(|&ack| ack) {
            self.settle(key, version).await?;
            debug!(%key, %version, "created record");
            return Ok(version);
        }

        self.rollback(key, version).await;
        if acks.iter().any(|&ack| ack) {
            // Split with a concurrent creator: neither wins this round
            Err(StoreError::Conflict { key })
        } else {
            Err(StoreError::AlreadyExists { key })
        }
    }

    /// Read a record; every replica must report the same confirmed version.
    pub async fn get<T: DeserializeOwned>(&self, key: Key) -> Result<Versioned<T>, StoreError> {
        let latest = self.latest(key).await?;
        let value = serde_json::from_slice(&latest.data).map_err(|e| StoreError::Corrupt {
            key,
            reason: e.to_string(),
        })?;
        Ok(Versioned {
            version: latest.version,
            value,
        })
    }

    /// Replace the record read at `based_on` with `value`.
    ///
    /// The new version is written tentatively, then confirmed only if every
    /// replica reports it as the latest; otherwise it is rolled back and
    /// [`StoreError::Conflict`] tells the caller to start over from a fresh read.
    pub async fn update<T: Serialize>(
        &self,
        key: Key,
        based_on: Version,
        value: &T,
    ) -> Result<Version, StoreError> {
        let data = serde_json::to_vec(value)?;
        let version = based_on.next(&data);
        let acks = self
            .call("prepare", self.dht.prepare(key, version, based_on, data))
            .await?;
        if !acks.iter().all(|&ack| ack) {
            debug!(%key, %version, "prepare refused by a replica");
            self.rollback(key, version).await;
            return Err(StoreError::Conflict { key });
        }

        self.settle(key, version).await?;
        debug!(%key, %version, "updated record");
        Ok(version)
    }

    /// Delete every replica of a record.
    pub async fn remove(&self, key: Key) -> Result<(), StoreError> {
        if self.call("remove_all", self.dht.remove_all(key)).await? {
            debug!(%key, "removed record");
            Ok(())
        } else {
            Err(StoreError::Unreachable {
                reason: format!("removal of {key} was not acknowledged"),
            })
        }
    }

    /// Delete the record only while it is still at `based_on`.
    ///
    /// A newer version means someone wrote after the caller's read, and
    /// [`StoreError::Conflict`] sends the caller back to a fresh read. The
    /// check and the delete are separate calls, so a write landing between
    /// them is still lost.
    pub async fn remove_at(&self, key: Key, based_on: Version) -> Result<(), StoreError> {
        let latest = self.latest(key).await?;
        if latest.version != based_on {
            debug!(%key, %based_on, found = %latest.version, "record moved on, not removing");
            return Err(StoreError::Conflict { key });
        }
        self.remove(key).await
    }

    /// Confirm a tentative version once all replicas agree on it, or roll it back.
    async fn settle(&self, key: Key, version: Version) -> Result<(), StoreError> {
        let replicas = match self.call("get_latest", self.dht.get_latest(key)).await {
            Ok(replicas) => replicas,
            Err(err) => {
                self.rollback(key, version).await;
                return Err(err);
            }
        };
        let agreed = !replicas.is_empty()
            && replicas
                .iter()
                .all(|r| r.as_ref().map(|r| r.version) == Some(version));
        if !agreed {
            self.rollback(key, version).await;
            return Err(StoreError::Conflict { key });
        }

        let confirmed = self.call("confirm", self.dht.confirm(key, version)).await?;
        if confirmed < replicas.len() {
            return Err(StoreError::Unaligned { key });
        }
        Ok(())
    }

    async fn rollback(&self, key: Key, version: Version) {
        if let Err(err) = self
            .call("remove_version", self.dht.remove_version(key, version))
            .await
        {
            debug!(%key, %version, error = %err, "rollback failed");
        }
    }

    async fn latest(&self, key: Key) -> Result<ReplicaValue, StoreError> {
        let replicas = self.call("get_latest", self.dht.get_latest(key)).await?;
        let mut iter = replicas.into_iter();
        let first = match iter.next() {
            Some(Some(first)) => first,
            Some(None) => {
                let err = if iter.all(|r| r.is_none()) {
                    StoreError::NotFound { key }
                } else {
                    StoreError::Unaligned { key }
                };
                return Err(err);
            }
            None => {
                return Err(StoreError::Unreachable {
                    reason: "no replica answered".into(),
                })
            }
        };

        // A pending version means a write is still in flight
        let aligned = !first.pending
            && iter.all(|r| {
                r.is_some_and(|r| !r.pending && r.version == first.version && r.data == first.data)
            });
        if aligned {
            Ok(first)
        } else {
            Err(StoreError::Unaligned { key })
        }
    }
}
