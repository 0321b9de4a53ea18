use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use super::{Dht, Key, ReplicaValue, Version};
use crate::error::StoreError;

/// In-memory replicated store for tests and local play.
///
/// Each replica is locked on its own and every operation yields between
/// replicas, so concurrent writers interleave the way they would on a
/// real network.
pub struct MemoryDht {
    replicas: Vec<Mutex<Replica>>,
    faults: Mutex<Faults>,
    pending_ttl: Duration,
}

#[derive(Default)]
struct Replica {
    slots: HashMap<Key, Slot>,
}

#[derive(Default)]
struct Slot {
    confirmed: Option<(Version, Vec<u8>)>,
    pending: Option<Pending>,
}

struct Pending {
    version: Version,
    data: Vec<u8>,
    written: Instant,
}

#[derive(Default)]
struct Faults {
    fail_next: usize,
    latency: Option<Duration>,
}

impl Slot {
    /// Tentative writes past their TTL were abandoned by their writer
    fn live_pending(&self, ttl: Duration) -> Option<&Pending> {
        self.pending.as_ref().filter(|p| p.written.elapsed() < ttl)
    }

    fn latest(&self, ttl: Duration) -> Option<ReplicaValue> {
        match self.live_pending(ttl) {
            Some(p) => Some(ReplicaValue {
                version: p.version,
                data: p.data.clone(),
                pending: true,
            }),
            None => self.confirmed.as_ref().map(|(version, data)| ReplicaValue {
                version: *version,
                data: data.clone(),
                pending: false,
            }),
        }
    }
}

impl MemoryDht {
    pub const DEFAULT_REPLICAS: usize = 3;
    pub const DEFAULT_PENDING_TTL: Duration = Duration::from_secs(5);

    pub fn new(replicas: usize) -> Self {
        Self::with_pending_ttl(replicas, Self::DEFAULT_PENDING_TTL)
    }

    pub fn with_pending_ttl(replicas: usize, pending_ttl: Duration) -> Self {
        Self {
            replicas: (0..replicas.max(1)).map(|_| Mutex::default()).collect(),
            faults: Mutex::default(),
            pending_ttl,
        }
    }

    pub fn replica_count(&self) -> usize {
        self.replicas.len()
    }

    /// Make the next `n` operations fail as unreachable
    pub fn fail_next(&self, n: usize) {
        self.faults.lock().fail_next = n;
    }

    /// Delay applied at every replica step
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.faults.lock().latency = latency;
    }

    /// Write `data` to a single replica as if another writer's update only
    /// reached that one, leaving the replicas unaligned.
    pub fn overwrite_replica(&self, replica: usize, key: Key, data: Vec<u8>) {
        let Some(replica) = self.replicas.get(replica) else {
            return;
        };
        let mut replica = replica.lock();
        let slot = replica.slots.entry(key).or_default();
        let version = match &slot.confirmed {
            Some((version, _)) => version.next(&data),
            None => Version::initial(&data),
        };
        slot.confirmed = Some((version, data));
        slot.pending = None;
    }

    /// Copy replica 0's confirmed value for `key` to every other replica
    pub fn sync_replicas(&self, key: Key) {
        let source = self.replicas[0]
            .lock()
            .slots
            .get(&key)
            .and_then(|s| s.confirmed.clone());
        for replica in &self.replicas[1..] {
            let mut replica = replica.lock();
            let slot = replica.slots.entry(key).or_default();
            slot.confirmed = source.clone();
            slot.pending = None;
        }
    }

    async fn enter(&self, op: &'static str) -> Result<(), StoreError> {
        {
            let mut faults = self.faults.lock();
            if faults.fail_next > 0 {
                faults.fail_next -= 1;
                return Err(StoreError::Unreachable {
                    reason: format!("injected failure during {op}"),
                });
            }
        }
        self.step().await;
        Ok(())
    }

    async fn step(&self) {
        let latency = self.faults.lock().latency;
        match latency {
            Some(latency) => tokio::time::sleep(latency).await,
            None => tokio::task::yield_now().await,
        }
    }

    /// Run `f` against each replica in turn, yielding in between
    async fn each_replica<T>(&self, mut f: impl FnMut(&mut Replica) -> T) -> Vec<T> {
        let mut results = Vec::with_capacity(self.replicas.len());
        for replica in &self.replicas {
            {
                let mut guard = replica.lock();
                results.push(f(&mut *guard));
            }
            self.step().await;
        }
        results
    }
}

impl Default for MemoryDht {
    fn default() -> Self {
        Self::new(Self::DEFAULT_REPLICAS)
    }
}

#[async_trait]
impl Dht for MemoryDht {
    async fn get_latest(&self, key: Key) -> Result<Vec<Option<ReplicaValue>>, StoreError> {
        self.enter("get_latest").await?;
        let ttl = self.pending_ttl;
        Ok(self
            .each_replica(|r| r.slots.get(&key).and_then(|s| s.latest(ttl)))
            .await)
    }

    async fn put_if_absent(
        &self,
        key: Key,
        version: Version,
        data: Vec<u8>,
    ) -> Result<Vec<bool>, StoreError> {
        self.enter("put_if_absent").await?;
        let ttl = self.pending_ttl;
        Ok(self
            .each_replica(|r| {
                let slot = r.slots.entry(key).or_default();
                if slot.confirmed.is_some() || slot.live_pending(ttl).is_some() {
                    return false;
                }
                slot.pending = Some(Pending {
                    version,
                    data: data.clone(),
                    written: Instant::now(),
                });
                true
            })
            .await)
    }

    async fn prepare(
        &self,
        key: Key,
        version: Version,
        based_on: Version,
        data: Vec<u8>,
    ) -> Result<Vec<bool>, StoreError> {
        self.enter("prepare").await?;
        let ttl = self.pending_ttl;
        Ok(self
            .each_replica(|r| {
                let Some(slot) = r.slots.get_mut(&key) else {
                    return false;
                };
                let current = slot.confirmed.as_ref().map(|(v, _)| *v);
                if slot.live_pending(ttl).is_some() || current != Some(based_on) {
                    return false;
                }
                slot.pending = Some(Pending {
                    version,
                    data: data.clone(),
                    written: Instant::now(),
                });
                true
            })
            .await)
    }

    async fn confirm(&self, key: Key, version: Version) -> Result<usize, StoreError> {
        self.enter("confirm").await?;
        let ttl = self.pending_ttl;
        let acks = self
            .each_replica(|r| {
                let Some(slot) = r.slots.get_mut(&key) else {
                    return false;
                };
                if slot.live_pending(ttl).map(|p| p.version) != Some(version) {
                    return false;
                }
                match slot.pending.take() {
                    Some(p) => {
                        slot.confirmed = Some((p.version, p.data));
                        true
                    }
                    None => false,
                }
            })
            .await;
        Ok(acks.into_iter().filter(|&ack| ack).count())
    }

    async fn remove_version(&self, key: Key, version: Version) -> Result<(), StoreError> {
        self.enter("remove_version").await?;
        self.each_replica(|r| {
            if let Some(slot) = r.slots.get_mut(&key) {
                if slot.pending.as_ref().map(|p| p.version) == Some(version) {
                    slot.pending = None;
                }
                if slot.confirmed.is_none() && slot.pending.is_none() {
                    r.slots.remove(&key);
                }
            }
        })
        .await;
        Ok(())
    }

    async fn remove_all(&self, key: Key) -> Result<bool, StoreError> {
        self.enter("remove_all").await?;
        self.each_replica(|r| {
            r.slots.remove(&key);
        })
        .await;
        Ok(true)
    }
}
