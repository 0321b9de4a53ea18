//! Push notifications between peers.
//!
//! A notification only tells its receiver which shared record to re-fetch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::warn;

use crate::player::PeerAddress;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Notification {
    /// The challenge the receiver participates in was updated
    ChallengeChanged,
    /// The public challenge directory was updated
    DirectoryChanged,
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("no peer listening at {0}")]
    UnknownPeer(PeerAddress),

    #[error("peer {0} stopped listening")]
    Disconnected(PeerAddress),

    #[error("notification to {0} timed out")]
    Timeout(PeerAddress),
}

/// Point-to-point delivery of notifications to peer endpoints.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Start listening at `address`
    fn register(&self, address: PeerAddress) -> UnboundedReceiver<Notification>;

    /// Release the endpoint at `address`
    fn unregister(&self, address: &PeerAddress);

    async fn send(&self, to: &PeerAddress, notification: Notification) -> Result<(), NotifyError>;
}

/// In-process transport connecting every peer of a local swarm.
#[derive(Default)]
pub struct LocalNetwork {
    peers: RwLock<HashMap<PeerAddress, UnboundedSender<Notification>>>,
}

impl LocalNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn peer_count(&self) -> usize {
        self.peers.read().len()
    }
}

#[async_trait]
impl Transport for LocalNetwork {
    fn register(&self, address: PeerAddress) -> UnboundedReceiver<Notification> {
        let (tx, rx) = unbounded_channel();
        self.peers.write().insert(address, tx);
        rx
    }

    fn unregister(&self, address: &PeerAddress) {
        self.peers.write().remove(address);
    }

    async fn send(&self, to: &PeerAddress, notification: Notification) -> Result<(), NotifyError> {
        let sender = self
            .peers
            .read()
            .get(to)
            .cloned()
            .ok_or_else(|| NotifyError::UnknownPeer(to.clone()))?;
        sender
            .send(notification)
            .map_err(|_| NotifyError::Disconnected(to.clone()))
    }
}

/// Send `notification` to every target in parallel, each send bounded by
/// `timeout`. Failures are logged; returns how many sends succeeded.
pub async fn broadcast<T: Transport + ?Sized>(
    transport: &Arc<T>,
    targets: &[PeerAddress],
    notification: Notification,
    timeout: Duration,
) -> usize {
    let sends = targets.iter().map(|to| async move {
        let result = match tokio::time::timeout(timeout, transport.send(to, notification)).await {
            Ok(result) => result,
            Err(_) => Err(NotifyError::Timeout(to.clone())),
        };
        if let Err(err) = &result {
            warn!(?notification, error = %err, "notification not delivered");
        }
        result.is_ok()
    });
    join_all(sends).await.into_iter().filter(|&ok| ok).count()
}
