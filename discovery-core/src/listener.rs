use std::sync::Arc;

use anyhow::anyhow;
use tokio::sync::mpsc::UnboundedSender;

use crate::member::{Address, MemberId, PeerEvent};

/// Receives membership transitions. Both callbacks run synchronously inside a reconciliation
/// pass and must not call back into `refresh`.
pub trait ClusterListener: Send + Sync {
    fn peer_discovered(&self, id: &MemberId, address: &Address) -> anyhow::Result<()>;

    fn peer_gone(&self, id: &MemberId, address: &Address) -> anyhow::Result<()>;
}

impl<L> ClusterListener for Arc<L> where L: ClusterListener + ?Sized {
    fn peer_discovered(&self, id: &MemberId, address: &Address) -> anyhow::Result<()> {
        (**self).peer_discovered(id, address)
    }

    fn peer_gone(&self, id: &MemberId, address: &Address) -> anyhow::Result<()> {
        (**self).peer_gone(id, address)
    }
}

/// Forwards every transition as a [`PeerEvent`] to a channel.
#[derive(Debug, Clone)]
pub struct ChannelListener {
    sender: UnboundedSender<PeerEvent>,
}

impl ChannelListener {
    pub fn new(sender: UnboundedSender<PeerEvent>) -> Self {
        Self { sender }
    }

    fn send(&self, event: PeerEvent) -> anyhow::Result<()> {
        self.sender
            .send(event)
            .map_err(|error| anyhow!("peer event receiver closed, drop {}", error.0))
    }
}

impl ClusterListener for ChannelListener {
    fn peer_discovered(&self, id: &MemberId, address: &Address) -> anyhow::Result<()> {
        self.send(PeerEvent::Discovered { id: id.clone(), address: address.clone() })
    }

    fn peer_gone(&self, id: &MemberId, address: &Address) -> anyhow::Result<()> {
        self.send(PeerEvent::Gone { id: id.clone(), address: address.clone() })
    }
}
