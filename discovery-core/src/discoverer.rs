//! Keeps the local view of the group a process belongs to in sync with the inventory service.
//!
//! A [`ClusterDiscoverer`] finds its own group once at construction and afterwards only
//! reconciles fresh snapshots of that group against the peers it already knows. Each pass
//! runs under a pass lock, so a bootstrap pass and a timer-driven [`ClusterDiscoverer::refresh`]
//! never interleave.

use ahash::{HashMap, HashSet};
use itertools::Itertools;
use parking_lot::RwLock;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::config::settings::Settings;
use crate::error::{DiscoveryError, Result};
use crate::identity::instance_metadata::InstanceMetadata;
use crate::identity::SelfIdentity;
use crate::inventory::{Inventory, InventoryClient};
use crate::listener::ClusterListener;
use crate::member::{Address, Group, MemberId};

/// Ids touched by one reconciliation pass.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct ReconcileReport {
    pub discovered: Vec<MemberId>,
    pub gone: Vec<MemberId>,
    /// New ids whose address could not be resolved, retried on the next pass.
    pub unresolved: Vec<MemberId>,
}

impl ReconcileReport {
    pub fn has_transitions(&self) -> bool {
        !self.discovered.is_empty() || !self.gone.is_empty()
    }
}

pub struct ClusterDiscoverer<I, L> {
    self_id: MemberId,
    group_name: String,
    region: Option<String>,
    client: InventoryClient<I>,
    listener: L,
    pass: Mutex<()>,
    peers: RwLock<HashMap<MemberId, Address>>,
}

impl<I, L> ClusterDiscoverer<I, L>
    where
        I: Inventory,
        L: ClusterListener,
{
    pub async fn new<S>(identity: &S, inventory: I, listener: L) -> Result<Self> where S: SelfIdentity + ?Sized {
        let self_id = identity.resolve_self_id().await?;
        let region = match identity.resolve_region().await {
            Ok(region) => {
                info!("{} runs in region {}", self_id, region);
                Some(region)
            }
            Err(error) => {
                debug!("region of {} unknown: {}", self_id, error);
                None
            }
        };
        let client = InventoryClient::new(inventory);
        let group = client.find_group_containing(&self_id).await?;
        info!("{} joined discovery of {}", self_id, group);
        let discoverer = Self {
            self_id,
            group_name: group.name.clone(),
            region,
            client,
            listener,
            pass: Mutex::new(()),
            peers: RwLock::new(HashMap::default()),
        };
        discoverer.reconcile(&group).await?;
        Ok(discoverer)
    }

    /// Resolves the local instance through the metadata service described by `settings`.
    pub async fn bootstrap(settings: &Settings, inventory: I, listener: L) -> Result<Self> {
        let metadata = InstanceMetadata::new(&settings.metadata)?;
        Self::new(&metadata, inventory, listener).await
    }

    pub fn self_id(&self) -> &MemberId {
        &self.self_id
    }

    pub fn group_name(&self) -> &str {
        &self.group_name
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    pub fn inventory(&self) -> &I {
        self.client.inventory()
    }

    /// The committed peers, readable from inside a listener callback.
    pub fn peers(&self) -> HashMap<MemberId, Address> {
        self.peers.read().clone()
    }

    pub fn peer_address(&self, id: &MemberId) -> Option<Address> {
        self.peers.read().get(id).cloned()
    }

    /// Fetches the current snapshot of the group and reconciles it. A failed fetch leaves the
    /// peers untouched.
    pub async fn refresh(&self) -> Result<ReconcileReport> {
        let pass = self.pass.lock().await;
        let snapshot = self.client.fetch_group(&self.group_name).await?;
        self.reconcile_locked(&snapshot, pass).await
    }

    pub async fn reconcile(&self, snapshot: &Group) -> Result<ReconcileReport> {
        let pass = self.pass.lock().await;
        self.reconcile_locked(snapshot, pass).await
    }

    async fn reconcile_locked(&self, snapshot: &Group, _pass: MutexGuard<'_, ()>) -> Result<ReconcileReport> {
        let incoming: HashSet<MemberId> = snapshot.member_ids_except(&self.self_id);
        let (new_ids, stale_ids) = {
            let peers = self.peers.read();
            let new_ids = incoming
                .iter()
                .filter(|id| !peers.contains_key(*id))
                .cloned()
                .sorted()
                .collect_vec();
            let stale_ids = peers
                .keys()
                .filter(|id| !incoming.contains(*id))
                .cloned()
                .sorted()
                .collect_vec();
            (new_ids, stale_ids)
        };
        let mut report = ReconcileReport::default();
        let mut resolved = Vec::with_capacity(new_ids.len());
        for id in new_ids {
            match self.client.resolve_address(&id).await? {
                Some(address) => resolved.push((id, address)),
                None => {
                    warn!("cannot resolve a unique address of {}, retry on next refresh", id);
                    report.unresolved.push(id);
                }
            }
        }
        for (id, address) in resolved {
            self.peers.write().insert(id.clone(), address.clone());
            info!("peer {} discovered at {}", id, address);
            report.discovered.push(id.clone());
            self.listener
                .peer_discovered(&id, &address)
                .map_err(DiscoveryError::Listener)?;
        }
        for id in stale_ids {
            let removed = self.peers.write().remove(&id);
            if let Some(address) = removed {
                info!("peer {} at {} gone", id, address);
                report.gone.push(id.clone());
                self.listener
                    .peer_gone(&id, &address)
                    .map_err(DiscoveryError::Listener)?;
            }
        }
        debug!(
            "reconciled {} of {}: {} discovered, {} gone, {} unresolved, {} peers",
            snapshot.name,
            self.self_id,
            report.discovered.len(),
            report.gone.len(),
            report.unresolved.len(),
            self.peers.read().len(),
        );
        Ok(report)
    }
}
