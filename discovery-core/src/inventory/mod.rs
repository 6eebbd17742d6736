use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use tracing::{debug, trace};

use crate::error::{DiscoveryError, Result};
use crate::member::{Address, Group, GroupPage, InstanceRecord, MemberId};

pub mod static_inventory;

/// Raw queries against the cloud inventory service.
#[async_trait]
pub trait Inventory: Send + Sync {
    /// Lists one page of groups, `None` asks for the first page.
    async fn describe_groups(&self, next_token: Option<String>) -> anyhow::Result<GroupPage>;

    async fn describe_group(&self, name: &str) -> anyhow::Result<Option<Group>>;

    async fn describe_instances(&self, id: &MemberId) -> anyhow::Result<Vec<InstanceRecord>>;
}

#[async_trait]
impl<T> Inventory for Arc<T> where T: Inventory + ?Sized {
    async fn describe_groups(&self, next_token: Option<String>) -> anyhow::Result<GroupPage> {
        (**self).describe_groups(next_token).await
    }

    async fn describe_group(&self, name: &str) -> anyhow::Result<Option<Group>> {
        (**self).describe_group(name).await
    }

    async fn describe_instances(&self, id: &MemberId) -> anyhow::Result<Vec<InstanceRecord>> {
        (**self).describe_instances(id).await
    }
}

#[derive(Debug, Clone)]
pub struct InventoryClient<I> {
    inventory: I,
}

impl<I> InventoryClient<I> where I: Inventory {
    pub fn new(inventory: I) -> Self {
        Self { inventory }
    }

    pub fn inventory(&self) -> &I {
        &self.inventory
    }

    /// Scans every page of the group listing until a group containing `member` shows up.
    pub async fn find_group_containing(&self, member: &MemberId) -> Result<Group> {
        let mut next_token = None;
        let mut page_no = 0usize;
        loop {
            let page = self.inventory
                .describe_groups(next_token)
                .await
                .map_err(DiscoveryError::Inventory)?;
            page_no += 1;
            trace!("group page {} with {} groups", page_no, page.groups.len());
            let GroupPage { groups, next_token: token } = page;
            if let Some(group) = groups.into_iter().find(|group| group.contains(member)) {
                debug!("member {} belongs to {} (page {})", member, group, page_no);
                return Ok(group);
            }
            match token {
                Some(token) => next_token = Some(token),
                None => {
                    return Err(DiscoveryError::GroupNotFound { member: member.clone() });
                }
            }
        }
    }

    pub async fn fetch_group(&self, name: &str) -> Result<Group> {
        self.inventory
            .describe_group(name)
            .await
            .and_then(|group| group.ok_or_else(|| anyhow!("group {} not found", name)))
            .map_err(DiscoveryError::Inventory)
    }

    /// Returns an address only when the inventory holds exactly one record for `member`.
    pub async fn resolve_address(&self, member: &MemberId) -> Result<Option<Address>> {
        let mut records = self.inventory
            .describe_instances(member)
            .await
            .map_err(DiscoveryError::Inventory)?;
        if records.len() != 1 {
            debug!("{} has {} instance records, cannot resolve address", member, records.len());
            return Ok(None);
        }
        let address = records.pop().and_then(|record| record.private_address);
        if address.is_none() {
            debug!("{} has no private address yet", member);
        }
        Ok(address)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::DiscoveryError;
    use crate::inventory::static_inventory::StaticInventory;
    use crate::inventory::InventoryClient;
    use crate::member::{Address, Group, InstanceRecord, MemberId};

    fn paged_inventory() -> StaticInventory {
        let inventory = StaticInventory::new(2);
        inventory.set_group(Group::new("web", ["i-w1", "i-w2"]));
        inventory.set_group(Group::new("db", ["i-d1"]));
        inventory.set_group(Group::new("cache", ["i-c1"]));
        inventory.set_group(Group::new("batch", ["i-b1"]));
        inventory.set_group(Group::new("workers", ["i-self", "i-a"]));
        inventory
    }

    #[tokio::test]
    async fn test_find_group_on_last_page() -> anyhow::Result<()> {
        let client = InventoryClient::new(paged_inventory());
        let group = client.find_group_containing(&MemberId::from("i-self")).await?;
        assert_eq!(group.name, "workers");
        assert_eq!(client.inventory().calls().describe_groups, 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_find_group_stops_at_first_match() -> anyhow::Result<()> {
        let client = InventoryClient::new(paged_inventory());
        let group = client.find_group_containing(&MemberId::from("i-w2")).await?;
        assert_eq!(group.name, "web");
        assert_eq!(client.inventory().calls().describe_groups, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_group_not_found_after_full_scan() -> anyhow::Result<()> {
        let client = InventoryClient::new(paged_inventory());
        let error = client.find_group_containing(&MemberId::from("i-stranger")).await.unwrap_err();
        assert!(matches!(error, DiscoveryError::GroupNotFound { member } if member.as_str() == "i-stranger"));
        assert_eq!(client.inventory().calls().describe_groups, 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_group() -> anyhow::Result<()> {
        let client = InventoryClient::new(paged_inventory());
        assert_eq!(client.fetch_group("db").await?, Group::new("db", ["i-d1"]));
        let error = client.fetch_group("missing").await.unwrap_err();
        assert!(matches!(error, DiscoveryError::Inventory(_)));
        Ok(())
    }

    #[tokio::test]
    async fn test_resolve_address_requires_exactly_one_record() -> anyhow::Result<()> {
        let inventory = StaticInventory::new(10);
        inventory.set_address("i-a", "10.0.0.5");
        inventory.set_records("i-twin", vec![
            InstanceRecord::new("i-twin", Some(Address::from("10.0.0.6"))),
            InstanceRecord::new("i-twin", Some(Address::from("10.0.0.7"))),
        ]);
        inventory.set_records("i-pending", vec![InstanceRecord::new("i-pending", None)]);
        let client = InventoryClient::new(inventory);
        assert_eq!(client.resolve_address(&MemberId::from("i-a")).await?, Some(Address::from("10.0.0.5")));
        assert_eq!(client.resolve_address(&MemberId::from("i-twin")).await?, None);
        assert_eq!(client.resolve_address(&MemberId::from("i-pending")).await?, None);
        assert_eq!(client.resolve_address(&MemberId::from("i-unknown")).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_transport_failure_is_propagated() -> anyhow::Result<()> {
        let inventory = paged_inventory();
        inventory.fail_requests(true);
        let client = InventoryClient::new(inventory);
        let error = client.fetch_group("web").await.unwrap_err();
        assert!(matches!(error, DiscoveryError::Inventory(_)));
        let error = client.find_group_containing(&MemberId::from("i-self")).await.unwrap_err();
        assert!(matches!(error, DiscoveryError::Inventory(_)));
        let error = client.resolve_address(&MemberId::from("i-a")).await.unwrap_err();
        assert!(matches!(error, DiscoveryError::Inventory(_)));
        Ok(())
    }
}
