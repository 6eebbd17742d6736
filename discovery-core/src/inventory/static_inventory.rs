use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use ahash::HashMap;
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::inventory::Inventory;
use crate::member::{Address, Group, GroupPage, InstanceRecord, MemberId};

/// Layout of an inventory file:
///
/// ```toml
/// [[groups]]
/// name = "workers"
/// members = ["i-self", "i-a"]
///
/// [[instances]]
/// id = "i-a"
/// private-address = "10.0.0.5"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InventoryFile {
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub instances: Vec<InstanceRecord>,
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct InventoryCalls {
    pub describe_groups: usize,
    pub describe_group: usize,
    pub describe_instances: usize,
}

#[derive(Debug, Default)]
struct InventoryState {
    groups: Vec<Group>,
    records: HashMap<MemberId, Vec<InstanceRecord>>,
    calls: InventoryCalls,
}

/// An inventory held in memory, optionally mirrored from a file that is re-read on every query.
#[derive(Debug)]
pub struct StaticInventory {
    page_size: usize,
    source: Option<PathBuf>,
    state: Mutex<InventoryState>,
    failing: AtomicBool,
}

impl StaticInventory {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            source: None,
            state: Mutex::new(InventoryState::default()),
            failing: AtomicBool::new(false),
        }
    }

    pub fn from_file(path: impl AsRef<Path>, page_size: usize) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("cannot read inventory file {}", path.display()))?;
        let inventory = Self::new(page_size);
        inventory.load(toml::from_str(&content)?);
        Ok(Self {
            source: Some(path),
            ..inventory
        })
    }

    pub fn load(&self, file: InventoryFile) {
        let mut records: HashMap<MemberId, Vec<InstanceRecord>> = HashMap::default();
        for record in file.instances {
            records.entry(record.id.clone()).or_default().push(record);
        }
        let mut state = self.state.lock();
        state.groups = file.groups;
        state.records = records;
    }

    /// Inserts the group, replacing any group with the same name.
    pub fn set_group(&self, group: Group) {
        let mut state = self.state.lock();
        match state.groups.iter_mut().find(|g| g.name == group.name) {
            Some(existing) => *existing = group,
            None => state.groups.push(group),
        }
    }

    pub fn add_member(&self, group: &str, member: impl Into<MemberId>) {
        let member = member.into();
        let mut state = self.state.lock();
        if let Some(group) = state.groups.iter_mut().find(|g| g.name == group) {
            if !group.contains(&member) {
                group.members.push(member);
            }
        }
    }

    pub fn remove_member(&self, group: &str, member: &MemberId) {
        let mut state = self.state.lock();
        if let Some(group) = state.groups.iter_mut().find(|g| g.name == group) {
            group.members.retain(|m| m != member);
        }
    }

    pub fn set_address(&self, member: impl Into<MemberId>, address: impl Into<Address>) {
        let member = member.into();
        let record = InstanceRecord::new(member.clone(), Some(address.into()));
        self.set_records(member, vec![record]);
    }

    pub fn set_records(&self, member: impl Into<MemberId>, records: Vec<InstanceRecord>) {
        self.state.lock().records.insert(member.into(), records);
    }

    /// Makes every following query fail, simulating an unreachable service.
    pub fn fail_requests(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> InventoryCalls {
        self.state.lock().calls
    }

    async fn prepare(&self) -> anyhow::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("inventory service unavailable"));
        }
        if let Some(path) = &self.source {
            let content = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("cannot read inventory file {}", path.display()))?;
            let file: InventoryFile = toml::from_str(&content)?;
            debug!("reloaded inventory file {}", path.display());
            self.load(file);
        }
        Ok(())
    }
}

#[async_trait]
impl Inventory for StaticInventory {
    async fn describe_groups(&self, next_token: Option<String>) -> anyhow::Result<GroupPage> {
        self.prepare().await?;
        let start = match next_token {
            Some(token) => token.parse::<usize>().with_context(|| format!("invalid next token {}", token))?,
            None => 0,
        };
        let mut state = self.state.lock();
        state.calls.describe_groups += 1;
        let end = start.saturating_add(self.page_size).min(state.groups.len());
        let groups = state.groups.get(start..end).map(|g| g.to_vec()).unwrap_or_default();
        let next_token = (end < state.groups.len()).then(|| end.to_string());
        Ok(GroupPage { groups, next_token })
    }

    async fn describe_group(&self, name: &str) -> anyhow::Result<Option<Group>> {
        self.prepare().await?;
        let mut state = self.state.lock();
        state.calls.describe_group += 1;
        Ok(state.groups.iter().find(|g| g.name == name).cloned())
    }

    async fn describe_instances(&self, id: &MemberId) -> anyhow::Result<Vec<InstanceRecord>> {
        self.prepare().await?;
        let mut state = self.state.lock();
        state.calls.describe_instances += 1;
        Ok(state.records.get(id).cloned().unwrap_or_default())
    }
}
