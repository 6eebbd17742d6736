use anyhow::anyhow;
use async_trait::async_trait;

use crate::error::{DiscoveryError, Result};
use crate::identity::SelfIdentity;
use crate::member::MemberId;

/// An identity known up front, e.g. passed on the command line.
#[derive(Debug, Clone)]
pub struct StaticIdentity {
    id: MemberId,
    region: Option<String>,
}

impl StaticIdentity {
    pub fn new(id: impl Into<MemberId>) -> Self {
        Self {
            id: id.into(),
            region: None,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }
}

#[async_trait]
impl SelfIdentity for StaticIdentity {
    async fn resolve_self_id(&self) -> Result<MemberId> {
        Ok(self.id.clone())
    }

    async fn resolve_region(&self) -> Result<String> {
        self.region
            .clone()
            .ok_or_else(|| DiscoveryError::IdentityUnavailable(anyhow!("no region configured for {}", self.id)))
    }
}
