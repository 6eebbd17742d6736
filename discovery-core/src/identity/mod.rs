use anyhow::anyhow;
use async_trait::async_trait;

use crate::error::{DiscoveryError, Result};
use crate::member::MemberId;

pub mod instance_metadata;
pub mod static_identity;

/// Resolves who the local process is and where it runs.
#[async_trait]
pub trait SelfIdentity: Send + Sync {
    async fn resolve_self_id(&self) -> Result<MemberId>;

    async fn resolve_region(&self) -> Result<String> {
        Err(DiscoveryError::IdentityUnavailable(anyhow!("region lookup is not supported by this resolver")))
    }
}

#[async_trait]
impl<T> SelfIdentity for std::sync::Arc<T> where T: SelfIdentity + ?Sized {
    async fn resolve_self_id(&self) -> Result<MemberId> {
        (**self).resolve_self_id().await
    }

    async fn resolve_region(&self) -> Result<String> {
        (**self).resolve_region().await
    }
}

/// Strips the zone letter from an availability zone, `us-east-1a` becomes `us-east-1`.
pub fn region_of_zone(zone: &str) -> Result<String> {
    let zone = zone.trim();
    let mut chars = zone.chars();
    match chars.next_back() {
        Some(last) if last.is_ascii_alphabetic() && !chars.as_str().is_empty() => {
            Ok(chars.as_str().to_string())
        }
        _ => Err(DiscoveryError::IdentityUnavailable(anyhow!("malformed availability zone {:?}", zone))),
    }
}

#[cfg(test)]
mod tests {
    use crate::identity::region_of_zone;

    #[test]
    fn test_region_of_zone() -> anyhow::Result<()> {
        assert_eq!(region_of_zone("us-east-1a")?, "us-east-1");
        assert_eq!(region_of_zone("eu-central-1c\n")?, "eu-central-1");
        assert!(region_of_zone("").is_err());
        assert!(region_of_zone("a").is_err());
        assert!(region_of_zone("us-east-1").is_err());
        Ok(())
    }
}
