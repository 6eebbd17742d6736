use thiserror::Error;

use crate::member::MemberId;

pub type Result<T, E = DiscoveryError> = core::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("self identity unavailable: {0:#}")]
    IdentityUnavailable(anyhow::Error),
    #[error("unable to find the group of member {member}")]
    GroupNotFound { member: MemberId },
    #[error("inventory request failed: {0:#}")]
    Inventory(anyhow::Error),
    #[error("cluster listener failed: {0:#}")]
    Listener(anyhow::Error),
    #[error("invalid settings: {0}")]
    Config(#[from] config::ConfigError),
}
