use std::fmt::{Display, Formatter};

use ahash::HashSet;
use serde::{Deserialize, Serialize};

macro_rules! string_newtype {
    ($($(#[$meta:meta])* $name:ident),*) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
            #[serde(transparent)]
            pub struct $name(String);

            impl $name {
                pub fn new(value: impl Into<String>) -> Self {
                    Self(value.into())
                }

                pub fn as_str(&self) -> &str {
                    &self.0
                }
            }

            impl Display for $name {
                fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                    f.write_str(&self.0)
                }
            }

            impl From<&str> for $name {
                fn from(value: &str) -> Self {
                    Self(value.to_string())
                }
            }

            impl From<String> for $name {
                fn from(value: String) -> Self {
                    Self(value)
                }
            }
        )*
    };
}

string_newtype!(
    /// Opaque id of a cluster member, stable for the member's lifetime.
    MemberId,
    /// Network reachable address of a member, usually its private ip.
    Address
);

/// Point-in-time membership of a named group.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    #[serde(default)]
    pub members: Vec<MemberId>,
}

impl Group {
    pub fn new(name: impl Into<String>, members: impl IntoIterator<Item = impl Into<MemberId>>) -> Self {
        Self {
            name: name.into(),
            members: members.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, member: &MemberId) -> bool {
        self.members.iter().any(|m| m == member)
    }

    pub fn member_ids_except(&self, excluded: &MemberId) -> HashSet<MemberId> {
        self.members
            .iter()
            .filter(|m| *m != excluded)
            .cloned()
            .collect()
    }
}

impl Display for Group {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Group({}, {} members)", self.name, self.members.len())
    }
}

/// One page of the paginated group listing.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct GroupPage {
    pub groups: Vec<Group>,
    pub next_token: Option<String>,
}

/// One backing record returned when looking up a member's address.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub id: MemberId,
    #[serde(rename = "private-address", alias = "private_address", default)]
    pub private_address: Option<Address>,
}

impl InstanceRecord {
    pub fn new(id: impl Into<MemberId>, private_address: Option<Address>) -> Self {
        Self {
            id: id.into(),
            private_address,
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum PeerEvent {
    Discovered { id: MemberId, address: Address },
    Gone { id: MemberId, address: Address },
}

impl PeerEvent {
    pub fn id(&self) -> &MemberId {
        match self {
            PeerEvent::Discovered { id, .. } | PeerEvent::Gone { id, .. } => id,
        }
    }

    pub fn address(&self) -> &Address {
        match self {
            PeerEvent::Discovered { address, .. } | PeerEvent::Gone { address, .. } => address,
        }
    }
}

impl Display for PeerEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PeerEvent::Discovered { id, address } => write!(f, "peerDiscovered({},{})", id, address),
            PeerEvent::Gone { id, address } => write!(f, "peerGone({},{})", id, address),
        }
    }
}
