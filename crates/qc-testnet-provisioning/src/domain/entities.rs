//! # Domain Entities
//!
//! Node identities, roles and protocol versions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::ProvisioningError;

/// Role a node plays in the provisioned network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    /// Initial dial target for peer discovery. Staked.
    Bootstrap,
    /// Staked validator.
    Validator,
    /// Participating node with no stake.
    ZeroWeight,
    /// Node added after genesis.
    Joiner,
}

impl NodeRole {
    /// All roles in topology order.
    pub const ALL: [NodeRole; 4] = [
        NodeRole::Bootstrap,
        NodeRole::Validator,
        NodeRole::ZeroWeight,
        NodeRole::Joiner,
    ];

    /// Inventory group key under `all.children`.
    pub fn group_name(self) -> &'static str {
        match self {
            NodeRole::Bootstrap => "bootstrap",
            NodeRole::Validator => "validators",
            NodeRole::ZeroWeight => "zero_weight",
            NodeRole::Joiner => "joiners",
        }
    }

    /// Whether nodes of this role receive bonded stake at genesis.
    pub fn is_staked(self) -> bool {
        matches!(self, NodeRole::Bootstrap | NodeRole::Validator)
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeRole::Bootstrap => "bootstrap",
            NodeRole::Validator => "validator",
            NodeRole::ZeroWeight => "zero-weight",
            NodeRole::Joiner => "joiner",
        };
        f.write_str(name)
    }
}

/// A machine identity within one network.
///
/// Fields are private: an identity never changes once the topology is resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeIdentity {
    address: String,
    role: NodeRole,
}

impl NodeIdentity {
    /// Create a node identity.
    pub fn new(address: impl Into<String>, role: NodeRole) -> Self {
        Self {
            address: address.into(),
            role,
        }
    }

    /// Host name or IP the node is reachable on.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Role of the node.
    pub fn role(&self) -> NodeRole {
        self.role
    }

    /// `host:port` form of the address.
    pub fn socket_address(&self, port: u16) -> String {
        format!("{}:{}", self.address, port)
    }
}

/// Semantic protocol version.
///
/// Parsed from either `1_0_0` (directory form) or `1.0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProtocolVersion {
    /// Major component.
    pub major: u32,
    /// Minor component.
    pub minor: u32,
    /// Patch component.
    pub patch: u32,
}

impl ProtocolVersion {
    /// Create a version.
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Underscore form used for directory names, e.g. `1_0_0`.
    pub fn dir_name(&self) -> String {
        format!("{}_{}_{}", self.major, self.minor, self.patch)
    }
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        Self::new(1, 0, 0)
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for ProtocolVersion {
    type Err = ProvisioningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ProvisioningError::InvalidConfig(format!("invalid protocol version '{s}'"));

        let parts: Vec<&str> = s.trim().split(['_', '.']).collect();
        if parts.len() != 3 {
            return Err(invalid());
        }

        let mut numbers = [0u32; 3];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            *slot = part.parse().map_err(|_| invalid())?;
        }

        Ok(Self::new(numbers[0], numbers[1], numbers[2]))
    }
}
