//! # Network Topology
//!
//! Resolves an inventory (or plain counts) into an ordered, role-partitioned
//! list of node identities.
//!
//! ## Invariants
//!
//! - Every address appears exactly once across all role groups.
//! - Nodes are ordered by role (bootstrap, validators, zero-weight, joiners),
//!   then by inventory order within a role. This order decides stake weights
//!   downstream, so it must be reproducible for identical input.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use super::entities::{NodeIdentity, NodeRole};
use super::errors::{ProvisioningError, Result};

/// Ansible-style inventory document.
///
/// ```yaml
/// all:
///   children:
///     bootstrap:
///       hosts:
///         node-1:
///     validators:
///       hosts:
///         node-2:
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Inventory {
    all: InventoryRoot,
}

#[derive(Debug, Clone, Deserialize)]
struct InventoryRoot {
    children: InventoryChildren,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct InventoryChildren {
    #[serde(default)]
    bootstrap: Option<HostGroup>,
    #[serde(default)]
    validators: Option<HostGroup>,
    #[serde(default)]
    zero_weight: Option<HostGroup>,
    #[serde(default)]
    joiners: Option<HostGroup>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct HostGroup {
    #[serde(default)]
    hosts: Option<serde_yaml::Mapping>,
}

impl Inventory {
    /// Parse an inventory from YAML text.
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        serde_yaml::from_str(contents)
            .map_err(|e| ProvisioningError::InvalidTopology(format!("malformed inventory: {e}")))
    }

    /// Read and parse an inventory file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(ProvisioningError::io(path))?;
        Self::from_yaml_str(&contents)
    }

    /// Host addresses of one role group, in document order.
    pub fn hosts(&self, role: NodeRole) -> Result<Vec<String>> {
        let children = &self.all.children;
        let group = match role {
            NodeRole::Bootstrap => &children.bootstrap,
            NodeRole::Validator => &children.validators,
            NodeRole::ZeroWeight => &children.zero_weight,
            NodeRole::Joiner => &children.joiners,
        };

        let Some(hosts) = group.as_ref().and_then(|g| g.hosts.as_ref()) else {
            return Ok(Vec::new());
        };

        hosts
            .keys()
            .map(|key| match key {
                serde_yaml::Value::String(s) => Ok(s.clone()),
                serde_yaml::Value::Number(n) => Ok(n.to_string()),
                other => Err(ProvisioningError::InvalidTopology(format!(
                    "non-scalar host key in group '{}': {other:?}",
                    role.group_name()
                ))),
            })
            .collect()
    }
}

/// Addresses per role, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleGroups {
    /// Bootstrap addresses.
    pub bootstrap: Vec<String>,
    /// Validator addresses.
    pub validators: Vec<String>,
    /// Zero-weight operator addresses.
    pub zero_weight: Vec<String>,
    /// Late joiner addresses.
    pub joiners: Vec<String>,
}

impl RoleGroups {
    fn into_ordered(self) -> [(NodeRole, Vec<String>); 4] {
        [
            (NodeRole::Bootstrap, self.bootstrap),
            (NodeRole::Validator, self.validators),
            (NodeRole::ZeroWeight, self.zero_weight),
            (NodeRole::Joiner, self.joiners),
        ]
    }
}

/// Ordered, role-partitioned set of node identities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkTopology {
    nodes: Vec<NodeIdentity>,
}

impl NetworkTopology {
    /// Build a topology from explicit role groups.
    pub fn from_groups(groups: RoleGroups) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut nodes = Vec::new();

        for (role, addresses) in groups.into_ordered() {
            for address in addresses {
                validate_address(&address)?;
                if !seen.insert(address.clone()) {
                    return Err(ProvisioningError::InvalidTopology(format!(
                        "duplicate address '{address}' (seen again in group '{}')",
                        role.group_name()
                    )));
                }
                nodes.push(NodeIdentity::new(address, role));
            }
        }

        Ok(Self { nodes })
    }

    /// Resolve an inventory document.
    pub fn from_inventory(inventory: &Inventory) -> Result<Self> {
        let groups = RoleGroups {
            bootstrap: inventory.hosts(NodeRole::Bootstrap)?,
            validators: inventory.hosts(NodeRole::Validator)?,
            zero_weight: inventory.hosts(NodeRole::ZeroWeight)?,
            joiners: inventory.hosts(NodeRole::Joiner)?,
        };
        let topology = Self::from_groups(groups)?;
        debug!(nodes = topology.len(), "Resolved topology from inventory");
        Ok(topology)
    }

    /// Synthesize a topology from counts.
    ///
    /// One bootstrap node, `validator_count - 1` further validators and
    /// `zero_weight_count` operators, named `node-001`, `node-002`, ...
    pub fn from_counts(validator_count: usize, zero_weight_count: usize) -> Result<Self> {
        if validator_count == 0 {
            return Err(ProvisioningError::InvalidTopology(
                "validator count must be positive".to_string(),
            ));
        }

        let total = validator_count + zero_weight_count;
        let width = total.to_string().len().max(3);
        let mut names = (1..=total).map(|i| format!("node-{i:0width$}"));

        let groups = RoleGroups {
            bootstrap: names.by_ref().take(1).collect(),
            validators: names.by_ref().take(validator_count - 1).collect(),
            zero_weight: names.by_ref().take(zero_weight_count).collect(),
            joiners: Vec::new(),
        };
        Self::from_groups(groups)
    }

    /// All nodes in topology order.
    pub fn nodes(&self) -> &[NodeIdentity] {
        &self.nodes
    }

    /// Nodes of one role in topology order.
    pub fn by_role(&self, role: NodeRole) -> impl Iterator<Item = &NodeIdentity> + '_ {
        self.nodes.iter().filter(move |n| n.role() == role)
    }

    /// Addresses of one role in topology order.
    pub fn addresses(&self, role: NodeRole) -> Vec<&str> {
        self.by_role(role).map(NodeIdentity::address).collect()
    }

    /// Number of nodes with `role`.
    pub fn count(&self, role: NodeRole) -> usize {
        self.by_role(role).count()
    }

    /// Look a node up by address.
    pub fn find(&self, address: &str) -> Option<&NodeIdentity> {
        self.nodes.iter().find(|n| n.address() == address)
    }

    /// Fail unless at least one node has `role`.
    pub fn require(&self, role: NodeRole) -> Result<()> {
        if self.count(role) == 0 {
            return Err(ProvisioningError::InvalidTopology(format!(
                "inventory group '{}' is empty",
                role.group_name()
            )));
        }
        Ok(())
    }

    /// Staked nodes in the order stake weights are assigned:
    /// validators first, then bootstrap nodes.
    pub fn staking_order(&self) -> Vec<&NodeIdentity> {
        self.by_role(NodeRole::Validator)
            .chain(self.by_role(NodeRole::Bootstrap))
            .collect()
    }

    /// Nodes provisioned at genesis (everything except joiners).
    pub fn genesis_nodes(&self) -> impl Iterator<Item = &NodeIdentity> + '_ {
        self.nodes.iter().filter(|n| n.role() != NodeRole::Joiner)
    }

    /// Total node count.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the topology has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Addresses become directory names; reject anything that could escape.
fn validate_address(address: &str) -> Result<()> {
    let bad = address.is_empty()
        || address == "."
        || address == ".."
        || address.contains(['/', '\\'])
        || address.chars().any(char::is_whitespace);
    if bad {
        return Err(ProvisioningError::InvalidTopology(format!(
            "invalid node address '{address}'"
        )));
    }
    Ok(())
}
