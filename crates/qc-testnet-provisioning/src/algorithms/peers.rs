//! # Known-Peer Resolution
//!
//! Which addresses a node dials on startup, by role:
//!
//! | Role | Known peers |
//! |------|-------------|
//! | Bootstrap | other bootstrap nodes |
//! | Validator | bootstrap nodes |
//! | ZeroWeight | bootstrap nodes + validators |
//! | Joiner | validators + bootstrap nodes |
//!
//! A node never lists itself, a zero-weight node or a joiner.

use crate::domain::{NetworkTopology, NodeIdentity, NodeRole};

/// Roles whose addresses `role` dials, in list order.
fn peer_roles(role: NodeRole) -> &'static [NodeRole] {
    match role {
        NodeRole::Bootstrap | NodeRole::Validator => &[NodeRole::Bootstrap],
        NodeRole::ZeroWeight => &[NodeRole::Bootstrap, NodeRole::Validator],
        NodeRole::Joiner => &[NodeRole::Validator, NodeRole::Bootstrap],
    }
}

/// Known-peer addresses (without port) for `node`.
pub fn known_peers(topology: &NetworkTopology, node: &NodeIdentity) -> Vec<String> {
    peer_roles(node.role())
        .iter()
        .flat_map(|role| topology.by_role(*role))
        .filter(|peer| peer.address() != node.address())
        .map(|peer| peer.address().to_string())
        .collect()
}

/// Full bootstrap + validator set, used for the example config.
pub fn all_staked_peers(topology: &NetworkTopology) -> Vec<String> {
    topology
        .by_role(NodeRole::Bootstrap)
        .chain(topology.by_role(NodeRole::Validator))
        .map(|peer| peer.address().to_string())
        .collect()
}
