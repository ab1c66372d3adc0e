//! # Testnet Provisioning
//!
//! Builds the on-disk tree for a multi-node proof-of-stake test network.
//!
//! ## Purpose
//!
//! Given a topology (an inventory file or validator/zero-weight counts), a
//! chainspec template and a node config template, produce:
//!
//! - a genesis `chainspec.toml` with the network name and a future timestamp
//! - one key pair and one `config.toml` per node, with role-dependent peers
//! - `accounts.toml` funding a faucet and every node, staking the validators
//! - a `config-example.toml` for operators joining later
//! - optionally, versioned `bin.tar.gz` / `config.tar.gz` archives
//!
//! ## Pipeline
//!
//! ```text
//! inventory / counts ──→ NetworkTopology
//!                              │
//! chainspec template ──→ GenesisSynthesizer ──→ staging/config/<v>/chainspec.toml
//! config template ────→ NodeConfigSynthesizer ─→ nodes/<addr>/etc/<project>/<v>/config.toml
//! KeyGenerator ───────→ LedgerBuilder ─────────→ staging/config/<v>/accounts.toml
//!                              │
//!                              └──→ package ──→ target/<v>/{bin,config}.tar.gz ──→ publish
//! ```
//!
//! ## Peer Rules
//!
//! | Role | Known peers |
//! |------|-------------|
//! | Bootstrap | other bootstrap nodes |
//! | Validator | bootstrap nodes |
//! | Zero-weight | bootstrap nodes and validators |
//! | Joiner | validators and bootstrap nodes |
//!
//! A node never lists itself.
//!
//! ## Module Structure (Hexagonal Architecture)
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  adapters/ - keygen process, filesystem, archives, HTTP         │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ implements ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  ports/ - KeyGenerator, Clock, ObjectStore (+ test doubles)     │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ used by ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  application/ - Provisioner, package, publish, bounded tasks    │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ built on ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  algorithms/ - peers, genesis, node config, ledger (pure)       │
//! │  domain/ - topology, templates, layout, ledger, errors          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Failure Semantics
//!
//! Every error aborts the run. Per-node work runs in parallel; the first
//! failure cancels the remaining tasks and is reported with the node's
//! address and role. Partially written trees are left in place.

pub mod adapters;
pub mod algorithms;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use application::{
    package, publish, BinarySource, JoinPlan, JoinReport, NetworkPlan, NetworkReport,
    ProvisionedNode, Provisioner,
};
pub use config::ProvisioningConfig;
pub use domain::{
    Inventory, NetworkLayout, NetworkTopology, NodeIdentity, NodeRole, ProtocolVersion,
    ProvisioningError, Result,
};
