//! # Synthesis Algorithms
//!
//! Pure functions from topology, templates and settings to the documents a
//! network needs. Nothing here touches the filesystem.
//!
//! | Module | Output |
//! |--------|--------|
//! | `peers` | known-peer lists per node |
//! | `genesis` | `chainspec.toml` |
//! | `node_config` | per-node `config.toml`, `config-example.toml` |
//! | `ledger` | `accounts.toml` |

pub mod genesis;
pub mod ledger;
pub mod node_config;
pub mod peers;

pub use genesis::{GenesisSpec, GenesisSynthesizer, TIMESTAMP_FORMAT};
pub use ledger::LedgerBuilder;
pub use node_config::{ConsensusLayout, NodeConfig, NodeConfigSynthesizer, PUBLIC_ADDRESS_PLACEHOLDER};
pub use peers::{all_staked_peers, known_peers};
