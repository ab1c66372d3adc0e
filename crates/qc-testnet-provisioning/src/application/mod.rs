//! # Application Layer
//!
//! Orchestration of the provisioning pipeline on top of the domain,
//! algorithms and adapters.

pub mod artifacts;
pub mod provisioner;
pub mod tasks;

pub use artifacts::{package, publish, required_staged_files, CHECKSUMS_FILE};
pub use provisioner::{
    BinarySource, JoinPlan, JoinReport, NetworkPlan, NetworkReport, ProvisionedNode, Provisioner,
};
pub use tasks::run_bounded;
