//! # Domain Module
//!
//! Core types for test network provisioning: topology, templates, ledger,
//! on-disk layout and artifacts.

pub mod artifacts;
pub mod entities;
pub mod errors;
pub mod layout;
pub mod ledger;
pub mod template;
pub mod topology;

pub use artifacts::*;
pub use entities::*;
pub use errors::*;
pub use layout::*;
pub use ledger::*;
pub use template::*;
pub use topology::*;
