//! # Ports Module
//!
//! Hexagonal architecture ports: the collaborators the pipeline depends on.

pub mod outbound;

pub use outbound::*;
